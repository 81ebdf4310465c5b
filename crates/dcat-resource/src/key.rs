//! Deep-equality keys for fetch arguments
//!
//! [`ArgsKey`] is the BLAKE3 digest of the canonical JSON encoding of a value:
//! object keys are written in sorted order at every depth, so structurally
//! equal arguments hash to the same key whatever their map iteration order.

use serde::Serialize;
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

use crate::error::KeyError;

/// Cache key derived from the structure of fetch arguments
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArgsKey([u8; 32]);

impl ArgsKey {
    /// Compute key for arguments
    ///
    /// # Errors
    /// Returns error if the arguments cannot be represented as JSON
    /// (for example a map with non-string keys)
    pub fn of<A: Serialize + ?Sized>(args: &A) -> Result<Self, KeyError> {
        let value = serde_json::to_value(args)?;
        Ok(Self::of_value(&value))
    }

    /// Compute key for an already-encoded JSON value
    #[must_use]
    pub fn of_value(value: &Value) -> Self {
        let mut canonical = String::new();
        write_canonical(value, &mut canonical);
        Self(*blake3::hash(canonical.as_bytes()).as_bytes())
    }

    /// Raw digest bytes
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 8 bytes as hex, for logs
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

impl Display for ArgsKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

impl fmt::Debug for ArgsKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ArgsKey({})", self.short())
    }
}
