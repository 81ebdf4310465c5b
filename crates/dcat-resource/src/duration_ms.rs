//! Serde helper encoding a [`Duration`] as whole milliseconds
//!
//! ```rust,ignore
//! #[derive(Serialize, Deserialize)]
//! struct Config {
//!     #[serde(with = "dcat_resource::duration_ms")]
//!     timeout: Duration,
//! }
//! ```

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Serialize as milliseconds
///
/// # Errors
/// Propagates the serializer's error
pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    serializer.serialize_u64(millis)
}

/// Deserialize from milliseconds
///
/// # Errors
/// Propagates the deserializer's error
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "super")]
        every: Duration,
    }

    #[test]
    fn duration_as_millis() {
        let w = Wrapper {
            every: Duration::from_secs(5),
        };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"every":5000}"#);
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back, w);
    }
}
