//! Error types for preference storage

use std::path::PathBuf;

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors from a preference store backend
///
/// Malformed stored values are not errors: typed accessors recover them.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed
    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value could not be encoded
    #[error("cannot encode preference {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Store used before `init` or after `teardown`
    #[error("preference store is closed")]
    Closed,
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn encode(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Encode {
            key: key.into(),
            source,
        }
    }
}
