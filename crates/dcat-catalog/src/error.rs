//! Error types for catalog references
//!
//! Resolution failures are split by cause:
//! - application-level outcomes (`NotFound`, `Forbidden`, `UnexpectedKind`)
//! - transport failures, carried opaquely from the resolver

use crate::path::CatalogPath;
use crate::reference::CatalogReferenceType;

/// Boxed transport error from a resolver implementation
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors related to catalog paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Path has no segments
    #[error("catalog path is empty")]
    Empty,

    /// Empty segment in path
    #[error("catalog path contains an empty segment")]
    EmptySegment,

    /// Quoted segment never closed
    #[error("unterminated quote in catalog path: {0}")]
    UnterminatedQuote(String),

    /// Characters after a closing quote
    #[error("invalid segment in catalog path: {0}")]
    InvalidSegment(String),
}

/// Errors from resolving a catalog reference to its object
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No entity exists at the path
    #[error("catalog entity not found: {path}")]
    NotFound { path: CatalogPath },

    /// Caller may not read the entity
    #[error("access to catalog entity denied: {path}")]
    Forbidden { path: CatalogPath },

    /// Resolver returned an object of another kind than the reference
    #[error("expected {expected} at {path}, resolver returned {actual}")]
    UnexpectedKind {
        path: CatalogPath,
        expected: CatalogReferenceType,
        actual: CatalogReferenceType,
    },

    /// Network or protocol failure, propagated as-is
    #[error("transport error resolving {path}: {source}")]
    Transport {
        path: CatalogPath,
        #[source]
        source: TransportError,
    },
}

impl ResolveError {
    /// Create not-found error for path
    #[must_use]
    pub fn not_found(path: CatalogPath) -> Self {
        Self::NotFound { path }
    }

    /// Create forbidden error for path
    #[must_use]
    pub fn forbidden(path: CatalogPath) -> Self {
        Self::Forbidden { path }
    }

    /// Wrap a transport failure
    pub fn transport(path: CatalogPath, source: impl Into<TransportError>) -> Self {
        Self::Transport {
            path,
            source: source.into(),
        }
    }

    /// Path the failed resolution was for
    #[must_use]
    pub fn path(&self) -> &CatalogPath {
        match self {
            Self::NotFound { path }
            | Self::Forbidden { path }
            | Self::UnexpectedKind { path, .. }
            | Self::Transport { path, .. } => path,
        }
    }

    /// Check if the failure came from the transport rather than the catalog
    #[inline]
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Check if the entity is missing
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_error_display() {
        let path: CatalogPath = "lake.missing".parse().unwrap();
        let err = ResolveError::not_found(path);
        assert_eq!(err.to_string(), "catalog entity not found: lake.missing");
        assert!(err.is_not_found());
        assert!(!err.is_transport());
    }

    #[test]
    fn resolve_error_transport_keeps_source() {
        let path: CatalogPath = "lake".parse().unwrap();
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = ResolveError::transport(path.clone(), io);
        assert!(err.is_transport());
        assert_eq!(err.path(), &path);
        assert!(std::error::Error::source(&err).is_some());
    }
}
