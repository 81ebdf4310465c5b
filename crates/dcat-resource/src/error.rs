//! Error types for fetch resources

use std::sync::Arc;

/// Fetch arguments could not be turned into a cache key
#[derive(Debug, thiserror::Error)]
#[error("cannot derive cache key from fetch arguments: {0}")]
pub struct KeyError(#[from] serde_json::Error);

/// Errors returned by [`CachedFetchResource::get`](crate::CachedFetchResource::get)
#[derive(Debug, thiserror::Error)]
pub enum CacheError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Arguments are not representable as a key
    #[error(transparent)]
    Key(#[from] KeyError),

    /// The underlying fetch failed
    ///
    /// Every caller that was waiting on the same in-flight fetch receives the
    /// same shared error.
    #[error(transparent)]
    Fetch(Arc<E>),
}

impl<E> CacheError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The fetch error, if the failure came from the fetch
    #[must_use]
    pub fn fetch_error(&self) -> Option<&E> {
        match self {
            Self::Fetch(err) => Some(err.as_ref()),
            Self::Key(_) => None,
        }
    }
}
