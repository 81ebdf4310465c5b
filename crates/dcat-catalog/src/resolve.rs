//! Path retrieval seam
//!
//! [`RetrieveByPath`] is injected into every reference. The HTTP client
//! implements it; tests use stubs, mocks or [`retrieve_fn`].

use async_trait::async_trait;
use std::fmt;
use std::future::Future;

use crate::error::ResolveError;
use crate::object::CatalogObject;
use crate::path::CatalogPath;

/// Looks up a catalog object by path
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RetrieveByPath: Send + Sync {
    /// Retrieve the object at `path`
    ///
    /// # Errors
    /// `NotFound` / `Forbidden` for application-level outcomes, `Transport`
    /// for network or protocol failures
    async fn retrieve_by_path(&self, path: &CatalogPath) -> Result<CatalogObject, ResolveError>;
}

/// Closure-backed [`RetrieveByPath`]
pub struct FnRetriever<F> {
    f: F,
}

/// Adapt an async closure into a [`RetrieveByPath`]
///
/// ```rust,ignore
/// let retriever = retrieve_fn(|path| async move { Err(ResolveError::not_found(path)) });
/// ```
pub fn retrieve_fn<F, Fut>(f: F) -> FnRetriever<F>
where
    F: Fn(CatalogPath) -> Fut + Send + Sync,
    Fut: Future<Output = Result<CatalogObject, ResolveError>> + Send,
{
    FnRetriever { f }
}

#[async_trait]
impl<F, Fut> RetrieveByPath for FnRetriever<F>
where
    F: Fn(CatalogPath) -> Fut + Send + Sync,
    Fut: Future<Output = Result<CatalogObject, ResolveError>> + Send,
{
    async fn retrieve_by_path(&self, path: &CatalogPath) -> Result<CatalogObject, ResolveError> {
        (self.f)(path.clone()).await
    }
}

impl<F> fmt::Debug for FnRetriever<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRetriever").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::SpaceCatalogObject;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn retrieve_fn_passes_path_through() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let retriever = retrieve_fn(move |path: CatalogPath| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(CatalogObject::Space(SpaceCatalogObject {
                    id: "s".into(),
                    path,
                    tag: None,
                    children: vec![],
                    permissions: vec![],
                }))
            }
        });

        let path: CatalogPath = "analytics".parse().unwrap();
        let object = retriever.retrieve_by_path(&path).await.unwrap();
        assert_eq!(object.path(), &path);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
