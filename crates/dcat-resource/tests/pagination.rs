use dcat_resource::{paginate, CacheConfig, CacheError, CachedFetchResource, Page, PageRequest};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
#[error("no such page")]
struct NoSuchPage;

/// Three pages of 100 items; pages 0 and 1 carry a continuation token
fn three_page_backend() -> (
    CachedFetchResource<PageRequest, Page<u64>, NoSuchPage>,
    Arc<AtomicUsize>,
) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let resource = CachedFetchResource::new(
        move |req: PageRequest| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if req.index > 2 {
                    return Err(NoSuchPage);
                }
                let start = req.offset.unwrap_or(0);
                let items = (start..start + req.limit).collect();
                let next = (req.index < 2).then(|| format!("page-{}", req.index + 1));
                Ok(Page::new(items, next))
            }
        },
        CacheConfig::default(),
    );
    (resource, calls)
}

#[tokio::test]
async fn stops_at_page_without_token() {
    for requested in [3, 5] {
        let (resource, calls) = three_page_backend();
        let result = paginate(requested, 100, |req| resource.get(req)).await.unwrap();

        assert_eq!(result.items.len(), 300);
        assert_eq!(result.items.first(), Some(&0));
        assert_eq!(result.items.last(), Some(&299));
        assert_eq!(result.pages_fetched, 3);
        assert!(result.is_exhausted());
        assert_eq!(result.is_partial(), requested > 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}

#[tokio::test]
async fn repeated_aggregation_is_served_from_cache() {
    let (resource, calls) = three_page_backend();
    let first = paginate(2, 100, |req| resource.get(req)).await.unwrap();
    let second = paginate(3, 100, |req| resource.get(req)).await.unwrap();

    assert_eq!(first.items.len(), 200);
    assert_eq!(first.next.as_deref(), Some("page-2"));
    assert_eq!(second.items.len(), 300);
    // Pages 0 and 1 reused, only page 2 fetched
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn page_failure_aborts_aggregation() {
    let resource: CachedFetchResource<PageRequest, Page<u64>, NoSuchPage> =
        CachedFetchResource::new(
            |req: PageRequest| async move {
                if req.index == 1 {
                    Err(NoSuchPage)
                } else {
                    Ok(Page::new(vec![req.index], Some("more".into())))
                }
            },
            CacheConfig::default(),
        );

    let err = paginate(3, 100, |req| resource.get(req)).await.unwrap_err();
    assert!(matches!(err, CacheError::Fetch(_)));
    assert!(err.fetch_error().is_some());
}
