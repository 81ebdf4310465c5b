//! Aggregate several pages of a paginated endpoint into one result

use serde::{Deserialize, Serialize};
use std::future::Future;

/// Parameters for fetching one page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    /// Zero-based page index
    pub index: u64,
    /// Item offset; `None` for the first page
    pub offset: Option<u64>,
    /// Page size
    pub limit: u64,
}

impl PageRequest {
    #[must_use]
    pub fn new(index: u64, page_size: u64) -> Self {
        Self {
            index,
            offset: (index > 0).then(|| index.saturating_mul(page_size)),
            limit: page_size,
        }
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Continuation token; absent when there are no further pages
    pub next: Option<String>,
}

impl<T> Page<T> {
    #[inline]
    #[must_use]
    pub fn new(items: Vec<T>, next: Option<String>) -> Self {
        Self { items, next }
    }
}

/// Concatenated items from consecutive pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    /// Items from every fetched page, in page order
    pub items: Vec<T>,
    /// Continuation token of the last fetched page
    pub next: Option<String>,
    pub pages_fetched: u64,
    pub requested: u64,
}

impl<T> Paginated<T> {
    /// Check if the server reported no further pages
    #[inline]
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.next.is_none()
    }

    /// Check if fewer pages than requested were fetched
    #[inline]
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.pages_fetched < self.requested
    }
}

/// Fetch up to `page_count` pages of `page_size` items and concatenate them
///
/// Pages are fetched one after another. Fetching stops early once a page
/// carries no continuation token; the items gathered so far are returned.
///
/// # Errors
/// Returns the first page error; items from earlier pages are discarded
pub async fn paginate<T, E, F, Fut>(
    page_count: u64,
    page_size: u64,
    mut fetch_page: F,
) -> Result<Paginated<T>, E>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let mut result = Paginated {
        items: Vec::new(),
        next: None,
        pages_fetched: 0,
        requested: page_count,
    };

    for index in 0..page_count {
        let page = fetch_page(PageRequest::new(index, page_size)).await?;
        result.items.extend(page.items);
        result.next = page.next;
        result.pages_fetched += 1;

        if result.next.is_none() {
            if index + 1 < page_count {
                tracing::debug!(index, requested = page_count, "no continuation token, stopping");
            }
            break;
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn first_page_has_no_offset() {
        assert_eq!(PageRequest::new(0, 100).offset, None);
        assert_eq!(PageRequest::new(3, 100).offset, Some(300));
    }

    #[tokio::test]
    async fn concatenates_pages_in_order() {
        let result: Paginated<u64> = paginate(3, 2, |req| async move {
            let start = req.offset.unwrap_or(0);
            Ok::<_, std::convert::Infallible>(Page::new(
                vec![start, start + 1],
                Some(format!("t{}", req.index)),
            ))
        })
        .await
        .unwrap();

        assert_eq!(result.items, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(result.next.as_deref(), Some("t2"));
        assert!(!result.is_partial());
    }

    #[tokio::test]
    async fn first_page_without_token_stops() {
        let mut seen = Vec::new();
        let result: Paginated<u64> = paginate(4, 10, |req| {
            seen.push(req.index);
            async move { Ok::<_, std::convert::Infallible>(Page::new(vec![req.index], None)) }
        })
        .await
        .unwrap();

        assert_eq!(seen, vec![0]);
        assert_eq!(result.items, vec![0]);
        assert!(result.is_partial());
    }

    #[tokio::test]
    async fn page_error_aborts() {
        let result: Result<Paginated<u64>, &str> = paginate(4, 10, |req| async move {
            if req.index == 2 {
                Err("boom")
            } else {
                Ok(Page::new(vec![req.index], Some("more".into())))
            }
        })
        .await;
        assert_eq!(result, Err("boom"));
    }

    #[tokio::test]
    async fn zero_pages_fetches_nothing() {
        let result: Paginated<u64> = paginate(0, 10, |_| async {
            Err::<Page<u64>, _>("never called")
        })
        .await
        .unwrap();
        assert!(result.items.is_empty());
        assert_eq!(result.pages_fetched, 0);
    }
}
