//! Cached, paginated and polled views of a reflection's jobs

use dcat_resource::{
    paginate, CacheError, CachedFetchResource, Page, PollSubscription, PollingResource,
};
use std::fmt;
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::jobs::{JobsApi, JobsPage, JobsQuery, ReflectionJobsRequest};

/// Error from a cached jobs fetch
pub type JobsFetchError = CacheError<ClientError>;

/// Jobs resources for reflections, sharing one page cache
///
/// - [`page`](Self::page): single cached page
/// - [`paginated`](Self::paginated): several consecutive pages through the cache
/// - [`poll`](Self::poll): newest jobs of one reflection, refreshed on an interval
pub struct ReflectionJobsResource {
    jobs_cache: CachedFetchResource<ReflectionJobsRequest, JobsPage, ClientError>,
    polling: PollingResource<String, JobsPage, ClientError>,
    page_size: u64,
}

impl ReflectionJobsResource {
    /// Build the resources over `api` with limits from `config`
    pub fn new<J: JobsApi>(api: Arc<J>, config: &ClientConfig) -> Self {
        let cache_api = Arc::clone(&api);
        let jobs_cache = CachedFetchResource::new(
            move |request: ReflectionJobsRequest| {
                let api = Arc::clone(&cache_api);
                async move { api.list_reflection_jobs(request).await }
            },
            config.jobs_cache,
        );

        let page_size = config.jobs_page_size;
        let polling = PollingResource::new(
            move |reflection_id: String| {
                let api = Arc::clone(&api);
                let request = JobsQuery::newest_first().to_request(reflection_id, None, page_size);
                async move { api.list_reflection_jobs(request).await }
            },
            config.jobs_polling,
        );

        Self {
            jobs_cache,
            polling,
            page_size,
        }
    }

    /// Fetch one page through the cache
    ///
    /// # Errors
    /// Returns the (shared) fetch error
    pub async fn page(&self, request: ReflectionJobsRequest) -> Result<JobsPage, JobsFetchError> {
        self.jobs_cache.get(request).await
    }

    /// Fetch up to `page_count` pages of `query` and concatenate their jobs
    ///
    /// Stops after a page without a continuation token; `next` of the
    /// result is the token of the last page fetched.
    ///
    /// # Errors
    /// Returns the first page's fetch error
    pub async fn paginated(
        &self,
        reflection_id: &str,
        page_count: u64,
        query: &JobsQuery,
    ) -> Result<JobsPage, JobsFetchError> {
        let aggregated = paginate(page_count, self.page_size, |page| {
            let request = query.to_request(reflection_id, page.offset, page.limit);
            async move {
                let JobsPage { jobs, next } = self.jobs_cache.get(request).await?;
                Ok::<_, JobsFetchError>(Page::new(jobs, next))
            }
        })
        .await?;

        tracing::debug!(
            reflection_id,
            pages = aggregated.pages_fetched,
            jobs = aggregated.items.len(),
            "reflection jobs aggregated"
        );
        Ok(JobsPage {
            jobs: aggregated.items,
            next: aggregated.next,
        })
    }

    /// Subscribe to the newest jobs of `reflection_id`
    ///
    /// Polling a different reflection replaces the running poll.
    pub fn poll(&self, reflection_id: impl Into<String>) -> PollSubscription<JobsPage, ClientError> {
        self.polling.subscribe(reflection_id.into())
    }

    /// Stop the running poll, if any
    pub fn stop_polling(&self) {
        self.polling.stop();
    }

    #[inline]
    #[must_use]
    pub fn cache(&self) -> &CachedFetchResource<ReflectionJobsRequest, JobsPage, ClientError> {
        &self.jobs_cache
    }

    #[inline]
    #[must_use]
    pub fn page_size(&self) -> u64 {
        self.page_size
    }
}

impl fmt::Debug for ReflectionJobsResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectionJobsResource")
            .field("jobs_cache", &self.jobs_cache)
            .field("polling", &self.polling)
            .field("page_size", &self.page_size)
            .finish()
    }
}
