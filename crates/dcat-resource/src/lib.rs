//! dcat Fetch Resources
//!
//! Wrappers that turn a plain async fetch function into something a client
//! can call freely:
//!
//! - [`CachedFetchResource`]: memoizes by argument structure, coalesces
//!   concurrent identical calls, bounds entries by age and count
//! - [`PollingResource`]: re-fetches on a fixed interval while subscribed
//! - [`paginate`]: gathers consecutive pages into one result
//!
//! # Example
//!
//! ```rust,ignore
//! use dcat_resource::{CacheConfig, CachedFetchResource};
//!
//! let jobs = CachedFetchResource::new(move |req| api.list_jobs(req), CacheConfig::default());
//! let page = jobs.get(request.clone()).await?;
//! let again = jobs.get(request).await?; // served from cache
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod cache;
pub mod duration_ms;
mod error;
mod key;
mod paginate;
mod polling;

pub use cache::{CacheConfig, CacheStats, CachedFetchResource};
pub use error::{CacheError, KeyError};
pub use key::ArgsKey;
pub use paginate::{paginate, Page, PageRequest, Paginated};
pub use polling::{
    PollHandle, PollSnapshot, PollSubscription, PollingConfig, PollingResource, MIN_POLL_INTERVAL,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
