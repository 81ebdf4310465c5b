//! dcat HTTP Client
//!
//! Talks to the catalog server's v3 API and composes the fetch resources
//! on top of it.
//!
//! - [`Client`]: `reqwest`-based client; implements
//!   [`RetrieveByPath`](dcat_catalog::RetrieveByPath) and [`JobsApi`]
//! - [`ReflectionJobsResource`]: cached, paginated and polled job listings
//! - [`ClientConfig`]: TOML-loadable settings
//!
//! # Example
//!
//! ```rust,ignore
//! use dcat_client::{Client, ClientConfig, JobsQuery, ReflectionJobsResource};
//! use std::sync::Arc;
//!
//! let config = ClientConfig::load("dcat.toml")?;
//! let client = Arc::new(Client::from_config(&config)?);
//! let jobs = ReflectionJobsResource::new(client, &config);
//! let first_three = jobs.paginated("reflection-id", 3, &JobsQuery::newest_first()).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod client;
mod config;
mod error;
mod jobs;
mod reflection_jobs;

pub use client::Client;
pub use config::ClientConfig;
pub use error::{ClientError, ConfigError, Result};
pub use jobs::{
    JobSummary, JobsApi, JobsPage, JobsQuery, ReflectionJobsRequest, SortOrder, SORT_START_TIME,
};
pub use reflection_jobs::{JobsFetchError, ReflectionJobsResource};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
