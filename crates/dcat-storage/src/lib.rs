//! dcat Preference Storage
//!
//! Persists client-side preferences (pinned items, editor state, job-list
//! layout, signed-in user) as JSON strings in a pluggable key-value store.
//!
//! - [`PreferenceStore`]: backend trait, with [`MemoryStore`] and [`FileStore`]
//! - [`Preferences`]: typed accessors that heal corrupt stored values

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod prefs;
mod store;

pub use error::{Result, StorageError};
pub use prefs::{
    keys, AppState, ExploreState, GridTask, HomeState, Preferences, UserData, GRID_TASK_LIFETIME,
};
pub use store::{FileStore, MemoryStore, PreferenceStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
