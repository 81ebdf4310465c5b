//! dcat Catalog References
//!
//! Typed handles to catalog entities and their resolution to full objects.
//!
//! # Core Concepts
//!
//! - [`CatalogPath`]: non-empty segment path naming an entity
//! - [`CatalogReference`]: tagged union of reference kinds (function, dataset,
//!   folder, source, space, home)
//! - [`CatalogObject`]: resolved entity body (schema, children, permissions)
//! - [`RetrieveByPath`]: injected lookup used by every reference
//!
//! # Example
//!
//! ```rust,ignore
//! use dcat_catalog::{CatalogEntry, CatalogReference};
//!
//! let reference = CatalogReference::from_entry(entry, client.clone());
//! match reference.catalog_object().await {
//!     Ok(object) => println!("{} has {} children", object.path(), object.children().len()),
//!     Err(err) if err.is_not_found() => println!("gone"),
//!     Err(err) => return Err(err.into()),
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod object;
mod path;
mod reference;
mod resolve;

pub use error::{PathError, ResolveError, TransportError};
pub use object::{
    CatalogObject, DatasetCatalogObject, FolderCatalogObject, FunctionCatalogObject,
    HomeCatalogObject, SchemaField, SourceCatalogObject, SpaceCatalogObject,
};
pub use path::CatalogPath;
pub use reference::{
    CatalogEntry, CatalogReference, CatalogReferenceType, DatasetCatalogReference, DatasetType,
    FolderCatalogReference, FunctionCatalogReference, HomeCatalogReference, ReferenceProperties,
    SourceCatalogReference, SpaceCatalogReference,
};
pub use resolve::{retrieve_fn, FnRetriever, RetrieveByPath};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
