//! Resolved catalog objects
//!
//! A [`CatalogObject`] is the full body of a catalog entity as returned by the
//! path lookup endpoint. The wire form is tagged by `entityType`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::path::CatalogPath;
use crate::reference::{CatalogEntry, CatalogReferenceType, DatasetType};

/// Fully resolved catalog entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entityType", rename_all = "lowercase")]
pub enum CatalogObject {
    /// User-defined function
    Function(FunctionCatalogObject),
    /// Physical or virtual dataset
    Dataset(DatasetCatalogObject),
    /// Folder inside a source or space
    Folder(FolderCatalogObject),
    /// External data source
    Source(SourceCatalogObject),
    /// Shared space
    Space(SpaceCatalogObject),
    /// User home space
    Home(HomeCatalogObject),
}

impl CatalogObject {
    /// Reference type this object resolves for
    #[must_use]
    pub fn reference_type(&self) -> CatalogReferenceType {
        match self {
            Self::Function(_) => CatalogReferenceType::Function,
            Self::Dataset(d) => d.dataset_type.reference_type(),
            Self::Folder(_) => CatalogReferenceType::Folder,
            Self::Source(_) => CatalogReferenceType::Source,
            Self::Space(_) => CatalogReferenceType::Space,
            Self::Home(_) => CatalogReferenceType::Home,
        }
    }

    /// Entity id
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Function(o) => &o.id,
            Self::Dataset(o) => &o.id,
            Self::Folder(o) => &o.id,
            Self::Source(o) => &o.id,
            Self::Space(o) => &o.id,
            Self::Home(o) => &o.id,
        }
    }

    /// Entity path
    #[must_use]
    pub fn path(&self) -> &CatalogPath {
        match self {
            Self::Function(o) => &o.path,
            Self::Dataset(o) => &o.path,
            Self::Folder(o) => &o.path,
            Self::Source(o) => &o.path,
            Self::Space(o) => &o.path,
            Self::Home(o) => &o.path,
        }
    }

    /// Privileges granted to the caller on this entity
    #[must_use]
    pub fn permissions(&self) -> &[String] {
        match self {
            Self::Function(o) => &o.permissions,
            Self::Dataset(o) => &o.permissions,
            Self::Folder(o) => &o.permissions,
            Self::Source(o) => &o.permissions,
            Self::Space(o) => &o.permissions,
            Self::Home(o) => &o.permissions,
        }
    }

    /// Child entries for containers, empty for functions and datasets
    #[must_use]
    pub fn children(&self) -> &[CatalogEntry] {
        match self {
            Self::Folder(o) => &o.children,
            Self::Source(o) => &o.children,
            Self::Space(o) => &o.children,
            Self::Home(o) => &o.children,
            Self::Function(_) | Self::Dataset(_) => &[],
        }
    }
}

/// Column in a dataset schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCatalogObject {
    pub id: String,
    pub path: CatalogPath,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub function_body: Option<String>,
    #[serde(default)]
    pub is_scalar: bool,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetCatalogObject {
    pub id: String,
    pub path: CatalogPath,
    #[serde(rename = "type")]
    pub dataset_type: DatasetType,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub fields: Vec<SchemaField>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderCatalogObject {
    pub id: String,
    pub path: CatalogPath,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub children: Vec<CatalogEntry>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCatalogObject {
    pub id: String,
    pub path: CatalogPath,
    /// Connector type, e.g. `S3` or `POSTGRES`
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub children: Vec<CatalogEntry>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceCatalogObject {
    pub id: String,
    pub path: CatalogPath,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub children: Vec<CatalogEntry>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeCatalogObject {
    pub id: String,
    pub path: CatalogPath,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub children: Vec<CatalogEntry>,
    #[serde(default)]
    pub permissions: Vec<String>,
}
