//! Catalog references
//!
//! A [`CatalogReference`] names a catalog entity by id, path and type without
//! holding its body. Each variant resolves, through the injected
//! [`RetrieveByPath`], to the matching object kind only.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use crate::error::ResolveError;
use crate::object::{
    CatalogObject, DatasetCatalogObject, FolderCatalogObject, FunctionCatalogObject,
    HomeCatalogObject, SourceCatalogObject, SpaceCatalogObject,
};
use crate::path::CatalogPath;
use crate::resolve::RetrieveByPath;

/// Closed set of catalog entity types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CatalogReferenceType {
    Function,
    DatasetDirect,
    DatasetPromoted,
    DatasetVirtual,
    Folder,
    Source,
    Space,
    Home,
}

impl CatalogReferenceType {
    /// Wire name of the type
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "FUNCTION",
            Self::DatasetDirect => "DATASET_DIRECT",
            Self::DatasetPromoted => "DATASET_PROMOTED",
            Self::DatasetVirtual => "DATASET_VIRTUAL",
            Self::Folder => "FOLDER",
            Self::Source => "SOURCE",
            Self::Space => "SPACE",
            Self::Home => "HOME",
        }
    }

    #[inline]
    #[must_use]
    pub fn is_dataset(self) -> bool {
        matches!(
            self,
            Self::DatasetDirect | Self::DatasetPromoted | Self::DatasetVirtual
        )
    }

    /// Check if entities of this type have children
    #[inline]
    #[must_use]
    pub fn is_container(self) -> bool {
        matches!(self, Self::Folder | Self::Source | Self::Space | Self::Home)
    }
}

impl Display for CatalogReferenceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a dataset is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetType {
    /// Table addressed directly in a source
    Direct,
    /// File or folder promoted to a table
    Promoted,
    /// View defined by a query
    Virtual,
}

impl DatasetType {
    /// Reference type carrying this dataset type
    #[must_use]
    pub fn reference_type(self) -> CatalogReferenceType {
        match self {
            Self::Direct => CatalogReferenceType::DatasetDirect,
            Self::Promoted => CatalogReferenceType::DatasetPromoted,
            Self::Virtual => CatalogReferenceType::DatasetVirtual,
        }
    }
}

/// Listing or search entry a reference is built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub path: CatalogPath,
    #[serde(rename = "type")]
    pub reference_type: CatalogReferenceType,
    /// Display hints; opaque to this crate
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
}

/// Shared attributes of every reference variant
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceProperties {
    pub id: String,
    pub path: CatalogPath,
    pub properties: Map<String, Value>,
}

impl ReferenceProperties {
    #[must_use]
    pub fn new(id: impl Into<String>, path: CatalogPath) -> Self {
        Self {
            id: id.into(),
            path,
            properties: Map::new(),
        }
    }

    #[must_use]
    pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties = properties;
        self
    }
}

fn unexpected_kind(
    path: &CatalogPath,
    expected: CatalogReferenceType,
    object: &CatalogObject,
) -> ResolveError {
    ResolveError::UnexpectedKind {
        path: path.clone(),
        expected,
        actual: object.reference_type(),
    }
}

macro_rules! fixed_type_reference {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $object:ty) => {
        $(#[$doc])*
        #[derive(Clone)]
        pub struct $name {
            properties: ReferenceProperties,
            retriever: Arc<dyn RetrieveByPath>,
        }

        impl $name {
            /// Type of every reference of this kind
            pub const TYPE: CatalogReferenceType = CatalogReferenceType::$variant;

            #[must_use]
            pub fn new(properties: ReferenceProperties, retriever: Arc<dyn RetrieveByPath>) -> Self {
                Self {
                    properties,
                    retriever,
                }
            }

            #[inline]
            #[must_use]
            pub fn id(&self) -> &str {
                &self.properties.id
            }

            #[inline]
            #[must_use]
            pub fn path(&self) -> &CatalogPath {
                &self.properties.path
            }

            #[inline]
            #[must_use]
            pub fn properties(&self) -> &Map<String, Value> {
                &self.properties.properties
            }

            /// Resolve the referenced object
            ///
            /// # Errors
            /// Returns the resolver's failure unchanged, or
            /// `ResolveError::UnexpectedKind` if the path holds another kind
            pub async fn catalog_object(&self) -> Result<$object, ResolveError> {
                let path = self.path();
                tracing::debug!(%path, kind = %Self::TYPE, "resolving catalog reference");
                match self.retriever.retrieve_by_path(path).await? {
                    CatalogObject::$variant(object) => Ok(object),
                    other => Err(unexpected_kind(path, Self::TYPE, &other)),
                }
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("properties", &self.properties)
                    .finish_non_exhaustive()
            }
        }
    };
}

fixed_type_reference!(
    /// Reference to a user-defined function
    FunctionCatalogReference,
    Function,
    FunctionCatalogObject
);
fixed_type_reference!(
    /// Reference to a folder
    FolderCatalogReference,
    Folder,
    FolderCatalogObject
);
fixed_type_reference!(
    /// Reference to a source
    SourceCatalogReference,
    Source,
    SourceCatalogObject
);
fixed_type_reference!(
    /// Reference to a space
    SpaceCatalogReference,
    Space,
    SpaceCatalogObject
);
fixed_type_reference!(
    /// Reference to a home space
    HomeCatalogReference,
    Home,
    HomeCatalogObject
);

/// Reference to a dataset of any [`DatasetType`]
#[derive(Clone)]
pub struct DatasetCatalogReference {
    properties: ReferenceProperties,
    dataset_type: DatasetType,
    retriever: Arc<dyn RetrieveByPath>,
}

impl DatasetCatalogReference {
    #[must_use]
    pub fn new(
        properties: ReferenceProperties,
        dataset_type: DatasetType,
        retriever: Arc<dyn RetrieveByPath>,
    ) -> Self {
        Self {
            properties,
            dataset_type,
            retriever,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.properties.id
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &CatalogPath {
        &self.properties.path
    }

    #[inline]
    #[must_use]
    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties.properties
    }

    #[inline]
    #[must_use]
    pub fn dataset_type(&self) -> DatasetType {
        self.dataset_type
    }

    /// Resolve the referenced dataset
    ///
    /// Any dataset kind is accepted: a promoted folder reported as direct by a
    /// stale listing still resolves.
    ///
    /// # Errors
    /// Returns the resolver's failure unchanged, or
    /// `ResolveError::UnexpectedKind` if the path holds a non-dataset
    pub async fn catalog_object(&self) -> Result<DatasetCatalogObject, ResolveError> {
        let path = self.path();
        tracing::debug!(%path, dataset_type = ?self.dataset_type, "resolving dataset reference");
        match self.retriever.retrieve_by_path(path).await? {
            CatalogObject::Dataset(object) => Ok(object),
            other => Err(unexpected_kind(
                path,
                self.dataset_type.reference_type(),
                &other,
            )),
        }
    }
}

impl fmt::Debug for DatasetCatalogReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetCatalogReference")
            .field("properties", &self.properties)
            .field("dataset_type", &self.dataset_type)
            .finish_non_exhaustive()
    }
}

/// Handle to a catalog entity, one variant per entity kind
#[derive(Debug, Clone)]
pub enum CatalogReference {
    Function(FunctionCatalogReference),
    Dataset(DatasetCatalogReference),
    Folder(FolderCatalogReference),
    Source(SourceCatalogReference),
    Space(SpaceCatalogReference),
    Home(HomeCatalogReference),
}

impl CatalogReference {
    /// Build the reference matching an entry's type tag
    #[must_use]
    pub fn from_entry(entry: CatalogEntry, retriever: Arc<dyn RetrieveByPath>) -> Self {
        let properties =
            ReferenceProperties::new(entry.id, entry.path).with_properties(entry.properties);
        match entry.reference_type {
            CatalogReferenceType::Function => {
                Self::Function(FunctionCatalogReference::new(properties, retriever))
            }
            CatalogReferenceType::DatasetDirect => Self::Dataset(DatasetCatalogReference::new(
                properties,
                DatasetType::Direct,
                retriever,
            )),
            CatalogReferenceType::DatasetPromoted => Self::Dataset(DatasetCatalogReference::new(
                properties,
                DatasetType::Promoted,
                retriever,
            )),
            CatalogReferenceType::DatasetVirtual => Self::Dataset(DatasetCatalogReference::new(
                properties,
                DatasetType::Virtual,
                retriever,
            )),
            CatalogReferenceType::Folder => {
                Self::Folder(FolderCatalogReference::new(properties, retriever))
            }
            CatalogReferenceType::Source => {
                Self::Source(SourceCatalogReference::new(properties, retriever))
            }
            CatalogReferenceType::Space => {
                Self::Space(SpaceCatalogReference::new(properties, retriever))
            }
            CatalogReferenceType::Home => Self::Home(HomeCatalogReference::new(properties, retriever)),
        }
    }

    #[must_use]
    pub fn reference_type(&self) -> CatalogReferenceType {
        match self {
            Self::Function(_) => FunctionCatalogReference::TYPE,
            Self::Dataset(r) => r.dataset_type().reference_type(),
            Self::Folder(_) => FolderCatalogReference::TYPE,
            Self::Source(_) => SourceCatalogReference::TYPE,
            Self::Space(_) => SpaceCatalogReference::TYPE,
            Self::Home(_) => HomeCatalogReference::TYPE,
        }
    }

    fn shared(&self) -> &ReferenceProperties {
        match self {
            Self::Function(r) => &r.properties,
            Self::Dataset(r) => &r.properties,
            Self::Folder(r) => &r.properties,
            Self::Source(r) => &r.properties,
            Self::Space(r) => &r.properties,
            Self::Home(r) => &r.properties,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.shared().id
    }

    #[must_use]
    pub fn path(&self) -> &CatalogPath {
        &self.shared().path
    }

    #[must_use]
    pub fn properties(&self) -> &Map<String, Value> {
        &self.shared().properties
    }

    /// Listing entry equivalent to this reference
    #[must_use]
    pub fn to_entry(&self) -> CatalogEntry {
        let shared = self.shared();
        CatalogEntry {
            id: shared.id.clone(),
            path: shared.path.clone(),
            reference_type: self.reference_type(),
            properties: shared.properties.clone(),
        }
    }

    /// Resolve the referenced object through the variant's narrowed lookup
    ///
    /// # Errors
    /// Returns the failure arm for not-found, forbidden, kind mismatch or
    /// transport errors; no retries are attempted
    pub async fn catalog_object(&self) -> Result<CatalogObject, ResolveError> {
        Ok(match self {
            Self::Function(r) => CatalogObject::Function(r.catalog_object().await?),
            Self::Dataset(r) => CatalogObject::Dataset(r.catalog_object().await?),
            Self::Folder(r) => CatalogObject::Folder(r.catalog_object().await?),
            Self::Source(r) => CatalogObject::Source(r.catalog_object().await?),
            Self::Space(r) => CatalogObject::Space(r.catalog_object().await?),
            Self::Home(r) => CatalogObject::Home(r.catalog_object().await?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::MockRetrieveByPath;
    use mockall::predicate::eq;

    fn path(s: &str) -> CatalogPath {
        s.parse().unwrap()
    }

    fn function_object(p: &str) -> CatalogObject {
        CatalogObject::Function(FunctionCatalogObject {
            id: "fn-1".into(),
            path: path(p),
            tag: None,
            return_type: Some("INT".into()),
            function_body: Some("SELECT 1".into()),
            is_scalar: true,
            permissions: vec![],
        })
    }

    fn entry(p: &str, reference_type: CatalogReferenceType) -> CatalogEntry {
        CatalogEntry {
            id: format!("id-{p}"),
            path: path(p),
            reference_type,
            properties: Map::new(),
        }
    }

    #[tokio::test]
    async fn function_reference_resolves_narrowed_object() {
        let mut mock = MockRetrieveByPath::new();
        mock.expect_retrieve_by_path()
            .with(eq(path("udfs.add_one")))
            .times(1)
            .returning(|p| Ok(function_object(&p.to_string())));

        let reference = FunctionCatalogReference::new(
            ReferenceProperties::new("fn-1", path("udfs.add_one")),
            Arc::new(mock),
        );
        let object = reference.catalog_object().await.unwrap();
        assert_eq!(object.return_type.as_deref(), Some("INT"));
        assert_eq!(object.path, path("udfs.add_one"));
    }

    #[tokio::test]
    async fn unknown_path_yields_failure_branch() {
        let mut mock = MockRetrieveByPath::new();
        mock.expect_retrieve_by_path()
            .returning(|p| Err(ResolveError::not_found(p.clone())));

        let reference = CatalogReference::from_entry(
            entry("lake.gone", CatalogReferenceType::Folder),
            Arc::new(mock),
        );
        let result = reference.catalog_object().await;
        assert!(matches!(result, Err(ResolveError::NotFound { ref path }) if path.name() == "gone"));
    }

    #[tokio::test]
    async fn mismatched_kind_is_reported() {
        let mut mock = MockRetrieveByPath::new();
        mock.expect_retrieve_by_path()
            .returning(|p| Ok(function_object(&p.to_string())));

        let reference = CatalogReference::from_entry(
            entry("lake.raw", CatalogReferenceType::Folder),
            Arc::new(mock),
        );
        let err = reference.catalog_object().await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::UnexpectedKind {
                expected: CatalogReferenceType::Folder,
                actual: CatalogReferenceType::Function,
                ..
            }
        ));
    }

    #[test]
    fn from_entry_dispatches_by_type() {
        let retriever: Arc<dyn RetrieveByPath> = Arc::new(MockRetrieveByPath::new());
        let cases = [
            CatalogReferenceType::Function,
            CatalogReferenceType::DatasetDirect,
            CatalogReferenceType::DatasetPromoted,
            CatalogReferenceType::DatasetVirtual,
            CatalogReferenceType::Folder,
            CatalogReferenceType::Source,
            CatalogReferenceType::Space,
            CatalogReferenceType::Home,
        ];
        for reference_type in cases {
            let reference =
                CatalogReference::from_entry(entry("a.b", reference_type), retriever.clone());
            assert_eq!(reference.reference_type(), reference_type);
            assert_eq!(reference.to_entry().reference_type, reference_type);
        }
    }

    #[test]
    fn reference_type_wire_names() {
        let json = serde_json::to_string(&CatalogReferenceType::DatasetVirtual).unwrap();
        assert_eq!(json, "\"DATASET_VIRTUAL\"");
        assert_eq!(CatalogReferenceType::Home.to_string(), "HOME");
        assert!(CatalogReferenceType::Space.is_container());
        assert!(CatalogReferenceType::DatasetDirect.is_dataset());
        assert!(!CatalogReferenceType::Function.is_container());
    }

    #[test]
    fn entry_properties_are_kept() {
        let mut properties = Map::new();
        properties.insert("starred".into(), Value::Bool(true));
        let mut e = entry("lake.raw", CatalogReferenceType::Folder);
        e.properties = properties.clone();

        let reference = CatalogReference::from_entry(e, Arc::new(MockRetrieveByPath::new()));
        assert_eq!(reference.properties(), &properties);
        assert_eq!(reference.id(), "id-lake.raw");
    }
}
