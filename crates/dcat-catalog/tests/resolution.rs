use dcat_catalog::{
    retrieve_fn, CatalogEntry, CatalogObject, CatalogPath, CatalogReference,
    CatalogReferenceType, DatasetCatalogObject, DatasetType, ResolveError, RetrieveByPath,
};
use serde_json::Map;
use std::collections::HashMap;
use std::sync::Arc;

fn path(s: &str) -> CatalogPath {
    s.parse().unwrap()
}

fn dataset(p: &str, dataset_type: DatasetType) -> CatalogObject {
    CatalogObject::Dataset(DatasetCatalogObject {
        id: format!("ds-{p}"),
        path: path(p),
        dataset_type,
        tag: Some("v1".into()),
        fields: vec![],
        created_at: None,
        permissions: vec!["SELECT".into()],
    })
}

fn catalog_retriever(objects: Vec<CatalogObject>) -> Arc<dyn RetrieveByPath> {
    let by_path: Arc<HashMap<CatalogPath, CatalogObject>> = Arc::new(
        objects
            .into_iter()
            .map(|o| (o.path().clone(), o))
            .collect(),
    );
    Arc::new(retrieve_fn(move |p: CatalogPath| {
        let by_path = by_path.clone();
        async move {
            if p.root() == "private" {
                return Err(ResolveError::forbidden(p));
            }
            if p.root() == "offline" {
                let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
                return Err(ResolveError::transport(p, io));
            }
            by_path
                .get(&p)
                .cloned()
                .ok_or_else(|| ResolveError::not_found(p))
        }
    }))
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
async fn dataset_reference_resolves() {
    let retriever = catalog_retriever(vec![dataset("lake.trips", DatasetType::Promoted)]);
    let reference = CatalogReference::from_entry(
        entry("lake.trips", CatalogReferenceType::DatasetPromoted),
        retriever,
    );

    let CatalogReference::Dataset(dataset_ref) = &reference else {
        panic!("expected dataset reference");
    };
    let object = dataset_ref.catalog_object().await.unwrap();
    assert_eq!(object.tag.as_deref(), Some("v1"));

    let wide = reference.catalog_object().await.unwrap();
    assert_eq!(wide.reference_type(), CatalogReferenceType::DatasetPromoted);
}

#[tokio::test]
async fn failures_are_typed_by_cause() {
    let retriever = catalog_retriever(vec![]);

    let missing = CatalogReference::from_entry(
        entry("lake.nothing", CatalogReferenceType::DatasetDirect),
        retriever.clone(),
    );
    let err = missing.catalog_object().await.unwrap_err();
    assert!(err.is_not_found());

    let denied = CatalogReference::from_entry(
        entry("private.salaries", CatalogReferenceType::DatasetVirtual),
        retriever.clone(),
    );
    assert!(matches!(
        denied.catalog_object().await,
        Err(ResolveError::Forbidden { .. })
    ));

    let offline = CatalogReference::from_entry(
        entry("offline.x", CatalogReferenceType::Source),
        retriever,
    );
    let err = offline.catalog_object().await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(err.path(), &path("offline.x"));
}

#[tokio::test]
async fn references_do_not_cache_objects() {
    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = calls.clone();
    let retriever: Arc<dyn RetrieveByPath> = Arc::new(retrieve_fn(move |p: CatalogPath| {
        counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        async move { Ok(dataset(&p.to_string(), DatasetType::Virtual)) }
    }));
    let reference = CatalogReference::from_entry(
        entry("views.daily", CatalogReferenceType::DatasetVirtual),
        retriever,
    );

    reference.catalog_object().await.unwrap();
    reference.catalog_object().await.unwrap();
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
}
