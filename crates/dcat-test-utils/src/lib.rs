//! Testing utilities for the dcat workspace
//!
//! Shared fixtures: an in-memory catalog behind [`RetrieveByPath`] and a
//! paged fake of the reflection jobs API.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use dashmap::DashMap;
use dcat_catalog::{
    CatalogEntry, CatalogObject, CatalogPath, DatasetCatalogObject, DatasetType,
    FolderCatalogObject, FunctionCatalogObject, ResolveError, RetrieveByPath, SchemaField,
    SpaceCatalogObject,
};
use dcat_client::{ClientError, JobSummary, JobsApi, JobsPage, ReflectionJobsRequest};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn path(s: &str) -> CatalogPath {
    s.parse().unwrap()
}

pub fn dataset_object(p: &str, dataset_type: DatasetType) -> CatalogObject {
    CatalogObject::Dataset(DatasetCatalogObject {
        id: format!("ds:{p}"),
        path: path(p),
        dataset_type,
        tag: Some("0".into()),
        fields: vec![SchemaField {
            name: "id".into(),
            data_type: "BIGINT".into(),
        }],
        created_at: None,
        permissions: vec!["SELECT".into()],
    })
}

pub fn function_object(p: &str) -> CatalogObject {
    CatalogObject::Function(FunctionCatalogObject {
        id: format!("fn:{p}"),
        path: path(p),
        tag: None,
        return_type: Some("INT".into()),
        function_body: Some("SELECT 1".into()),
        is_scalar: true,
        permissions: vec![],
    })
}

pub fn folder_object(p: &str, children: Vec<CatalogEntry>) -> CatalogObject {
    CatalogObject::Folder(FolderCatalogObject {
        id: format!("folder:{p}"),
        path: path(p),
        tag: None,
        children,
        permissions: vec![],
    })
}

pub fn space_object(p: &str, children: Vec<CatalogEntry>) -> CatalogObject {
    CatalogObject::Space(SpaceCatalogObject {
        id: format!("space:{p}"),
        path: path(p),
        tag: None,
        children,
        permissions: vec![],
    })
}

/// Listing entry pointing at `object`
pub fn entry_for(object: &CatalogObject) -> CatalogEntry {
    CatalogEntry {
        id: object.id().to_string(),
        path: object.path().clone(),
        reference_type: object.reference_type(),
        properties: serde_json::Map::new(),
    }
}

/// Catalog held in memory, keyed by path
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    objects: DashMap<CatalogPath, CatalogObject>,
    forbidden: Mutex<HashSet<CatalogPath>>,
    offline: Mutex<bool>,
    calls: AtomicUsize,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_objects(objects: impl IntoIterator<Item = CatalogObject>) -> Self {
        let catalog = Self::new();
        for object in objects {
            catalog.insert(object);
        }
        catalog
    }

    pub fn insert(&self, object: CatalogObject) {
        self.objects.insert(object.path().clone(), object);
    }

    pub fn remove(&self, path: &CatalogPath) {
        self.objects.remove(path);
    }

    /// Deny access to `path` (exact match)
    pub fn forbid(&self, path: CatalogPath) {
        self.forbidden.lock().insert(path);
    }

    /// Make every lookup fail with a transport error
    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock() = offline;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RetrieveByPath for MemoryCatalog {
    async fn retrieve_by_path(&self, path: &CatalogPath) -> Result<CatalogObject, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.offline.lock() {
            let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "catalog offline");
            return Err(ResolveError::transport(path.clone(), io));
        }
        if self.forbidden.lock().contains(path) {
            return Err(ResolveError::forbidden(path.clone()));
        }
        self.objects
            .get(path)
            .map(|o| o.value().clone())
            .ok_or_else(|| ResolveError::not_found(path.clone()))
    }
}

/// Reflection jobs API serving a fixed job list in pages
///
/// Job `i` has id `job-{i}` and starts `i` seconds after the epoch origin
/// used here. Pages carry a `next` token while jobs remain.
#[derive(Debug)]
pub struct FakeJobsBackend {
    total_jobs: usize,
    delay: Duration,
    fail_offsets: Mutex<HashSet<u64>>,
    requests: Mutex<Vec<ReflectionJobsRequest>>,
}

impl FakeJobsBackend {
    pub fn new(total_jobs: usize) -> Self {
        Self {
            total_jobs,
            delay: Duration::ZERO,
            fail_offsets: Mutex::new(HashSet::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sleep (tokio time) before answering each request
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Answer requests at `offset` (0 for the first page) with a 500
    pub fn fail_at_offset(&self, offset: u64) {
        self.fail_offsets.lock().insert(offset);
    }

    pub fn clear_failures(&self) {
        self.fail_offsets.lock().clear();
    }

    pub fn requests(&self) -> Vec<ReflectionJobsRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn job(index: usize) -> JobSummary {
        let mut job = JobSummary::new(format!("job-{index}"), "COMPLETED");
        let start = 1_700_000_000_000_i64 + i64::try_from(index).unwrap() * 1000;
        job.start_time = Utc.timestamp_millis_opt(start).single();
        job.query_type = Some("ACCELERATOR_CREATE".into());
        job
    }
}

#[async_trait]
impl JobsApi for FakeJobsBackend {
    async fn list_reflection_jobs(
        &self,
        request: ReflectionJobsRequest,
    ) -> Result<JobsPage, ClientError> {
        self.requests.lock().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let offset = request.offset.unwrap_or(0);
        if self.fail_offsets.lock().contains(&offset) {
            return Err(ClientError::ApiError {
                code: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                message: format!("injected failure at offset {offset}"),
            });
        }

        let start = usize::try_from(offset).unwrap().min(self.total_jobs);
        let end = (start + usize::try_from(request.limit).unwrap()).min(self.total_jobs);
        let jobs = (start..end).map(Self::job).collect();
        let next = (end < self.total_jobs).then(|| {
            format!(
                "/api/v3/reflection/{}/jobs?offset={end}",
                request.reflection_id
            )
        });
        Ok(JobsPage { jobs, next })
    }
}
