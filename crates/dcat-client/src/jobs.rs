//! Reflection jobs listing: query model and API seam

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use crate::error::ClientError;

/// Sort column for newest-first listings (job start time)
pub const SORT_START_TIME: &str = "st";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "ASCENDING",
            Self::Descending => "DESCENDING",
        }
    }
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ASCENDING" | "ASC" => Ok(Self::Ascending),
            "DESCENDING" | "DESC" => Ok(Self::Descending),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

/// Jobs list query as a user states it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobsQuery {
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
    /// Filter key -> accepted values
    pub filters: BTreeMap<String, Vec<String>>,
}

impl JobsQuery {
    /// Newest jobs first, unfiltered
    #[must_use]
    pub fn newest_first() -> Self {
        Self {
            sort: Some(SORT_START_TIME.to_string()),
            order: Some(SortOrder::Descending),
            filters: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_sort(mut self, sort: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(sort.into());
        self.order = Some(order);
        self
    }

    #[must_use]
    pub fn with_filter<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters
            .insert(key.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Backend filter expression, or `None` when no filter has values
    ///
    /// Each key contributes `(key=="v1",key=="v2")`; clauses are joined by
    /// `;` in key order.
    #[must_use]
    pub fn filter_expression(&self) -> Option<String> {
        let clauses: Vec<String> = self
            .filters
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(key, values)| {
                let terms: Vec<String> = values
                    .iter()
                    .map(|v| format!("{key}=={}", quote(v)))
                    .collect();
                format!("({})", terms.join(","))
            })
            .collect();
        (!clauses.is_empty()).then(|| clauses.join(";"))
    }

    /// Backend request for one page of this query
    #[must_use]
    pub fn to_request(
        &self,
        reflection_id: impl Into<String>,
        offset: Option<u64>,
        limit: u64,
    ) -> ReflectionJobsRequest {
        ReflectionJobsRequest {
            reflection_id: reflection_id.into(),
            sort: self.sort.clone(),
            order: self.order,
            filter: self.filter_expression(),
            offset,
            limit,
        }
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Backend request for one page of a reflection's jobs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectionJobsRequest {
    pub reflection_id: String,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
    pub filter: Option<String>,
    pub offset: Option<u64>,
    pub limit: u64,
}

/// One page of jobs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobsPage {
    pub jobs: Vec<JobSummary>,
    /// Continuation token; absent on the last page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// Job as listed; fields beyond the common ones are kept in `extra`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: String,
    pub state: String,
    #[serde(default)]
    pub query_type: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobSummary {
    #[must_use]
    pub fn new(id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: state.into(),
            query_type: None,
            user: None,
            start_time: None,
            end_time: None,
            extra: Map::new(),
        }
    }

    /// Wall time between start and end, if both are known
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.end_time? - self.start_time?)
    }
}

/// Source of reflection job pages
#[async_trait]
pub trait JobsApi: Send + Sync + 'static {
    /// List one page of jobs for a reflection
    async fn list_reflection_jobs(
        &self,
        request: ReflectionJobsRequest,
    ) -> Result<JobsPage, ClientError>;
}

#[async_trait]
impl<T: JobsApi + ?Sized> JobsApi for Arc<T> {
    async fn list_reflection_jobs(
        &self,
        request: ReflectionJobsRequest,
    ) -> Result<JobsPage, ClientError> {
        (**self).list_reflection_jobs(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn filter_expression_sorted_and_quoted() {
        let query = JobsQuery::default()
            .with_filter("usr", ["ann"])
            .with_filter("qt", ["UI", "EXTERNAL"])
            .with_filter("empty", Vec::<String>::new());

        assert_eq!(
            query.filter_expression().as_deref(),
            Some(r#"(qt=="UI",qt=="EXTERNAL");(usr=="ann")"#)
        );
        assert_eq!(JobsQuery::default().filter_expression(), None);
    }

    #[test]
    fn filter_values_escape_quotes() {
        let query = JobsQuery::default().with_filter("sql", [r#"say "hi""#]);
        assert_eq!(
            query.filter_expression().as_deref(),
            Some(r#"(sql=="say \"hi\"")"#)
        );
    }

    #[test]
    fn to_request_carries_paging() {
        let req = JobsQuery::newest_first().to_request("r1", Some(200), 100);
        assert_eq!(req.reflection_id, "r1");
        assert_eq!(req.sort.as_deref(), Some("st"));
        assert_eq!(req.order, Some(SortOrder::Descending));
        assert_eq!(req.filter, None);
        assert_eq!(req.offset, Some(200));
    }

    #[test]
    fn job_summary_decodes_epoch_millis() {
        let job: JobSummary = serde_json::from_value(json!({
            "id": "j1",
            "state": "COMPLETED",
            "queryType": "ACCELERATOR_CREATE",
            "startTime": 1_700_000_000_000_i64,
            "endTime": 1_700_000_002_500_i64,
            "rowsScanned": 42
        }))
        .unwrap();

        assert_eq!(job.duration(), Some(chrono::Duration::milliseconds(2500)));
        assert_eq!(job.extra["rowsScanned"], json!(42));
        assert_eq!(job.user, None);
    }

    #[test]
    fn sort_order_parses_loosely() {
        assert_eq!("desc".parse::<SortOrder>().unwrap(), SortOrder::Descending);
        assert_eq!("ASCENDING".parse::<SortOrder>().unwrap(), SortOrder::Ascending);
        assert!("sideways".parse::<SortOrder>().is_err());
    }
}
