//! HTTP client for the catalog and jobs endpoints

use async_trait::async_trait;
use dcat_catalog::{CatalogEntry, CatalogObject, CatalogPath, ResolveError, RetrieveByPath};
use reqwest::{IntoUrl, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::jobs::{JobsApi, JobsPage, ReflectionJobsRequest, SortOrder};

/// Client for the catalog HTTP API
#[derive(Debug, Clone)]
pub struct Client {
    /// Server root; endpoint paths are appended to its path
    base_url: Url,
    /// The `Bearer` token sent with each request
    auth_token: Option<String>,
    http_client: reqwest::Client,
}

impl Client {
    /// Create a client with default HTTP settings
    ///
    /// # Errors
    /// Returns error if `base_url` is not a usable base URL
    pub fn new<U: IntoUrl>(base_url: U) -> Result<Self> {
        let base_url = base_url.into_url().map_err(ClientError::BaseUrl)?;
        Self::with_http_client(base_url, reqwest::Client::new())
    }

    /// Create a client from configuration (timeout, user agent, token)
    ///
    /// # Errors
    /// Returns error if the base URL is invalid or the HTTP client cannot be built
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        fn into_url<U: IntoUrl>(url: U) -> reqwest::Result<Url> {
            url.into_url()
        }
        let base_url = into_url(config.base_url.as_str()).map_err(ClientError::BaseUrl)?;
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(ClientError::Build)?;
        let client = Self::with_http_client(base_url, http_client)?;
        Ok(match &config.token {
            Some(token) => client.with_auth_token(token.clone()),
            None => client,
        })
    }

    fn with_http_client(base_url: Url, http_client: reqwest::Client) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(ClientError::CannotBeABase(base_url.into()));
        }
        Ok(Self {
            base_url,
            auth_token: None,
            http_client,
        })
    }

    /// Set the `Bearer` token that will be sent with each request to the server
    #[must_use]
    pub fn with_auth_token<S: Into<String>>(mut self, auth_token: S) -> Self {
        self.auth_token = Some(auth_token.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL with `segments` appended, each percent-encoded
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::CannotBeABase(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T, Q>(&self, url: Url, query: Option<&Q>) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let api_path = url.path().to_string();
        let mut req = self.http_client.get(url);
        if let Some(query) = query {
            req = req.query(query);
        }
        if let Some(token) = &self.auth_token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|src| ClientError::request_send(Method::GET, &api_path, src))?;

        let status = resp.status();
        if status.is_success() {
            resp.json().await.map_err(ClientError::Json)
        } else {
            tracing::debug!(%status, path = %api_path, "request rejected");
            Err(ClientError::ApiError {
                code: status,
                message: resp.text().await.map_err(ClientError::Text)?,
            })
        }
    }

    /// Make a request to the `GET /api/v3/catalog/by-path/{path}` API
    ///
    /// # Errors
    /// Returns `ClientError::ApiError` for non-success statuses (404 included)
    #[tracing::instrument(skip(self, path), fields(path = %path))]
    pub async fn api_v3_catalog_by_path(&self, path: &CatalogPath) -> Result<CatalogObject> {
        let url = self.endpoint(
            ["api", "v3", "catalog", "by-path"]
                .into_iter()
                .chain(path.iter()),
        )?;
        self.get_json(url, None::<&()>).await
    }

    /// Make a request to the `GET /api/v3/catalog` API (root listing)
    ///
    /// # Errors
    /// Returns error if the request fails or the response is not a listing
    #[tracing::instrument(skip(self))]
    pub async fn api_v3_catalog(&self) -> Result<Vec<CatalogEntry>> {
        #[derive(Deserialize)]
        struct Listing {
            data: Vec<CatalogEntry>,
        }

        let url = self.endpoint(["api", "v3", "catalog"])?;
        let listing: Listing = self.get_json(url, None::<&()>).await?;
        Ok(listing.data)
    }

    /// Make a request to the `GET /api/v3/reflection/{id}/jobs` API
    ///
    /// # Errors
    /// Returns error if the request fails or the response is not a jobs page
    #[tracing::instrument(skip(self, request), fields(reflection_id = %request.reflection_id, offset = ?request.offset))]
    pub async fn api_v3_reflection_jobs(&self, request: &ReflectionJobsRequest) -> Result<JobsPage> {
        let url = self.endpoint([
            "api",
            "v3",
            "reflection",
            request.reflection_id.as_str(),
            "jobs",
        ])?;
        self.get_json(url, Some(&JobsQueryParams::from(request)))
            .await
    }
}

/// Query string of the reflection jobs API
#[derive(Debug, Serialize)]
struct JobsQueryParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    sort: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order: Option<SortOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<u64>,
    limit: u64,
}

impl<'a> From<&'a ReflectionJobsRequest> for JobsQueryParams<'a> {
    fn from(req: &'a ReflectionJobsRequest) -> Self {
        Self {
            sort: req.sort.as_deref(),
            order: req.order,
            filter: req.filter.as_deref(),
            offset: req.offset,
            limit: req.limit,
        }
    }
}

#[async_trait]
impl RetrieveByPath for Client {
    async fn retrieve_by_path(
        &self,
        path: &CatalogPath,
    ) -> std::result::Result<CatalogObject, ResolveError> {
        self.api_v3_catalog_by_path(path)
            .await
            .map_err(|err| match err.status() {
                Some(StatusCode::NOT_FOUND) => ResolveError::not_found(path.clone()),
                Some(StatusCode::FORBIDDEN) => ResolveError::forbidden(path.clone()),
                _ => ResolveError::transport(path.clone(), err),
            })
    }
}

#[async_trait]
impl JobsApi for Client {
    async fn list_reflection_jobs(
        &self,
        request: ReflectionJobsRequest,
    ) -> Result<JobsPage> {
        self.api_v3_reflection_jobs(&request).await
    }
}
