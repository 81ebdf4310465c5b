//! Client configuration
//!
//! Loaded from TOML; every field has a default so a file only needs the
//! values it changes.
//!
//! ```toml
//! base_url = "https://catalog.example.com"
//! request_timeout_ms = 10000
//!
//! [jobs_cache]
//! max_age_ms = 30000
//! max_size = 100
//!
//! [jobs_polling]
//! interval_ms = 5000
//! ```

use dcat_resource::{CacheConfig, PollingConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;

/// Configuration for [`Client`](crate::Client) and the jobs resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server root, e.g. `http://localhost:9047`
    pub base_url: String,
    /// Bearer token sent with every request
    pub token: Option<String>,
    #[serde(rename = "request_timeout_ms", with = "dcat_resource::duration_ms")]
    pub request_timeout: Duration,
    pub user_agent: String,
    pub jobs_cache: CacheConfig,
    pub jobs_polling: PollingConfig,
    /// Jobs fetched per page
    pub jobs_page_size: u64,
    /// Preference file; the CLI defaults to `dcat-prefs.json` in the working directory
    pub storage_path: Option<PathBuf>,
}

impl ClientConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns error if the TOML is malformed or a value is invalid
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), base_url = %config.base_url, "config loaded");
        Ok(config)
    }

    /// Check values that deserialization alone cannot
    ///
    /// # Errors
    /// Returns the first invalid value found
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_base_url()?;
        if self.jobs_page_size == 0 {
            return Err(ConfigError::Invalid {
                field: "jobs_page_size",
                reason: "must be positive".into(),
            });
        }
        if self.jobs_polling.interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "jobs_polling.interval_ms",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    /// Parsed form of [`base_url`](Self::base_url)
    ///
    /// # Errors
    /// Returns error if the URL does not parse
    pub fn parsed_base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url).map_err(|source| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            source,
        })
    }

    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_jobs_cache(mut self, jobs_cache: CacheConfig) -> Self {
        self.jobs_cache = jobs_cache;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_jobs_polling(mut self, jobs_polling: PollingConfig) -> Self {
        self.jobs_polling = jobs_polling;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_jobs_page_size(mut self, page_size: u64) -> Self {
        self.jobs_page_size = page_size;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9047".into(),
            token: None,
            request_timeout: Duration::from_secs(30),
            user_agent: format!("dcat/{}", crate::VERSION),
            jobs_cache: CacheConfig::default(),
            jobs_polling: PollingConfig::default(),
            jobs_page_size: 100,
            storage_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(ClientConfig::from_toml_str("").unwrap(), ClientConfig::default());
    }

    #[test]
    fn toml_overrides_nested_durations() {
        let config = ClientConfig::from_toml_str(
            r#"
            base_url = "https://catalog.example.com/root"
            token = "t0k"
            request_timeout_ms = 2500

            [jobs_cache]
            max_age_ms = 1000
            max_size = 5

            [jobs_polling]
            interval_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.token.as_deref(), Some("t0k"));
        assert_eq!(config.request_timeout, Duration::from_millis(2500));
        assert_eq!(config.jobs_cache.max_age, Duration::from_secs(1));
        assert_eq!(config.jobs_cache.max_size, 5);
        assert_eq!(config.jobs_polling.interval, Duration::from_millis(250));
        assert_eq!(config.jobs_page_size, 100);
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(matches!(
            ClientConfig::from_toml_str(r#"base_url = "not a url""#),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            ClientConfig::from_toml_str("jobs_page_size = 0"),
            Err(ConfigError::Invalid { field: "jobs_page_size", .. })
        ));
        assert!(matches!(
            ClientConfig::from_toml_str("jobs_page_size = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dcat.toml");
        std::fs::write(&path, "jobs_page_size = 50\n").unwrap();
        assert_eq!(ClientConfig::load(&path).unwrap().jobs_page_size, 50);

        let missing = ClientConfig::load(dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}
