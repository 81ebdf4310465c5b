//! Typed preferences over a [`PreferenceStore`]
//!
//! Every accessor recovers from missing or malformed stored JSON by
//! substituting the default shape and logging a warning. Only backend
//! failures surface as errors.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{Result, StorageError};
use crate::store::PreferenceStore;

/// Keys used in the backing store
pub mod keys {
    pub const APP: &str = "globalApp";
    pub const USER: &str = "user";
    pub const SQL_STATE: &str = "sqlState";
    pub const JOB_COLUMNS: &str = "columns";
    pub const JOBS_FILTERS: &str = "jobsFilters";
    pub const JOBS_DATE_TIME_FILTER: &str = "jobsFiltersDateTime";
    pub const SQL_AUTOCOMPLETE: &str = "isAutocomplete";
    pub const SIDE_NAV_WIDE: &str = "sideNavWide";
}

/// Grid tasks older than this are dropped on read
pub const GRID_TASK_LIFETIME: Duration = Duration::from_secs(100_000);

/// Application state document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppState {
    pub home: HomeState,
    pub explore: ExploreState,
    pub custom_data: Map<String, Value>,
    /// Column type -> target type -> saved transform options
    pub transform: BTreeMap<String, BTreeMap<String, Map<String, Value>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HomeState {
    pub recent_datasets_token: String,
    pub readonly_links: String,
    pub pinned_items: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExploreState {
    pub tasks: Vec<GridTask>,
}

/// Background task shown in the explore grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridTask {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl GridTask {
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            data: Map::new(),
        }
    }

    /// Check if the task is within [`GRID_TASK_LIFETIME`] of `now`, in either direction
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        let age = (now - self.timestamp).abs();
        age.to_std().is_ok_and(|age| age < GRID_TASK_LIFETIME)
    }
}

/// Signed-in user record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserData {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub token: Option<String>,
    pub admin: bool,
    pub permissions: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Typed accessors over a preference store
#[derive(Debug)]
pub struct Preferences<S> {
    store: S,
}

impl<S: PreferenceStore> Preferences<S> {
    /// Wrap `store`, writing an empty app document if none exists
    ///
    /// # Errors
    /// Returns error if the store cannot be initialized or written
    pub fn new(store: S) -> Result<Self> {
        store.init()?;
        let prefs = Self { store };
        if prefs.store.read(keys::APP)?.is_none() {
            prefs.set_app(&AppState::default())?;
        }
        Ok(prefs)
    }

    #[inline]
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the helper, tearing down the store
    ///
    /// # Errors
    /// Propagates the store's teardown failure
    pub fn close(self) -> Result<()> {
        self.store.teardown()
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.store.read(key)? else {
            return Ok(None);
        };
        match serde_json::from_str::<Option<T>>(&raw) {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::warn!(key, error = %err, "invalid stored preference, using default");
                Ok(None)
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value).map_err(|e| StorageError::encode(key, e))?;
        self.store.write(key, &raw)
    }

    fn update_app(&self, apply: impl FnOnce(&mut AppState)) -> Result<()> {
        let mut app = self.app()?;
        apply(&mut app);
        self.set_app(&app)
    }

    // App document

    /// Read the app document; corrupt or missing data yields the empty shape
    ///
    /// # Errors
    /// Backend read failure
    pub fn app(&self) -> Result<AppState> {
        Ok(self.read_json(keys::APP)?.unwrap_or_default())
    }

    /// # Errors
    /// Backend write failure
    pub fn set_app(&self, app: &AppState) -> Result<()> {
        self.write_json(keys::APP, app)
    }

    /// # Errors
    /// Backend read failure
    pub fn pinned_items(&self) -> Result<Map<String, Value>> {
        Ok(self.app()?.home.pinned_items)
    }

    /// # Errors
    /// Backend failure
    pub fn set_pinned_items(&self, items: Map<String, Value>) -> Result<()> {
        self.update_app(|app| app.home.pinned_items = items)
    }

    /// # Errors
    /// Backend read failure
    pub fn custom_value(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.app()?.custom_data.get(key).cloned())
    }

    /// # Errors
    /// Backend failure
    pub fn set_custom_value(&self, key: &str, value: Value) -> Result<()> {
        self.update_app(|app| {
            app.custom_data.insert(key.to_string(), value);
        })
    }

    /// Live grid tasks as of `now`; expired tasks are pruned from the store
    ///
    /// # Errors
    /// Backend failure
    pub fn grid_tasks(&self, now: DateTime<Utc>) -> Result<Vec<GridTask>> {
        let mut app = self.app()?;
        let before = app.explore.tasks.len();
        app.explore.tasks.retain(|task| task.is_live(now));
        if app.explore.tasks.len() != before {
            tracing::debug!(pruned = before - app.explore.tasks.len(), "expired grid tasks removed");
            self.set_app(&app)?;
        }
        Ok(app.explore.tasks)
    }

    /// # Errors
    /// Backend failure
    pub fn set_grid_tasks(&self, tasks: Vec<GridTask>) -> Result<()> {
        self.update_app(|app| app.explore.tasks = tasks)
    }

    /// Saved transform options; empty when none are saved
    ///
    /// # Errors
    /// Backend read failure
    pub fn transform_value(&self, column_type: &str, to_type: &str) -> Result<Map<String, Value>> {
        Ok(self
            .app()?
            .transform
            .get(column_type)
            .and_then(|targets| targets.get(to_type))
            .cloned()
            .unwrap_or_default())
    }

    /// # Errors
    /// Backend failure
    pub fn set_transform_value(
        &self,
        column_type: &str,
        to_type: &str,
        values: Map<String, Value>,
    ) -> Result<()> {
        self.update_app(|app| {
            app.transform
                .entry(column_type.to_string())
                .or_default()
                .insert(to_type.to_string(), values);
        })
    }

    // User

    /// Signed-in user; corrupt or missing data yields an empty record
    ///
    /// # Errors
    /// Backend read failure
    pub fn user_data(&self) -> Result<UserData> {
        Ok(self.read_json(keys::USER)?.unwrap_or_default())
    }

    /// # Errors
    /// Backend write failure
    pub fn set_user_data(&self, user: &UserData) -> Result<()> {
        self.write_json(keys::USER, user)
    }

    /// # Errors
    /// Backend failure
    pub fn clear_user_data(&self) -> Result<()> {
        self.store.remove(keys::USER)
    }

    /// # Errors
    /// Backend read failure
    pub fn auth_token(&self) -> Result<Option<String>> {
        Ok(self.user_data()?.token.filter(|t| !t.is_empty()))
    }

    // Editor and jobs page

    /// Whether the SQL editor starts open; defaults to (and stores) `true`
    ///
    /// # Errors
    /// Backend failure
    pub fn default_sql_state(&self) -> Result<bool> {
        match self.store.read(keys::SQL_STATE)? {
            Some(raw) => Ok(raw == "true"),
            None => {
                self.set_default_sql_state(true)?;
                Ok(true)
            }
        }
    }

    /// # Errors
    /// Backend write failure
    pub fn set_default_sql_state(&self, open: bool) -> Result<()> {
        self.write_json(keys::SQL_STATE, &open)
    }

    /// # Errors
    /// Backend read failure
    pub fn sql_autocomplete(&self) -> Result<bool> {
        Ok(self.read_json(keys::SQL_AUTOCOMPLETE)?.unwrap_or(true))
    }

    /// # Errors
    /// Backend write failure
    pub fn set_sql_autocomplete(&self, enabled: bool) -> Result<()> {
        self.write_json(keys::SQL_AUTOCOMPLETE, &enabled)
    }

    /// # Errors
    /// Backend read failure
    pub fn side_nav_wide(&self) -> Result<bool> {
        Ok(self.read_json(keys::SIDE_NAV_WIDE)?.unwrap_or(false))
    }

    /// # Errors
    /// Backend write failure
    pub fn set_side_nav_wide(&self, wide: bool) -> Result<()> {
        self.write_json(keys::SIDE_NAV_WIDE, &wide)
    }

    /// Visible job-list columns, if customized
    ///
    /// # Errors
    /// Backend read failure
    pub fn job_columns(&self) -> Result<Option<Vec<String>>> {
        self.read_json(keys::JOB_COLUMNS)
    }

    /// # Errors
    /// Backend write failure
    pub fn set_job_columns(&self, columns: &[String]) -> Result<()> {
        self.write_json(keys::JOB_COLUMNS, columns)
    }

    /// # Errors
    /// Backend failure
    pub fn clear_job_columns(&self) -> Result<()> {
        self.store.remove(keys::JOB_COLUMNS)
    }

    /// Saved jobs-list filters, as stored
    ///
    /// # Errors
    /// Backend read failure
    pub fn jobs_filters(&self) -> Result<Option<String>> {
        self.store.read(keys::JOBS_FILTERS)
    }

    /// # Errors
    /// Backend write failure
    pub fn set_jobs_filters(&self, filters: &str) -> Result<()> {
        self.store.write(keys::JOBS_FILTERS, filters)
    }

    /// # Errors
    /// Backend read failure
    pub fn jobs_date_time_filter(&self) -> Result<Option<String>> {
        self.store.read(keys::JOBS_DATE_TIME_FILTER)
    }

    /// # Errors
    /// Backend write failure
    pub fn set_jobs_date_time_filter(&self, filter: &str) -> Result<()> {
        self.store.write(keys::JOBS_DATE_TIME_FILTER, filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn prefs() -> Preferences<MemoryStore> {
        Preferences::new(MemoryStore::new()).unwrap()
    }

    #[test]
    fn new_writes_empty_app() {
        let prefs = prefs();
        let raw = prefs.store().read(keys::APP).unwrap().unwrap();
        let app: AppState = serde_json::from_str(&raw).unwrap();
        assert_eq!(app, AppState::default());
    }

    #[test]
    fn app_serializes_camel_case() {
        let value = serde_json::to_value(AppState::default()).unwrap();
        assert!(value["home"].get("pinnedItems").is_some());
        assert!(value.get("customData").is_some());
    }

    #[test]
    fn corrupt_app_falls_back_to_default() {
        let prefs = prefs();
        prefs.store().write(keys::APP, "{{{").unwrap();
        assert_eq!(prefs.app().unwrap(), AppState::default());

        prefs.store().write(keys::APP, "null").unwrap();
        assert_eq!(prefs.app().unwrap(), AppState::default());

        // Partial documents keep what is present
        prefs
            .store()
            .write(keys::APP, r#"{"customData":{"theme":"dark"}}"#)
            .unwrap();
        assert_eq!(prefs.custom_value("theme").unwrap(), Some(json!("dark")));
        assert!(prefs.pinned_items().unwrap().is_empty());
    }

    #[test]
    fn custom_values_and_pins_round_trip_through_app() {
        let prefs = prefs();
        prefs.set_custom_value("layout", json!({"cols": 2})).unwrap();
        let mut pins = Map::new();
        pins.insert("space.a".into(), json!(true));
        prefs.set_pinned_items(pins.clone()).unwrap();

        assert_eq!(prefs.custom_value("layout").unwrap(), Some(json!({"cols": 2})));
        assert_eq!(prefs.pinned_items().unwrap(), pins);
        assert_eq!(prefs.custom_value("missing").unwrap(), None);
    }

    #[test]
    fn grid_tasks_expire() {
        let prefs = prefs();
        let now = Utc.timestamp_millis_opt(1_000_000_000_000).unwrap();
        let fresh = GridTask::new(now - chrono::Duration::seconds(60));
        let stale = GridTask::new(now - chrono::Duration::seconds(100_001));
        prefs.set_grid_tasks(vec![fresh.clone(), stale]).unwrap();

        assert_eq!(prefs.grid_tasks(now).unwrap(), vec![fresh.clone()]);
        // Pruned from the store too
        assert_eq!(prefs.app().unwrap().explore.tasks, vec![fresh]);
    }

    #[test]
    fn transform_values_nest_by_type() {
        let prefs = prefs();
        assert!(prefs.transform_value("TEXT", "INTEGER").unwrap().is_empty());

        let mut opts = Map::new();
        opts.insert("defaultValue".into(), json!(0));
        prefs.set_transform_value("TEXT", "INTEGER", opts.clone()).unwrap();
        prefs.set_transform_value("TEXT", "FLOAT", Map::new()).unwrap();

        assert_eq!(prefs.transform_value("TEXT", "INTEGER").unwrap(), opts);
        assert_eq!(prefs.app().unwrap().transform["TEXT"].len(), 2);
    }

    #[test]
    fn user_data_recovers_and_clears() {
        let prefs = prefs();
        prefs.store().write(keys::USER, "\"just a string\"").unwrap();
        assert_eq!(prefs.user_data().unwrap(), UserData::default());

        let user = UserData {
            user_id: Some("u1".into()),
            token: Some("abc".into()),
            admin: true,
            ..UserData::default()
        };
        prefs.set_user_data(&user).unwrap();
        assert_eq!(prefs.auth_token().unwrap().as_deref(), Some("abc"));
        assert!(prefs.user_data().unwrap().admin);

        prefs.clear_user_data().unwrap();
        assert_eq!(prefs.auth_token().unwrap(), None);
    }

    #[test]
    fn flag_defaults() {
        let prefs = prefs();
        assert!(prefs.default_sql_state().unwrap());
        assert_eq!(prefs.store().read(keys::SQL_STATE).unwrap().as_deref(), Some("true"));
        prefs.set_default_sql_state(false).unwrap();
        assert!(!prefs.default_sql_state().unwrap());

        assert!(prefs.sql_autocomplete().unwrap());
        assert!(!prefs.side_nav_wide().unwrap());
        prefs.set_side_nav_wide(true).unwrap();
        assert!(prefs.side_nav_wide().unwrap());
    }

    #[test]
    fn job_columns_and_filters() {
        let prefs = prefs();
        assert_eq!(prefs.job_columns().unwrap(), None);
        let columns = vec!["jobId".to_string(), "user".to_string()];
        prefs.set_job_columns(&columns).unwrap();
        assert_eq!(prefs.job_columns().unwrap(), Some(columns));
        prefs.clear_job_columns().unwrap();
        assert_eq!(prefs.job_columns().unwrap(), None);

        prefs.set_jobs_filters("qt=UI").unwrap();
        assert_eq!(prefs.jobs_filters().unwrap().as_deref(), Some("qt=UI"));
    }
}
