//! Run configuration.
//!
//! Built once at start-up from the environment, validated before any network
//! call, then passed by reference into every component.

use std::collections::BTreeMap;
use std::time::Duration;

use url::Url;

/// Variables that must always be present.
const REQUIRED_VARS: [&str; 4] = [
    "FOLIO_ENDPOINT",
    "FOLIO_PROJECT_ID",
    "FOLIO_DATABASE_ID",
    "FOLIO_API_KEY",
];

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingVars(Vec<String>),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Delays that pace the run. All of them are plain sleeps, so tests can set
/// them to zero and drive the same logic instantly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    /// Pause after a created collection or attribute before a dependent call.
    pub settle: Duration,
    /// Minimum spacing between any two remote calls.
    pub min_call_interval: Duration,
    /// Wait before the single retry of a rate-limited call.
    pub rate_limit_backoff: Duration,
    /// Wait between the schema phase and the backfill phase when attributes
    /// were created in this run.
    pub propagation_wait: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(2_000),
            min_call_interval: Duration::from_millis(100),
            rate_limit_backoff: Duration::from_millis(5_000),
            propagation_wait: Duration::from_millis(3_000),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Timing {
    /// No waiting at all. Request timeout stays bounded.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            min_call_interval: Duration::ZERO,
            rate_limit_backoff: Duration::ZERO,
            propagation_wait: Duration::ZERO,
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Everything a run needs to talk to one database on the administrative surface.
#[derive(Clone)]
pub struct SyncConfig {
    /// Base URL of the administrative API, e.g. `https://cloud.example.com/v1`.
    pub endpoint: Url,
    pub project_id: String,
    pub database_id: String,
    pub api_key: String,
    /// Collection ids keyed by logical catalog name (`posts`, `projects`).
    pub collection_ids: BTreeMap<String, String>,
    pub timing: Timing,
    /// Page size for collection and document listings.
    pub page_size: u32,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("project_id", &self.project_id)
            .field("database_id", &self.database_id)
            .field("api_key", &"[REDACTED]")
            .field("collection_ids", &self.collection_ids)
            .field("timing", &self.timing)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl SyncConfig {
    /// Build a configuration directly. Used by tests and embedders that do not
    /// read the environment.
    pub fn new(
        endpoint: &str,
        project_id: impl Into<String>,
        database_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: parse_endpoint(endpoint)?,
            project_id: project_id.into(),
            database_id: database_id.into(),
            api_key: api_key.into(),
            collection_ids: BTreeMap::new(),
            timing: Timing::default(),
            page_size: 100,
        })
    }

    /// Set the id used for a logical collection name.
    #[must_use]
    pub fn with_collection_id(mut self, name: impl Into<String>, id: impl Into<String>) -> Self {
        self.collection_ids.insert(name.into(), id.into());
        self
    }

    #[must_use]
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Collection id configured for a logical name.
    #[must_use]
    pub fn collection_id(&self, name: &str) -> Option<&str> {
        self.collection_ids.get(name).map(String::as_str)
    }

    /// Load configuration from environment variables.
    ///
    /// `collection_names` lists the logical collections whose ids must be
    /// supplied as `FOLIO_<NAME>_COLLECTION_ID`.
    pub fn from_env(collection_names: &[&str]) -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key), collection_names)
    }

    /// Load configuration from a custom variable reader.
    ///
    /// Every missing required variable is reported at once.
    pub fn from_reader<F>(reader: F, collection_names: &[&str]) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let read = |key: &str| reader(key).ok().filter(|v| !v.trim().is_empty());

        let id_vars: Vec<(String, String)> = collection_names
            .iter()
            .map(|name| ((*name).to_string(), collection_id_var(name)))
            .collect();

        let missing: Vec<String> = REQUIRED_VARS
            .iter()
            .map(|v| (*v).to_string())
            .chain(id_vars.iter().map(|(_, var)| var.clone()))
            .filter(|var| read(var).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingVars(missing));
        }

        let required = |key: &str| read(key).ok_or_else(|| ConfigError::MissingVars(vec![key.into()]));

        let endpoint = parse_endpoint(&required("FOLIO_ENDPOINT")?)?;

        let mut collection_ids = BTreeMap::new();
        for (name, var) in &id_vars {
            collection_ids.insert(name.clone(), required(var)?);
        }

        let defaults = Timing::default();
        let timing = Timing {
            settle: read_millis(&read, "FOLIO_SETTLE_MS", defaults.settle)?,
            min_call_interval: read_millis(
                &read,
                "FOLIO_MIN_CALL_INTERVAL_MS",
                defaults.min_call_interval,
            )?,
            rate_limit_backoff: read_millis(
                &read,
                "FOLIO_RATE_LIMIT_BACKOFF_MS",
                defaults.rate_limit_backoff,
            )?,
            propagation_wait: read_millis(
                &read,
                "FOLIO_PROPAGATION_WAIT_MS",
                defaults.propagation_wait,
            )?,
            request_timeout: match read("FOLIO_REQUEST_TIMEOUT_SECS") {
                Some(raw) => Duration::from_secs(parse_number(
                    "FOLIO_REQUEST_TIMEOUT_SECS",
                    &raw,
                )?),
                None => defaults.request_timeout,
            },
        };
        if timing.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "FOLIO_REQUEST_TIMEOUT_SECS".into(),
                "must be greater than zero".into(),
            ));
        }

        let page_size = match read("FOLIO_PAGE_SIZE") {
            Some(raw) => {
                let size: u32 = parse_number("FOLIO_PAGE_SIZE", &raw)?;
                if size == 0 {
                    return Err(ConfigError::InvalidValue(
                        "FOLIO_PAGE_SIZE".into(),
                        "must be greater than zero".into(),
                    ));
                }
                size
            }
            None => 100,
        };

        Ok(Self {
            endpoint,
            project_id: required("FOLIO_PROJECT_ID")?,
            database_id: required("FOLIO_DATABASE_ID")?,
            api_key: required("FOLIO_API_KEY")?,
            collection_ids,
            timing,
            page_size,
        })
    }
}

/// Environment variable carrying the id of a logical collection.
#[must_use]
pub fn collection_id_var(name: &str) -> String {
    format!("FOLIO_{}_COLLECTION_ID", name.to_ascii_uppercase())
}

fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidValue("FOLIO_ENDPOINT".into(), e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidValue(
            "FOLIO_ENDPOINT".into(),
            format!("unsupported scheme: {other}"),
        )),
    }
}

fn parse_number<T: std::str::FromStr>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(var.into(), e.to_string()))
}

fn read_millis<R>(read: &R, var: &str, default: Duration) -> Result<Duration, ConfigError>
where
    R: Fn(&str) -> Option<String>,
{
    match read(var) {
        Some(raw) => Ok(Duration::from_millis(parse_number(var, &raw)?)),
        None => Ok(default),
    }
}
