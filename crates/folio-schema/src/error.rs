//! Error types for schema reconciliation.
//!
//! Two layers: [`SyncError`] aborts a whole run, [`RemoteError`] describes a
//! single failed call against the administrative surface and is folded into
//! the run report by the executor and backfill runner.

use thiserror::Error;

use crate::config::ConfigError;

/// Result alias for run-level operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result alias for single calls against the administrative surface.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Fatal errors. Any of these stops the run before or instead of mutating
/// the remote schema.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Environment or configuration is incomplete or malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The catalog is internally inconsistent. Raised before any network access.
    #[error("schema catalog is invalid:\n  - {}", problems.join("\n  - "))]
    SchemaValidation { problems: Vec<String> },

    /// A catalog file could not be read or parsed.
    #[error("failed to load catalog: {message}")]
    CatalogLoad { message: String },

    /// The administrative surface could not be reached or refused our credentials.
    #[error("cannot reach administrative surface: {message}")]
    Connectivity {
        message: String,
        #[source]
        source: Option<RemoteError>,
    },
}

impl SyncError {
    /// Wrap a probe failure as a connectivity error.
    #[must_use]
    pub fn connectivity(context: &str, source: RemoteError) -> Self {
        Self::Connectivity {
            message: format!("{context}: {source}"),
            source: Some(source),
        }
    }

    /// Short remediation hint shown before a non-zero exit.
    #[must_use]
    pub fn remediation(&self) -> &'static str {
        match self {
            SyncError::Config(_) => {
                "Set the missing variables in the environment or a .env file and retry."
            }
            SyncError::SchemaValidation { .. } | SyncError::CatalogLoad { .. } => {
                "Check the catalog definition; no remote changes were made."
            }
            SyncError::Connectivity { .. } => {
                "Check the endpoint, project id, database id and API key credentials."
            }
        }
    }
}

/// Error returned by one call against the administrative surface.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The object already exists (HTTP 409). Treated as success by the executor.
    #[error("already exists: {message}")]
    AlreadyExists { message: String },

    /// The surface rejected the call for rate limiting (HTTP 429).
    #[error("rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Credentials were missing or invalid (HTTP 401).
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// Credentials lack the required scope (HTTP 403).
    #[error("forbidden: {message}")]
    Forbidden { message: String },

    /// The addressed database, collection or document does not exist (HTTP 404).
    #[error("not found: {message}")]
    NotFound { message: String },

    /// Any other structured rejection.
    #[error("rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The call exceeded its timeout. Not retried.
    #[error("request timed out")]
    Timeout,

    /// Transport-level failure (DNS, TLS, connection reset).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The surface answered with a body we could not decode.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },
}

impl RemoteError {
    /// Whether this is the duplicate-detection conflict.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, RemoteError::AlreadyExists { .. })
    }

    /// Whether this is a rate-limit rejection.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RemoteError::RateLimited { .. })
    }

    /// Whether the failure means the surface is unreachable or refuses our
    /// credentials, as opposed to rejecting one particular request.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            RemoteError::Unauthorized { .. }
                | RemoteError::Forbidden { .. }
                | RemoteError::Timeout
                | RemoteError::Transport { .. }
        )
    }

    /// Build a rejection for an arbitrary status code, mapping the statuses the
    /// surface gives structured meaning to.
    #[must_use]
    pub fn from_status(status: u16, message: String, retry_after_secs: Option<u64>) -> Self {
        match status {
            401 => RemoteError::Unauthorized { message },
            403 => RemoteError::Forbidden { message },
            404 => RemoteError::NotFound { message },
            409 => RemoteError::AlreadyExists { message },
            429 => RemoteError::RateLimited { retry_after_secs },
            _ => RemoteError::Rejected { status, message },
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout
        } else if err.is_decode() {
            RemoteError::InvalidResponse {
                message: err.to_string(),
            }
        } else {
            RemoteError::Transport {
                message: err.to_string(),
                source: Some(Box::new(err)),
            }
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::InvalidResponse {
            message: err.to_string(),
        }
    }
}
