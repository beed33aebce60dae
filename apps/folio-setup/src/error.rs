//! CLI error types and exit codes

use folio_schema::config::ConfigError;
use folio_schema::error::SyncError;
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: Run finished but was not successful
/// - 2: Configuration error
/// - 3: Connectivity error
/// - 4: Catalog error
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("{failed} operation(s) failed, including required schema; see the summary above")]
    RunFailed { failed: usize },

    #[error("Run cancelled before completion")]
    Cancelled,

    #[error("Failed to write output: {0}")]
    Output(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Sync(SyncError::Config(_)) => 2,
            CliError::Sync(SyncError::Connectivity { .. }) => 3,
            CliError::Sync(SyncError::SchemaValidation { .. } | SyncError::CatalogLoad { .. }) => 4,
            CliError::RunFailed { .. } | CliError::Cancelled | CliError::Output(_) => 1,
        }
    }

    /// Print the error to stderr with appropriate formatting
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {self}");
        } else {
            eprintln!("Error: {self}");
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {suggestion}");
            } else {
                eprintln!("\nSuggestion: {suggestion}");
            }
        }
    }

    /// Get a suggested action for this error
    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Sync(err) => Some(err.remediation()),
            CliError::RunFailed { .. } => {
                Some("Fix the failed operations and run 'folio-setup apply' again; completed steps are skipped.")
            }
            CliError::Cancelled => Some("Run 'folio-setup apply' again to finish the remaining steps."),
            CliError::Output(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Sync(SyncError::Config(e))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(format!("JSON error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_config() {
        let err: CliError = ConfigError::MissingVars(vec!["FOLIO_API_KEY".into()]).into();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("FOLIO_API_KEY"));
    }

    #[test]
    fn test_exit_code_connectivity() {
        let err = CliError::Sync(SyncError::Connectivity {
            message: "refused".into(),
            source: None,
        });
        assert_eq!(err.exit_code(), 3);
        assert!(err.suggestion().unwrap().contains("credentials"));
    }

    #[test]
    fn test_exit_code_catalog() {
        let err = CliError::Sync(SyncError::SchemaValidation {
            problems: vec!["index idx_slug covers unknown attribute slug".into()],
        });
        assert_eq!(err.exit_code(), 4);
        let err = CliError::Sync(SyncError::CatalogLoad {
            message: "bad".into(),
        });
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_exit_code_unsuccessful_run() {
        assert_eq!(CliError::RunFailed { failed: 2 }.exit_code(), 1);
        assert_eq!(CliError::Cancelled.exit_code(), 1);
    }
}
