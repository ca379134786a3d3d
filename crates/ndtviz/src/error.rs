//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use ndtviz_config::ConfigError;
use ndtviz_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to backend at {url}")]
    #[diagnostic(
        code(ndtviz::connection_failed),
        help(
            "Check that the telemetry backend is running and reachable.\n\
             URL: {url}\n\
             Try: ndtviz --backend http://localhost:5000 topology"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Telemetry feed closed before the command finished")]
    #[diagnostic(
        code(ndtviz::feed_closed),
        help("The backend dropped the WebSocket connection. Re-run with -v for details.")
    )]
    FeedClosed,

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(code(ndtviz::not_found), help("{hint}"))]
    NotFound {
        resource_type: String,
        identifier: String,
        hint: String,
    },

    // ── Backend ──────────────────────────────────────────────────────
    #[error("Backend error: {message}")]
    #[diagnostic(code(ndtviz::backend_error))]
    Backend { message: String },

    #[error("Invalid topology file {path}: {message}")]
    #[diagnostic(
        code(ndtviz::topology_file),
        help("Expected a containerlab file with topology.nodes and topology.links.")
    )]
    TopologyFile { path: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ndtviz::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(ndtviz::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: ndtviz config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No backend configured")]
    #[diagnostic(
        code(ndtviz::no_config),
        help(
            "Create a profile with: ndtviz config init\n\
             Or pass --backend / set NDTVIZ_BACKEND.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(ndtviz::config))]
    Config(Box<ConfigError>),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Timed out after {seconds}s")]
    #[diagnostic(
        code(ndtviz::timeout),
        help("Increase --wait / --timeout or check that the backend is publishing.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Export ──────────────────────────────────────────────────
    #[error("Export failed: {message}")]
    #[diagnostic(code(ndtviz::export), help("Check that {path} exists and is writable."))]
    Export { path: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::FeedClosed => exit_code::CONNECTION,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NoConfig { .. } | Self::ProfileNotFound { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },

            CoreError::Disconnected => CliError::FeedClosed,

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::NotFound {
                resource,
                identifier,
            } => CliError::NotFound {
                resource_type: resource,
                identifier,
                hint: "Check the backend URL and that the endpoint is served.".into(),
            },

            CoreError::Api { message, status: _ } | CoreError::Internal(message) => {
                CliError::Backend { message }
            }

            CoreError::TopologyFile { path, message } => CliError::TopologyFile { path, message },

            CoreError::Export { path, message } => CliError::Export { path, message },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        assert_eq!(CliError::from(CoreError::Disconnected).exit_code(), exit_code::CONNECTION);
        assert_eq!(
            CliError::from(CoreError::Timeout { timeout_secs: 5 }).exit_code(),
            exit_code::TIMEOUT
        );
        assert_eq!(
            CliError::from(CoreError::Config {
                message: "bad".into()
            })
            .exit_code(),
            exit_code::USAGE
        );
        assert_eq!(
            CliError::from(CoreError::Internal("x".into())).exit_code(),
            exit_code::GENERAL
        );
    }
}
