// ── Core error types ──
//
// User-facing errors from ndtviz-core. Consumers never see HTTP status
// codes or JSON parse failures directly; the `From<ndtviz_api::Error>`
// impl translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to backend at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Telemetry session is not running")]
    Disconnected,

    #[error("Backend request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Not found: {resource} {identifier}")]
    NotFound {
        resource: String,
        identifier: String,
    },

    #[error("Backend error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("Invalid topology file {path}: {message}")]
    TopologyFile { path: String, message: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Export to {path} failed: {message}")]
    Export { path: String, message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<ndtviz_api::Error> for CoreError {
    fn from(err: ndtviz_api::Error) -> Self {
        match err {
            ndtviz_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            ndtviz_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ndtviz_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            ndtviz_api::Error::Status { status: 404, path } => CoreError::NotFound {
                resource: "endpoint".into(),
                identifier: path,
            },
            ndtviz_api::Error::Status { status, path } => CoreError::Api {
                message: format!("{path} answered HTTP {status}"),
                status: Some(status),
            },
            ndtviz_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            ndtviz_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            ndtviz_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            ndtviz_api::Error::FeedClosed => CoreError::Disconnected,
            ndtviz_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            ndtviz_api::Error::TopologyFile { path, message } => {
                CoreError::TopologyFile { path, message }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_status_maps_to_not_found() {
        let err: CoreError = ndtviz_api::Error::Status {
            status: 404,
            path: "/clab-info".into(),
        }
        .into();
        assert!(
            matches!(err, CoreError::NotFound { ref identifier, .. } if identifier == "/clab-info")
        );
    }

    #[test]
    fn feed_closed_maps_to_disconnected() {
        let err: CoreError = ndtviz_api::Error::FeedClosed.into();
        assert!(matches!(err, CoreError::Disconnected));
    }
}
