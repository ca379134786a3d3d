// ── Runtime session configuration ──
//
// These types describe *where* the backend lives and how the engine is tuned.
// They never touch disk: the CLI/TUI builds a `DashboardConfig` (usually via
// ndtviz-config) and hands it to the `Controller`.

use std::path::PathBuf;
use std::time::Duration;

use ndtviz_api::transport::{TlsMode, TransportConfig};
use ndtviz_api::ReconnectConfig;
use url::Url;

use crate::error::CoreError;
use crate::export::ExportFormat;
use crate::layout::LayoutConfig;
use crate::store::DEFAULT_WINDOW;
use crate::units::TimeBasis;

/// TLS verification strategy for the HTTP endpoints and `wss://` feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed lab backends).
    DangerAcceptInvalid,
}

impl From<&TlsVerification> for TlsMode {
    fn from(tls: &TlsVerification) -> Self {
        match tls {
            TlsVerification::SystemDefaults => Self::System,
            TlsVerification::CustomCa(path) => Self::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => Self::DangerAcceptInvalid,
        }
    }
}

/// Configuration for one dashboard session against one backend.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// HTTP base for `/topology` and `/clab-info`.
    pub backend_url: Url,
    /// WebSocket endpoint of the push feed.
    pub feed_url: Url,
    pub tls: TlsVerification,
    /// HTTP request timeout.
    pub timeout: Duration,
    pub reconnect_initial_delay: Duration,
    pub reconnect_max_delay: Duration,
    /// `None` retries forever.
    pub max_reconnect_attempts: Option<u32>,
    /// Samples kept per rolling series.
    pub history_window: usize,
    /// Unit of per-interface snapshot timestamps on the wire.
    pub snapshot_time_basis: TimeBasis,
    /// Unit of replay timestamps, used only for display.
    pub seek_time_basis: TimeBasis,
    pub layout: LayoutConfig,
    pub export: ExportFormat,
    /// Load the topology from a containerlab file instead of `/topology`.
    pub topology_file: Option<PathBuf>,
}

impl DashboardConfig {
    pub fn new(backend_url: Url, feed_url: Url) -> Self {
        Self {
            backend_url,
            feed_url,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            reconnect_initial_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(30),
            max_reconnect_attempts: None,
            history_window: DEFAULT_WINDOW,
            snapshot_time_basis: TimeBasis::Nanoseconds,
            seek_time_basis: TimeBasis::Seconds,
            layout: LayoutConfig::default(),
            export: ExportFormat::default(),
            topology_file: None,
        }
    }

    /// Config for a backend serving the feed at `<base>/ws` on the same host.
    pub fn for_backend(backend_url: Url) -> Result<Self, CoreError> {
        let feed_url = feed_url_for(&backend_url)?;
        Ok(Self::new(backend_url, feed_url))
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: TlsMode::from(&self.tls),
            timeout: self.timeout,
        }
    }

    pub fn reconnect(&self) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: self.reconnect_initial_delay,
            max_delay: self.reconnect_max_delay,
            max_retries: self.max_reconnect_attempts,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.history_window == 0 {
            return Err(CoreError::Config {
                message: "history window must be at least 1".into(),
            });
        }
        if !matches!(self.feed_url.scheme(), "ws" | "wss") {
            return Err(CoreError::Config {
                message: format!("feed URL must be ws:// or wss://, got {}", self.feed_url),
            });
        }
        if self.reconnect_initial_delay > self.reconnect_max_delay {
            return Err(CoreError::Config {
                message: "reconnect initial delay exceeds max delay".into(),
            });
        }
        self.export.validate()
    }
}

/// `http(s)://host/base` → `ws(s)://host/base/ws`.
pub fn feed_url_for(backend_url: &Url) -> Result<Url, CoreError> {
    let scheme = match backend_url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(CoreError::Config {
                message: format!("unsupported backend scheme '{other}'"),
            });
        }
    };
    let mut url = backend_url.clone();
    url.set_scheme(scheme).map_err(|()| CoreError::Config {
        message: format!("cannot derive feed URL from {backend_url}"),
    })?;
    let path = format!("{}/ws", url.path().trim_end_matches('/'));
    url.set_path(&path);
    Ok(url)
}
