//! Shared configuration for the ndtviz CLI and TUI.
//!
//! TOML profiles layered with `NDTVIZ_*` environment overrides, and
//! translation to `ndtviz_core::DashboardConfig`. Both binaries depend on
//! this crate; the CLI adds `GlobalOpts`-aware wrappers on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ndtviz_core::config::feed_url_for;
use ndtviz_core::{DashboardConfig, ExportFormat, LayoutConfig, TimeBasis, TlsVerification};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration shared by CLI and TUI.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, or the default profile when `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Samples kept per rolling series.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    #[serde(default = "default_delimiter")]
    pub export_delimiter: char,

    #[serde(default = "default_decimal_separator")]
    pub export_decimal_separator: char,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
            history_window: default_history_window(),
            export_delimiter: default_delimiter(),
            export_decimal_separator: default_decimal_separator(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_history_window() -> usize {
    120
}
fn default_delimiter() -> char {
    ExportFormat::default().delimiter
}
fn default_decimal_separator() -> char {
    ExportFormat::default().decimal_separator
}

/// A named backend profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Backend base URL (e.g., "http://localhost:5000").
    pub backend: String,

    /// Push feed URL. Derived from `backend` (`ws(s)://…/ws`) when unset.
    pub feed: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// Override the rolling window size.
    pub history_window: Option<usize>,

    /// Unit of interface snapshot timestamps: nanoseconds, milliseconds
    /// or seconds.
    pub snapshot_time_basis: Option<String>,

    /// Unit of replay timestamps (display only).
    pub seek_time_basis: Option<String>,

    /// Containerlab topology file used instead of `/topology`.
    pub topology_file: Option<PathBuf>,

    /// Give up after this many reconnect attempts. Unset retries forever.
    pub max_reconnect_attempts: Option<u32>,

    /// Upper bound on reconnect backoff, in seconds.
    pub reconnect_max_delay: Option<u64>,

    /// Topology layout tuning.
    pub layout: Option<LayoutConfig>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "ndtviz", "ndtviz").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("ndtviz");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. Nested keys use a double underscore:
/// `NDTVIZ_DEFAULTS__TIMEOUT=5`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("NDTVIZ_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Profile translation ─────────────────────────────────────────────

fn parse_url(field: &str, raw: &str) -> Result<url::Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}

fn parse_basis(field: &str, raw: Option<&str>, fallback: TimeBasis) -> Result<TimeBasis, ConfigError> {
    raw.map_or(Ok(fallback), |raw| {
        raw.parse().map_err(|_| ConfigError::Validation {
            field: field.into(),
            reason: format!("expected 'nanoseconds', 'milliseconds', or 'seconds', got '{raw}'"),
        })
    })
}

/// Build a `DashboardConfig` from a profile, with no CLI flag overrides.
pub fn profile_to_dashboard_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<DashboardConfig, ConfigError> {
    let backend_url = parse_url("backend", &profile.backend)?;
    let feed_url = match profile.feed.as_deref() {
        Some(raw) => parse_url("feed", raw)?,
        None => feed_url_for(&backend_url).map_err(|e| ConfigError::Validation {
            field: "feed".into(),
            reason: e.to_string(),
        })?,
    };

    let mut cfg = DashboardConfig::new(backend_url, feed_url);

    cfg.tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };
    cfg.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    cfg.history_window = profile.history_window.unwrap_or(defaults.history_window);
    cfg.snapshot_time_basis = parse_basis(
        "snapshot_time_basis",
        profile.snapshot_time_basis.as_deref(),
        cfg.snapshot_time_basis,
    )?;
    cfg.seek_time_basis = parse_basis(
        "seek_time_basis",
        profile.seek_time_basis.as_deref(),
        cfg.seek_time_basis,
    )?;
    cfg.topology_file.clone_from(&profile.topology_file);
    cfg.max_reconnect_attempts = profile.max_reconnect_attempts;
    if let Some(secs) = profile.reconnect_max_delay {
        cfg.reconnect_max_delay = Duration::from_secs(secs);
    }
    if let Some(layout) = profile.layout {
        cfg.layout = layout;
    }
    cfg.export = ExportFormat {
        delimiter: defaults.export_delimiter,
        decimal_separator: defaults.export_decimal_separator,
    };

    cfg.validate().map_err(|e| ConfigError::Validation {
        field: "profile".into(),
        reason: e.to_string(),
    })?;
    Ok(cfg)
}
