//! `ndtviz-tui`: live terminal dashboard for a network digital twin.
//!
//! Screens are navigable via number keys: Topology (force-placed nodes with
//! curved parallel links), Counters (per-interface rates and history), and
//! Clock Skew (cycle timing and render latency). `t`, `[` and `]` drive the
//! time machine from any screen.
//!
//! Logs go to a file (default `/tmp/ndtviz-tui.log`) so they never corrupt
//! the terminal. A background data bridge forwards session snapshots from
//! the engine into the TUI action loop.

mod action;
mod app;
mod component;
mod data_bridge;
mod event;
mod force;
mod screen;
mod screens;
mod theme;
mod tui;
mod widgets;

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr, eyre};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use ndtviz_config::Profile;
use ndtviz_core::{Controller, DashboardConfig};

use crate::app::App;

/// Terminal dashboard for live network digital-twin telemetry.
#[derive(Parser, Debug)]
#[command(name = "ndtviz-tui", version, about)]
struct Cli {
    /// Config profile to use
    #[arg(short = 'p', long, env = "NDTVIZ_PROFILE")]
    profile: Option<String>,

    /// Backend base URL (overrides the profile)
    #[arg(short = 'b', long, env = "NDTVIZ_BACKEND")]
    backend: Option<String>,

    /// Telemetry feed URL (defaults to `<backend>/ws`)
    #[arg(long, env = "NDTVIZ_FEED")]
    feed: Option<String>,

    /// Read the topology from a containerlab file instead of the backend
    #[arg(short = 'f', long)]
    topology_file: Option<PathBuf>,

    /// Directory clock-skew exports are written to
    #[arg(long, default_value = ".")]
    export_dir: PathBuf,

    /// Log file path
    #[arg(long, default_value = "/tmp/ndtviz-tui.log")]
    log_file: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// File-only tracing; stdout belongs to the terminal UI. Hold the returned
/// guard for the lifetime of the app so buffered lines are flushed.
fn setup_tracing(cli: &Cli) -> WorkerGuard {
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("ndtviz_tui={log_level},ndtviz_core={log_level}"))
    });

    let log_dir = cli
        .log_file
        .parent()
        .unwrap_or(std::path::Path::new("/tmp"));
    let log_filename = cli
        .log_file
        .file_name()
        .unwrap_or(std::ffi::OsStr::new("ndtviz-tui.log"));

    let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true),
        )
        .init();

    guard
}

/// Resolve the engine config. Priority: CLI flags > profile > defaults.
fn build_config(cli: &Cli) -> Result<DashboardConfig> {
    let cfg = ndtviz_config::load_config_or_default();

    let named = cli
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into());
    let mut profile = match (cfg.profiles.get(&named), &cli.backend) {
        (Some(p), _) => p.clone(),
        (None, Some(_)) => Profile::default(),
        (None, None) if cli.profile.is_some() => {
            return Err(eyre!("profile '{named}' not found in config"));
        }
        (None, None) => {
            return Err(eyre!(
                "no backend configured: pass --backend or run `ndtviz config init`"
            ));
        }
    };

    if let Some(ref backend) = cli.backend {
        profile.backend.clone_from(backend);
    }
    if cli.feed.is_some() {
        profile.feed.clone_from(&cli.feed);
    }
    if cli.topology_file.is_some() {
        profile.topology_file.clone_from(&cli.topology_file);
    }

    ndtviz_config::profile_to_dashboard_config(&profile, &cfg.defaults)
        .wrap_err_with(|| format!("invalid configuration for profile '{named}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Hooks go in before the terminal switches to raw mode.
    tui::install_hooks()?;
    let _log_guard = setup_tracing(&cli);

    let config = build_config(&cli)?;
    info!(
        backend = %config.backend_url,
        feed = %config.feed_url,
        "starting ndtviz-tui"
    );

    let mut app = App::new(Controller::new(config), cli.export_dir);
    app.run().await
}
