//! Clap derive structures for the `ndtviz` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// ndtviz -- live network telemetry from the command line
#[derive(Debug, Parser)]
#[command(
    name = "ndtviz",
    version,
    about = "Inspect live network telemetry from the command line",
    long_about = "Command-line client for a network digital twin telemetry backend.\n\n\
        Streams per-interface counters into traffic rates, tracks clock skew\n\
        across polling cycles, replays historical snapshots, and lays out the\n\
        lab topology.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Backend profile to use
    #[arg(long, short = 'p', env = "NDTVIZ_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Backend base URL (overrides profile)
    #[arg(long, short = 'b', env = "NDTVIZ_BACKEND", global = true)]
    pub backend: Option<String>,

    /// WebSocket feed URL (default: derived from the backend URL)
    #[arg(long, env = "NDTVIZ_FEED", global = true)]
    pub feed: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "NDTVIZ_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "NDTVIZ_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "NDTVIZ_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the lab topology with parallel-link offsets
    #[command(alias = "topo")]
    Topology(TopologyArgs),

    /// Stream interface traffic rates
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Collect clock-skew metrics across polling cycles
    Skew(SkewArgs),

    /// List timestamps available for historical replay
    #[command(alias = "ts")]
    Timestamps(TimestampsArgs),

    /// Replay one historical snapshot, then return to live
    Replay(ReplayArgs),

    /// Show the backend's lab description
    Lab,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared Arguments ─────────────────────────────────────────────────

/// Which interfaces to track.
#[derive(Debug, Args)]
pub struct SelectionArgs {
    /// Only interfaces of this device
    #[arg(long, short = 'd', conflicts_with = "link")]
    pub device: Option<String>,

    /// Only the two endpoints of a link: "node:iface,node:iface"
    #[arg(long, value_name = "A:IF,B:IF")]
    pub link: Option<String>,
}

/// Bounds for commands that consume the live feed.
#[derive(Debug, Args)]
pub struct StreamArgs {
    /// Number of cycles to collect
    #[arg(long, short = 'n', default_value = "5")]
    pub cycles: u64,

    /// Give up after this many seconds
    #[arg(long, default_value = "60")]
    pub wait: u64,
}

// ── Per-command Arguments ────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TopologyArgs {
    /// Read a containerlab topology file instead of querying the backend
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// List nodes instead of links
    #[arg(long)]
    pub nodes: bool,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub stream: StreamArgs,
}

#[derive(Debug, Args)]
pub struct SkewArgs {
    #[command(flatten)]
    pub stream: StreamArgs,

    /// Write the collected log as CSV into this directory
    #[arg(long, value_name = "DIR")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct TimestampsArgs {
    /// Give up after this many seconds
    #[arg(long, default_value = "30")]
    pub wait: u64,
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Timestamp to replay (as listed by `ndtviz timestamps`)
    #[arg(long)]
    pub at: i64,

    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Give up after this many seconds
    #[arg(long, default_value = "30")]
    pub wait: u64,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file (prompts when --backend is omitted)
    Init {
        /// Backend base URL
        #[arg(long)]
        backend: Option<String>,

        /// Profile name
        #[arg(long, default_value = "default")]
        name: String,

        /// Overwrite an existing profile of the same name
        #[arg(long)]
        force: bool,
    },

    /// Display current resolved configuration
    Show,

    /// Print the config file location
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
