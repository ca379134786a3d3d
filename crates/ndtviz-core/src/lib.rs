// ndtviz-core: telemetry aggregation engine between ndtviz-api and the
// front ends (CLI/TUI).

pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod layout;
pub mod model;
pub mod rates;
pub mod session;
pub mod skew;
pub mod store;
pub mod stream;
pub mod timetravel;
pub mod units;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult};
pub use config::{DashboardConfig, TlsVerification};
pub use controller::{ConnectionState, Controller, FeedTransport};
pub use error::CoreError;
pub use export::ExportFormat;
pub use layout::{EdgeOffset, ForceParams, LayoutConfig, TopologyLayout};
pub use rates::RateEngine;
pub use session::{InterfaceView, Selection, SessionSnapshot, TelemetrySession};
pub use skew::{ClockSkewSample, ClockSkewTracker, SkewRecord};
pub use store::{RingBuffer, RollingHistoryStore};
pub use stream::SnapshotStream;
pub use timetravel::{TimeTravelController, TimeTravelMode};
pub use units::{RateUnit, TimeBasis};

pub use model::{CounterKind, CounterSnapshot, Counters, InterfaceKey, TrafficRate};

// Wire-level types consumers need without depending on ndtviz-api directly.
pub use ndtviz_api::{ControlIntent, FeedMessage, TopologyGraph, TopologyLink, TopologyNode};
