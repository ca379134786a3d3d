// ── Command API ──
//
// Operator actions flow through a unified `Command` enum. The controller's
// engine task applies each one to the session and forwards any resulting
// control intent to the backend.

use std::path::PathBuf;

use crate::error::CoreError;
use crate::session::Selection;

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// Everything an operator can do to a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Track a different set of interfaces; resets rate histories.
    Select(Selection),
    /// Flip between live streaming and historical replay.
    ToggleLive,
    /// Request replay of a specific snapshot (historical mode only).
    Seek { timestamp: i64 },
    StepBackward,
    StepForward,
    /// Write the full clock-skew log into `dir`.
    ExportSkewLog { dir: PathBuf },
}

/// Outcome of a successfully processed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    Ok,
    /// Valid command that had no effect (already selected, at a bound,
    /// or not in historical mode).
    Ignored,
    Exported(PathBuf),
}
