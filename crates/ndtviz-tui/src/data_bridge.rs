//! Data bridge: connects [`Controller`] streams to TUI actions.
//!
//! Runs as a background task. Fetches the topology once, opens the feed,
//! then forwards every published session snapshot and connection-state
//! transition as an [`Action`] until cancelled.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use ndtviz_core::{Command, CommandResult, ConnectionState, Controller};

use crate::action::{Action, Notification};

pub async fn spawn_data_bridge(
    controller: Controller,
    action_tx: mpsc::UnboundedSender<Action>,
    cancel: CancellationToken,
) {
    // The topology is static; a failed fetch leaves the canvas empty but
    // does not stop the telemetry feed.
    match controller.fetch_topology().await {
        Ok(layout) => {
            let _ = action_tx.send(Action::TopologyLoaded(Arc::new(layout)));
        }
        Err(e) => {
            warn!(error = %e, "topology fetch failed");
            let _ = action_tx.send(Action::Notify(Notification::error(format!(
                "topology unavailable: {e}"
            ))));
        }
    }

    if let Err(e) = controller.connect().await {
        warn!(error = %e, "failed to open telemetry feed");
        let _ = action_tx.send(Action::Disconnected(e.to_string()));
        return;
    }

    let mut snapshots = controller.subscribe();
    let mut conn_state = controller.connection_state();
    let _ = action_tx.send(Action::SnapshotUpdated(snapshots.latest()));
    if let Some(action) = state_action(*conn_state.borrow_and_update()) {
        let _ = action_tx.send(action);
    }

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            snap = snapshots.changed() => match snap {
                Some(snap) => {
                    let _ = action_tx.send(Action::SnapshotUpdated(snap));
                }
                None => break,
            },

            Ok(()) = conn_state.changed() => {
                let state = *conn_state.borrow_and_update();
                if let Some(action) = state_action(state) {
                    let _ = action_tx.send(action);
                }
            }
        }
    }

    controller.disconnect().await;
    debug!("data bridge shut down");
}

fn state_action(state: ConnectionState) -> Option<Action> {
    match state {
        ConnectionState::Connected => Some(Action::Connected),
        ConnectionState::Disconnected => Some(Action::Disconnected("disconnected".into())),
        ConnectionState::Reconnecting { attempt } => Some(Action::Reconnecting(attempt)),
        ConnectionState::Failed => Some(Action::Disconnected("connection failed".into())),
        ConnectionState::Connecting => None,
    }
}

/// Run one engine command off the UI loop and report the outcome.
pub fn spawn_command(
    controller: Controller,
    command: Command,
    action_tx: mpsc::UnboundedSender<Action>,
) {
    tokio::spawn(async move {
        let label = command_label(&command);
        let action = match controller.execute(command).await {
            Ok(CommandResult::Exported(path)) => Action::Exported(path),
            Ok(CommandResult::Ok) => return,
            Ok(CommandResult::Ignored) => {
                Action::Notify(Notification::info(format!("{label}: nothing to do")))
            }
            Err(e) => Action::Notify(Notification::error(format!("{label} failed: {e}"))),
        };
        let _ = action_tx.send(action);
    });
}

fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Select(_) => "select",
        Command::ToggleLive => "toggle live",
        Command::Seek { .. } => "seek",
        Command::StepBackward => "step back",
        Command::StepForward => "step forward",
        Command::ExportSkewLog { .. } => "export",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connecting_is_not_surfaced() {
        assert!(state_action(ConnectionState::Connecting).is_none());
        assert!(matches!(
            state_action(ConnectionState::Reconnecting { attempt: 3 }),
            Some(Action::Reconnecting(3))
        ));
        assert!(matches!(
            state_action(ConnectionState::Failed),
            Some(Action::Disconnected(_))
        ));
    }
}
