//! Shared helpers for command handlers.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use ndtviz_core::{
    Command as CoreCommand, CommandResult, ConnectionState, Controller, Selection, SessionSnapshot,
};

use crate::cli::{GlobalOpts, SelectionArgs};
use crate::error::CliError;

/// Build a core `Selection` from `--device` / `--link`.
pub fn parse_selection(args: &SelectionArgs) -> Result<Selection, CliError> {
    if let Some(ref device) = args.device {
        return Ok(Selection::device(device.clone()));
    }
    let Some(ref link) = args.link else {
        return Ok(Selection::All);
    };

    let invalid = || CliError::Validation {
        field: "link".into(),
        reason: format!("expected 'node:iface,node:iface', got '{link}'"),
    };
    let (a, b) = link.split_once(',').ok_or_else(invalid)?;
    let (source, source_interface) = a.trim().split_once(':').ok_or_else(invalid)?;
    let (target, target_interface) = b.trim().split_once(':').ok_or_else(invalid)?;
    if [source, source_interface, target, target_interface]
        .iter()
        .any(|s| s.is_empty())
    {
        return Err(invalid());
    }

    Ok(Selection::Link {
        source: source.into(),
        source_interface: source_interface.into(),
        target: target.into(),
        target_interface: target_interface.into(),
    })
}

/// Open the feed and apply `selection` before any data is consumed.
pub async fn start(controller: &Controller, selection: Selection) -> Result<(), CliError> {
    controller.connect().await?;
    if selection != Selection::All {
        controller.execute(CoreCommand::Select(selection)).await?;
    }
    Ok(())
}

/// Spinner on stderr, hidden in quiet mode.
fn spinner(message: &str, global: &GlobalOpts) -> ProgressBar {
    if global.quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_owned());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Wait until a published snapshot satisfies `done`.
///
/// Fails with `Timeout` after `wait_secs`, or `ConnectionFailed` when the
/// feed gives up reconnecting.
pub async fn wait_for(
    controller: &Controller,
    global: &GlobalOpts,
    message: &str,
    wait_secs: u64,
    mut done: impl FnMut(&SessionSnapshot) -> bool,
) -> Result<Arc<SessionSnapshot>, CliError> {
    let pb = spinner(message, global);
    let mut stream = controller.subscribe();
    let mut state = controller.connection_state();

    let outcome = tokio::time::timeout(Duration::from_secs(wait_secs), async {
        loop {
            let snap = stream.latest();
            if done(&snap) {
                return Ok(snap);
            }
            pb.set_message(format!("{message} ({} cycles seen)", snap.cycles));

            tokio::select! {
                changed = stream.changed() => {
                    if changed.is_none() {
                        return Err(CliError::FeedClosed);
                    }
                }
                failed = state.wait_for(|s| *s == ConnectionState::Failed) => {
                    drop(failed);
                    return Err(CliError::ConnectionFailed {
                        url: controller.config().feed_url.to_string(),
                        source: "feed gave up reconnecting".into(),
                    });
                }
            }
        }
    })
    .await;

    pb.finish_and_clear();
    outcome.unwrap_or(Err(CliError::Timeout { seconds: wait_secs }))
}

/// Run a core command, reporting a no-op as a validation error.
pub async fn execute_effective(
    controller: &Controller,
    command: CoreCommand,
    what: &str,
) -> Result<CommandResult, CliError> {
    match controller.execute(command).await? {
        CommandResult::Ignored => Err(CliError::Validation {
            field: what.into(),
            reason: "the command had no effect in the current mode".into(),
        }),
        other => Ok(other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn args(device: Option<&str>, link: Option<&str>) -> SelectionArgs {
        SelectionArgs {
            device: device.map(Into::into),
            link: link.map(Into::into),
        }
    }

    #[test]
    fn selection_defaults_to_all() {
        assert_eq!(parse_selection(&args(None, None)).unwrap(), Selection::All);
    }

    #[test]
    fn device_selection() {
        assert_eq!(
            parse_selection(&args(Some("leaf1"), None)).unwrap(),
            Selection::device("leaf1")
        );
    }

    #[test]
    fn link_selection_parses_both_endpoints() {
        let sel = parse_selection(&args(None, Some("leaf1:e1-1, spine1:e1-49"))).unwrap();
        assert_eq!(
            sel,
            Selection::Link {
                source: "leaf1".into(),
                source_interface: "e1-1".into(),
                target: "spine1".into(),
                target_interface: "e1-49".into(),
            }
        );
    }

    #[test]
    fn malformed_link_is_rejected() {
        for bad in ["leaf1", "leaf1:e1-1", "leaf1:e1-1,spine1", ":e1,b:e2"] {
            assert!(
                matches!(
                    parse_selection(&args(None, Some(bad))),
                    Err(CliError::Validation { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }
}
