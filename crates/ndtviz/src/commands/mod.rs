//! Command dispatch: bridges CLI args -> core Commands -> output formatting.

pub mod config_cmd;
pub mod skew;
pub mod timetravel;
pub mod topology;
pub mod util;
pub mod watch;

use ndtviz_core::Controller;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a backend-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Topology(args) => topology::handle(controller, &args, global).await,
        Command::Watch(args) => watch::handle(controller, args, global).await,
        Command::Skew(args) => skew::handle(controller, args, global).await,
        Command::Timestamps(args) => timetravel::handle_timestamps(controller, args, global).await,
        Command::Replay(args) => timetravel::handle_replay(controller, args, global).await,
        Command::Lab => topology::handle_lab(controller, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
