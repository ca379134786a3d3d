//! `timestamps` and `replay`: historical snapshot browsing.

use serde::Serialize;
use tabled::Tabled;

use ndtviz_core::{Command as CoreCommand, Controller, SessionSnapshot, TimeTravelMode};

use crate::cli::{GlobalOpts, ReplayArgs, TimestampsArgs};
use crate::error::CliError;
use crate::output;

use super::{util, watch};

#[derive(Serialize)]
struct TimestampEntry {
    index: usize,
    timestamp: i64,
    time: chrono::DateTime<chrono::Utc>,
}

#[derive(Tabled)]
struct TimestampRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Timestamp")]
    timestamp: i64,
    #[tabled(rename = "Time (UTC)")]
    time: String,
}

impl From<&TimestampEntry> for TimestampRow {
    fn from(e: &TimestampEntry) -> Self {
        Self {
            index: e.index,
            timestamp: e.timestamp,
            time: e.time.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

pub async fn handle_timestamps(
    controller: &Controller,
    args: TimestampsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    controller.connect().await?;
    let snap = util::wait_for(
        controller,
        global,
        "waiting for available timestamps",
        args.wait,
        |s| !s.time_travel.available.is_empty(),
    )
    .await?;

    let basis = controller.config().seek_time_basis;
    let entries: Vec<TimestampEntry> = snap
        .time_travel
        .available
        .iter()
        .enumerate()
        .map(|(index, &timestamp)| TimestampEntry {
            index,
            timestamp,
            time: basis.to_datetime(timestamp),
        })
        .collect();

    let out = output::render_list(
        &global.output,
        &entries,
        |e| TimestampRow::from(e),
        |e| e.timestamp.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn handle_replay(
    controller: &Controller,
    args: ReplayArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let selection = util::parse_selection(&args.selection)?;
    util::start(controller, selection).await?;

    let snap = util::wait_for(
        controller,
        global,
        "waiting for available timestamps",
        args.wait,
        |s| !s.time_travel.available.is_empty(),
    )
    .await?;
    if !snap.time_travel.available.contains(&args.at) {
        return Err(CliError::NotFound {
            resource_type: "timestamp".into(),
            identifier: args.at.to_string(),
            hint: "run `ndtviz timestamps` to list what the backend holds".into(),
        });
    }

    let result = replay_at(controller, &args, global).await;

    // Always hand the backend back to live streaming.
    if controller.snapshot().time_travel.mode == TimeTravelMode::Historical {
        if let Err(e) = controller.execute(CoreCommand::ToggleLive).await {
            tracing::warn!(error = %e, "failed to return to live mode");
        }
    }
    result
}

/// Whether `snap` shows the replayed cycle, given the cycle count observed
/// right after the seek went out. One cycle may already have been in flight
/// before the backend saw the seek; the backend repeats the selected cycle,
/// so the one after it is the replay.
fn is_replayed(snap: &SessionSnapshot, seen_at_seek: u64) -> bool {
    snap.cycles >= seen_at_seek + 2
}

async fn replay_at(
    controller: &Controller,
    args: &ReplayArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::execute_effective(controller, CoreCommand::ToggleLive, "mode").await?;
    util::execute_effective(
        controller,
        CoreCommand::Seek { timestamp: args.at },
        "at",
    )
    .await?;
    let seen = controller.snapshot().cycles;

    let snap = util::wait_for(
        controller,
        global,
        "waiting for the historical snapshot",
        args.wait,
        |s| is_replayed(s, seen),
    )
    .await?;
    watch::render_cycle(&snap, global);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_cycle(cycles: u64) -> SessionSnapshot {
        SessionSnapshot {
            cycles,
            ..SessionSnapshot::default()
        }
    }

    #[test]
    fn replay_skips_cycle_in_flight_at_seek() {
        assert!(!is_replayed(&at_cycle(4), 4));
        assert!(!is_replayed(&at_cycle(5), 4));
        assert!(is_replayed(&at_cycle(6), 4));
        assert!(is_replayed(&at_cycle(9), 4));
    }
}
