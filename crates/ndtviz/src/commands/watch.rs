//! `watch`: per-interface traffic rates, one table per counter cycle.

use serde::Serialize;
use tabled::Tabled;

use ndtviz_core::{Controller, InterfaceView, SessionSnapshot, TimeTravelMode};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct RateRow {
    #[tabled(rename = "Interface")]
    key: String,
    #[tabled(rename = "In")]
    rate_in: String,
    #[tabled(rename = "Out")]
    rate_out: String,
    #[tabled(rename = "Avg In")]
    avg_in: String,
    #[tabled(rename = "Avg Out")]
    avg_out: String,
    #[tabled(rename = "Samples")]
    samples: usize,
}

impl From<&InterfaceView> for RateRow {
    fn from(v: &InterfaceView) -> Self {
        let avg = v.average.has_data().then_some(v.average.rate);
        Self {
            key: v.key.to_string(),
            rate_in: output::opt_cell(v.rate.map(|r| r.format_in())),
            rate_out: output::opt_cell(v.rate.map(|r| r.format_out())),
            avg_in: output::opt_cell(avg.map(|r| r.format_in())),
            avg_out: output::opt_cell(avg.map(|r| r.format_out())),
            samples: v.average.samples,
        }
    }
}

/// One cycle as emitted by structured formats.
#[derive(Serialize)]
struct CycleReport<'a> {
    cycle: u64,
    received_at: Option<chrono::DateTime<chrono::Utc>>,
    interfaces: &'a [InterfaceView],
    unreachable: &'a [String],
}

pub(super) fn render_cycle(snap: &SessionSnapshot, global: &GlobalOpts) {
    match global.output {
        OutputFormat::Table | OutputFormat::Plain => {
            if !global.quiet {
                let color = output::should_color(&global.color);
                eprintln!(
                    "cycle {} · {} · {}{}",
                    snap.cycles,
                    output::mode_badge(snap.time_travel.mode == TimeTravelMode::Historical, color),
                    snap.selection,
                    if snap.unreachable.is_empty() {
                        String::new()
                    } else {
                        format!(" · unreachable: {}", snap.unreachable.join(", "))
                    }
                );
            }
            let out = output::render_list(
                &global.output,
                &snap.interfaces,
                |v| RateRow::from(v),
                |v| {
                    format!(
                        "{} {} {}",
                        v.key,
                        v.rate.map_or(0.0, |r| r.in_bytes_per_sec),
                        v.rate.map_or(0.0, |r| r.out_bytes_per_sec)
                    )
                },
            );
            output::print_output(&out, global.quiet);
        }
        _ => {
            let report = CycleReport {
                cycle: snap.cycles,
                received_at: snap.last_cycle_at,
                interfaces: &snap.interfaces,
                unreachable: &snap.unreachable,
            };
            let out = output::render_single(&global.output, &report, |_| String::new(), |_| String::new());
            output::print_output(&out, global.quiet);
        }
    }
}

pub async fn handle(
    controller: &Controller,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let selection = util::parse_selection(&args.selection)?;
    util::start(controller, selection).await?;

    let mut seen = controller.snapshot().cycles;
    for _ in 0..args.stream.cycles {
        let snap = util::wait_for(
            controller,
            global,
            "waiting for counters",
            args.stream.wait,
            |s| s.cycles > seen,
        )
        .await?;
        seen = snap.cycles;
        render_cycle(&snap, global);
    }
    Ok(())
}
