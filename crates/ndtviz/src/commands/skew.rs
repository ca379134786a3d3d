//! `skew`: collect clock-skew metrics and optionally export the log.

use serde::Serialize;

use ndtviz_core::{ClockSkewSample, Command as CoreCommand, CommandResult, Controller, SkewRecord};

use crate::cli::{GlobalOpts, SkewArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct SkewSummary {
    cycles: usize,
    current: ClockSkewSample,
    latest: SkewRecord,
    deviation_average_ms: Option<f64>,
    deviation_history_ms: Vec<f64>,
}

fn ms<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".into(), |v| format!("{v} ms"))
}

fn detail(s: &SkewSummary) -> String {
    let c = &s.current;
    [
        format!("Cycles:                 {}", s.cycles),
        format!("Deviation:              {}", ms(c.deviation_ms)),
        format!(
            "Deviation (avg):        {}",
            ms(s.deviation_average_ms.map(|v| format!("{v:.2}")))
        ),
        format!("Min device timestamp:   {}", ms(c.min_device_timestamp_ms)),
        format!("Cycle start:            {}", ms(c.cycle_start_ms)),
        format!("Collection end:         {}", ms(c.collection_end_ms)),
        format!("Poll duration:          {}", ms(c.poll_duration_ms)),
        format!("Cycle duration:         {}", ms(c.cycle_duration_ms)),
        format!("Receipt:                {}", ms(c.frontend_receipt_ms)),
        format!(
            "Min timestamp → render: {}",
            ms(s.latest.min_timestamp_to_render_ms)
        ),
        format!(
            "Cycle start → render:   {}",
            ms(s.latest.cycle_start_to_render_ms)
        ),
    ]
    .join("\n")
}

pub async fn handle(
    controller: &Controller,
    args: SkewArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    controller.connect().await?;

    let target = usize::try_from(args.stream.cycles).unwrap_or(usize::MAX);
    let snap = util::wait_for(
        controller,
        global,
        "collecting cycle metadata",
        args.stream.wait,
        |s| s.skew.log_len >= target,
    )
    .await?;

    let summary = SkewSummary {
        cycles: snap.skew.log_len,
        current: snap.skew.current,
        latest: snap.skew.latest,
        deviation_average_ms: snap.skew.deviation_average,
        deviation_history_ms: snap.skew.deviation_history.clone(),
    };
    let out = output::render_single(&global.output, &summary, detail, |s| {
        output::opt_cell(s.latest.min_timestamp_to_render_ms)
    });
    output::print_output(&out, global.quiet);

    if let Some(dir) = args.export {
        if let CommandResult::Exported(path) = controller
            .execute(CoreCommand::ExportSkewLog { dir })
            .await?
        {
            if !global.quiet {
                eprintln!("✓ Exported {} rows to {}", summary.cycles, path.display());
            }
        }
    }
    Ok(())
}
