//! Clock-skew screen: per-cycle timing, render latencies, deviation trend.

use std::sync::Arc;

use color_eyre::eyre::Result;
use crossterm::event::KeyEvent;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Axis, Block, BorderType, Borders, Chart, Dataset, GraphType, Paragraph,
};

use ndtviz_core::{SessionSnapshot, SkewRecord};

use crate::action::Action;
use crate::component::Component;
use crate::theme;
use crate::widgets::fmt::{fmt_ms, fmt_ms_i64, latency_color};

pub struct SkewScreen {
    focused: bool,
    snapshot: Arc<SessionSnapshot>,
}

fn metric(label: &str, value: String, style: Style) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!(" {label:<26}"), theme::key_hint()),
        Span::styled(value, style),
    ])
}

/// Symmetric y bounds covering every deviation, never narrower than ±1 ms.
fn deviation_bounds(history: &[f64]) -> [f64; 2] {
    let reach = history.iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));
    [-reach * 1.1, reach * 1.1]
}

impl SkewScreen {
    pub fn new() -> Self {
        Self {
            focused: false,
            snapshot: Arc::default(),
        }
    }

    fn block(&self, title: &'static str) -> Block<'static> {
        Block::default()
            .title(title)
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border(self.focused))
    }

    fn metrics(&self) -> Vec<Line<'static>> {
        let skew = &self.snapshot.skew;
        let SkewRecord {
            sample,
            min_timestamp_to_render_ms,
            cycle_start_to_render_ms,
        } = skew.latest;
        let row = theme::table_row();

        vec![
            metric("Deviation", fmt_ms(skew.current.deviation_ms), row),
            metric(
                "Deviation (moving avg)",
                fmt_ms(skew.deviation_average),
                row,
            ),
            metric(
                "Poll duration",
                fmt_ms(skew.current.poll_duration_ms),
                row,
            ),
            metric(
                "Cycle duration",
                fmt_ms(skew.current.cycle_duration_ms),
                row,
            ),
            metric(
                "Min device timestamp",
                fmt_epoch_ms(sample.min_device_timestamp_ms),
                row,
            ),
            metric("Cycle start", fmt_epoch_ms(sample.cycle_start_ms), row),
            metric("Collection end", fmt_epoch_ms(sample.collection_end_ms), row),
            metric(
                "Frontend receipt",
                fmt_epoch_ms(sample.frontend_receipt_ms),
                row,
            ),
            Line::default(),
            metric(
                "Min timestamp → render",
                fmt_ms_i64(min_timestamp_to_render_ms),
                Style::default().fg(latency_color(min_timestamp_to_render_ms)),
            ),
            metric(
                "Cycle start → render",
                fmt_ms_i64(cycle_start_to_render_ms),
                Style::default().fg(latency_color(cycle_start_to_render_ms)),
            ),
            Line::default(),
            Line::from(vec![
                Span::styled(format!(" {} rows logged  ", skew.log_len), theme::key_hint()),
                Span::styled("e", theme::key_hint_key()),
                Span::styled(" export", theme::key_hint()),
            ]),
        ]
    }

    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    fn render_trend(&self, frame: &mut Frame, area: Rect) {
        let history = &self.snapshot.skew.deviation_history;
        let points: Vec<(f64, f64)> = history
            .iter()
            .enumerate()
            .map(|(i, &v)| (i as f64, v))
            .collect();
        let [lo, hi] = deviation_bounds(history);

        let dataset = Dataset::default()
            .name("deviation ms")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(theme::YELLOW))
            .data(&points);

        let chart = Chart::new(vec![dataset])
            .block(self.block(" Deviation trend "))
            .x_axis(
                Axis::default()
                    .style(theme::key_hint())
                    .bounds([0.0, (history.len().max(2) - 1) as f64]),
            )
            .y_axis(
                Axis::default()
                    .style(theme::key_hint())
                    .bounds([lo, hi])
                    .labels([
                        Span::raw(format!("{lo:.0}")),
                        Span::raw("0"),
                        Span::raw(format!("{hi:.0}")),
                    ]),
            );
        frame.render_widget(chart, area);
    }
}

/// Wall-clock time of an epoch-millisecond stamp.
fn fmt_epoch_ms(ms: Option<i64>) -> String {
    ms.and_then(chrono::DateTime::from_timestamp_millis)
        .map_or_else(|| "-".into(), |t| t.format("%H:%M:%S%.3f").to_string())
}

impl Component for SkewScreen {
    fn handle_key_event(&mut self, _key: KeyEvent) -> Result<Option<Action>> {
        Ok(None)
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        if let Action::SnapshotUpdated(snap) = action {
            self.snapshot = Arc::clone(snap);
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let [left, right] =
            Layout::horizontal([Constraint::Length(48), Constraint::Min(30)]).areas(area);
        frame.render_widget(
            Paragraph::new(self.metrics()).block(self.block(" Clock skew ")),
            left,
        );
        self.render_trend(frame, right);
    }

    fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }
}
