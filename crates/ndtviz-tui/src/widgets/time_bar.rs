//! Time-machine status line: mode badge, position, and selected time.

use ratatui::style::Style;
use ratatui::text::{Line, Span};

use ndtviz_core::{TimeBasis, TimeTravelMode, session::TimeTravelView};

use crate::theme;

pub fn time_bar(view: &TimeTravelView, basis: TimeBasis) -> Line<'static> {
    let historical = view.mode == TimeTravelMode::Historical;
    let badge = if historical { " HISTORICAL " } else { " LIVE " };
    let mut spans = vec![Span::styled(badge, theme::mode_badge(historical))];

    let total = view.available.len();
    let position = view
        .selected
        .and_then(|ts| view.available.iter().position(|&v| v == ts));

    match (historical, position, view.selected) {
        (true, Some(idx), Some(ts)) => {
            spans.push(Span::styled("  ◀ ", theme::key_hint_key()));
            spans.push(Span::styled(
                format!("{}/{total}", idx + 1),
                Style::default().fg(theme::TEXT),
            ));
            spans.push(Span::styled(" ▶  ", theme::key_hint_key()));
            spans.push(Span::styled(
                basis.to_datetime(ts).format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                Style::default().fg(theme::YELLOW),
            ));
        }
        (true, _, _) => {
            spans.push(Span::styled("  no snapshot selected", theme::key_hint()));
        }
        (false, _, _) => {
            spans.push(Span::styled(
                format!("  {total} snapshots available"),
                theme::key_hint(),
            ));
        }
    }
    spans.push(Span::styled("   t", theme::key_hint_key()));
    spans.push(Span::styled(" live/history  ", theme::key_hint()));
    spans.push(Span::styled("[ ]", theme::key_hint_key()));
    spans.push(Span::styled(" step", theme::key_hint()));
    Line::from(spans)
}
