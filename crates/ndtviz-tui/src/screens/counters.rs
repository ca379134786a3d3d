//! Interface counters screen: rate table, rate chart, raw counters.

use std::sync::Arc;

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Axis, Block, BorderType, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Sparkline,
    Table, TableState,
};
use strum::IntoEnumIterator;

use ndtviz_core::{CounterKind, InterfaceView, SessionSnapshot, TrafficRate};

use crate::action::Action;
use crate::component::Component;
use crate::theme;
use crate::widgets::fmt::fmt_rate_axis;

pub struct CountersScreen {
    focused: bool,
    snapshot: Arc<SessionSnapshot>,
    cursor: usize,
    /// Counter drawn in the sparkline.
    kind: CounterKind,
}

/// Per-interval increments of a cumulative counter series.
fn increments(series: &[u64]) -> Vec<u64> {
    series
        .windows(2)
        .map(|w| w[1].saturating_sub(w[0]))
        .collect()
}

fn next_kind(kind: CounterKind) -> CounterKind {
    let mut kinds = CounterKind::iter().cycle().skip_while(|&k| k != kind);
    kinds.nth(1).unwrap_or(CounterKind::InOctets)
}

/// Chart points `(x, bytes/s)` for one direction of a rate series.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn series_points(history: &[TrafficRate], pick: fn(&TrafficRate) -> f64) -> Vec<(f64, f64)> {
    history
        .iter()
        .enumerate()
        .map(|(i, r)| (i as f64, pick(r)))
        .collect()
}

impl CountersScreen {
    pub fn new() -> Self {
        Self {
            focused: false,
            snapshot: Arc::default(),
            cursor: 0,
            kind: CounterKind::InOctets,
        }
    }

    fn selected(&self) -> Option<&InterfaceView> {
        self.snapshot.interfaces.get(self.cursor)
    }

    fn block(&self, title: String) -> Block<'static> {
        Block::default()
            .title(title)
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border(self.focused))
    }

    fn render_table(&self, frame: &mut Frame, area: Rect) {
        let header = Row::new(["Interface", "In", "Out", "Avg In", "Avg Out"])
            .style(theme::table_header());

        let rows: Vec<Row> = self
            .snapshot
            .interfaces
            .iter()
            .map(|v| {
                let (rate_in, rate_out) = v
                    .rate
                    .map_or_else(|| ("-".into(), "-".into()), |r| (r.format_in(), r.format_out()));
                let (avg_in, avg_out) = if v.average.has_data() {
                    (v.average.rate.format_in(), v.average.rate.format_out())
                } else {
                    ("-".into(), "-".into())
                };
                Row::new([
                    Cell::from(v.key.to_string()),
                    Cell::from(rate_in).style(Style::default().fg(theme::RATE_IN)),
                    Cell::from(rate_out).style(Style::default().fg(theme::RATE_OUT)),
                    Cell::from(avg_in),
                    Cell::from(avg_out),
                ])
                .style(theme::table_row())
            })
            .collect();

        let title = format!(
            " Interfaces ({}) · {} ",
            self.snapshot.interfaces.len(),
            self.snapshot.selection
        );
        let table = Table::new(
            rows,
            [
                Constraint::Min(20),
                Constraint::Length(14),
                Constraint::Length(14),
                Constraint::Length(14),
                Constraint::Length(14),
            ],
        )
        .header(header)
        .block(self.block(title))
        .row_highlight_style(theme::table_selected());

        let mut state = TableState::default().with_selected(
            (!self.snapshot.interfaces.is_empty()).then_some(self.cursor),
        );
        frame.render_stateful_widget(table, area, &mut state);
    }

    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    fn render_chart(&self, frame: &mut Frame, area: Rect) {
        let Some(view) = self.selected() else {
            let block = self.block(" Rate ".into());
            let inner = block.inner(area);
            frame.render_widget(block, area);
            frame.render_widget(
                Paragraph::new("  No interface data yet").style(theme::key_hint()),
                inner,
            );
            return;
        };

        let inbound = series_points(&view.rate_history, |r| r.in_bytes_per_sec);
        let outbound = series_points(&view.rate_history, |r| r.out_bytes_per_sec);
        let peak = view
            .rate_history
            .iter()
            .map(|r| r.in_bytes_per_sec.max(r.out_bytes_per_sec))
            .fold(0.0_f64, f64::max)
            .max(1.0);
        let span = (view.rate_history.len().max(2) - 1) as f64;

        let datasets = vec![
            Dataset::default()
                .name("in")
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(theme::RATE_IN))
                .data(&inbound),
            Dataset::default()
                .name("out")
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(theme::RATE_OUT))
                .data(&outbound),
        ];

        let chart = Chart::new(datasets)
            .block(self.block(format!(" Rate · {} ", view.key)))
            .x_axis(
                Axis::default()
                    .style(theme::key_hint())
                    .bounds([0.0, span]),
            )
            .y_axis(
                Axis::default()
                    .style(theme::key_hint())
                    .bounds([0.0, peak * 1.1])
                    .labels([
                        Span::raw("0"),
                        Span::raw(fmt_rate_axis(peak / 2.0)),
                        Span::raw(fmt_rate_axis(peak)),
                    ]),
            );
        frame.render_widget(chart, area);
    }

    fn render_counters(&self, frame: &mut Frame, area: Rect) {
        let block = self.block(" Counters ".into());
        let Some(view) = self.selected() else {
            frame.render_widget(block, area);
            return;
        };
        let inner = block.inner(area);
        frame.render_widget(block, area);
        let [values, spark_title, spark] = Layout::vertical([
            Constraint::Length(8),
            Constraint::Length(1),
            Constraint::Min(1),
        ])
        .areas(inner);

        let lines: Vec<Line> = CounterKind::iter()
            .map(|kind| {
                let label_style = if kind == self.kind {
                    theme::key_hint_key()
                } else {
                    theme::key_hint()
                };
                Line::from(vec![
                    Span::styled(format!(" {:<13}", kind.as_ref()), label_style),
                    Span::styled(
                        view.latest.counters.get(kind).to_string(),
                        theme::table_row(),
                    ),
                ])
            })
            .collect();
        frame.render_widget(Paragraph::new(lines), values);

        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(format!(" Δ {}  ", self.kind), theme::title_style()),
                Span::styled("c", theme::key_hint_key()),
                Span::styled(" next", theme::key_hint()),
            ])),
            spark_title,
        );
        let deltas = increments(&view.series(self.kind));
        frame.render_widget(
            Sparkline::default()
                .data(&deltas)
                .style(Style::default().fg(theme::ACCENT)),
            spark,
        );
    }
}

impl Component for CountersScreen {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let last = self.snapshot.interfaces.len().saturating_sub(1);
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => self.cursor = (self.cursor + 1).min(last),
            KeyCode::Up | KeyCode::Char('k') => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Home | KeyCode::Char('g') => self.cursor = 0,
            KeyCode::End | KeyCode::Char('G') => self.cursor = last,
            KeyCode::Char('c') => self.kind = next_kind(self.kind),
            _ => {}
        }
        Ok(None)
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        if let Action::SnapshotUpdated(snap) = action {
            // Keep the cursor on the same interface when the set changes.
            let focused_key = self.selected().map(|v| v.key.clone());
            self.snapshot = Arc::clone(snap);
            self.cursor = focused_key
                .and_then(|k| self.snapshot.interfaces.iter().position(|v| v.key == k))
                .unwrap_or(0);
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let [top, bottom] =
            Layout::vertical([Constraint::Percentage(45), Constraint::Percentage(55)]).areas(area);
        let [chart, counters] =
            Layout::horizontal([Constraint::Min(40), Constraint::Length(32)]).areas(bottom);

        self.render_table(frame, top);
        self.render_chart(frame, chart);
        self.render_counters(frame, counters);
    }

    fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use ndtviz_core::model::RateAverage;
    use ndtviz_core::{CounterSnapshot, Counters, InterfaceKey};

    fn view(device: &str, iface: &str) -> InterfaceView {
        InterfaceView {
            key: InterfaceKey::new(device, iface),
            latest: CounterSnapshot {
                name: iface.into(),
                timestamp_ns: 0,
                counters: Counters::default(),
            },
            rate: None,
            average: RateAverage::default(),
            rate_history: Vec::new(),
            history: Vec::new(),
        }
    }

    fn snapshot(keys: &[(&str, &str)]) -> Action {
        Action::SnapshotUpdated(Arc::new(SessionSnapshot {
            interfaces: keys.iter().map(|(d, i)| view(d, i)).collect(),
            ..SessionSnapshot::default()
        }))
    }

    #[test]
    fn cursor_follows_interface_across_updates() {
        let mut screen = CountersScreen::new();
        screen
            .update(&snapshot(&[("leaf1", "e1-1"), ("leaf1", "e1-2")]))
            .unwrap();
        screen
            .handle_key_event(KeyEvent::new(KeyCode::Down, KeyModifiers::NONE))
            .unwrap();
        assert_eq!(screen.selected().unwrap().key.interface, "e1-2");

        screen
            .update(&snapshot(&[("leaf0", "e1-9"), ("leaf1", "e1-1"), ("leaf1", "e1-2")]))
            .unwrap();
        assert_eq!(screen.cursor, 2);

        screen.update(&snapshot(&[("spine1", "e1-1")])).unwrap();
        assert_eq!(screen.cursor, 0);
    }

    #[test]
    fn counter_increments_saturate_on_reset() {
        assert_eq!(increments(&[10, 15, 15, 3, 8]), vec![5, 0, 0, 5]);
        assert!(increments(&[42]).is_empty());
    }

    #[test]
    fn counter_kind_cycles() {
        assert_eq!(next_kind(CounterKind::InOctets), CounterKind::OutOctets);
        assert_eq!(next_kind(CounterKind::OutDiscards), CounterKind::InOctets);
    }

    #[test]
    fn series_points_index_samples() {
        let history = [
            TrafficRate {
                in_bytes_per_sec: 10.0,
                out_bytes_per_sec: 1.0,
            },
            TrafficRate {
                in_bytes_per_sec: 20.0,
                out_bytes_per_sec: 2.0,
            },
        ];
        assert_eq!(
            series_points(&history, |r| r.in_bytes_per_sec),
            vec![(0.0, 10.0), (1.0, 20.0)]
        );
    }
}
