//! Topology screen: force-placed nodes with curved parallel links.
//!
//! Layout:
//! ┌─ Topology ─────────────────────────────┐┌─ Inspect ──────────┐
//! │   leaf1 ●━━━━━━━━━━● spine1             ││ ▸ all devices      │
//! │          ╲________╱                     ││   leaf1    1.20 M… │
//! │                                         ││   leaf1:e1 ↔ sp…   │
//! └─────────────────────────────────────────┘└────────────────────┘

use std::sync::Arc;

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Circle, Context, Line as CanvasLine};
use ratatui::widgets::{Block, BorderType, Borders, List, ListItem, ListState, Paragraph};

use ndtviz_core::{
    Command, InterfaceKey, Selection, SessionSnapshot, TopologyLayout, TopologyLink,
};

use crate::action::Action;
use crate::component::Component;
use crate::force::ForceLayout;
use crate::theme;

/// Segments used to approximate one quadratic curve.
const CURVE_SEGMENTS: u32 = 16;
/// Simulation steps per UI tick.
const STEPS_PER_TICK: usize = 4;

/// Something the operator can focus from the side list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Item {
    All,
    Node(usize),
    Link(usize),
}

/// Point on the quadratic Bézier `from → to` with control point `ctrl`.
pub fn quadratic_point(from: (f64, f64), ctrl: (f64, f64), to: (f64, f64), t: f64) -> (f64, f64) {
    let u = 1.0 - t;
    (
        u * u * from.0 + 2.0 * u * t * ctrl.0 + t * t * to.0,
        u * u * from.1 + 2.0 * u * t * ctrl.1 + t * t * to.1,
    )
}

pub struct TopologyScreen {
    focused: bool,
    layout: Option<Arc<TopologyLayout>>,
    sim: Option<ForceLayout>,
    snapshot: Arc<SessionSnapshot>,
    items: Vec<Item>,
    cursor: usize,
}

impl TopologyScreen {
    pub fn new() -> Self {
        Self {
            focused: false,
            layout: None,
            sim: None,
            snapshot: Arc::default(),
            items: vec![Item::All],
            cursor: 0,
        }
    }

    fn load(&mut self, layout: Arc<TopologyLayout>) {
        let mut sim = ForceLayout::new(&layout.graph, layout.force);
        // Pre-settle so the first frame is already readable.
        sim.settle(60);
        self.items = std::iter::once(Item::All)
            .chain((0..layout.graph.nodes.len()).map(Item::Node))
            .chain((0..layout.graph.links.len()).map(Item::Link))
            .collect();
        self.cursor = 0;
        self.sim = Some(sim);
        self.layout = Some(layout);
    }

    fn selection_for(&self, item: Item) -> Option<Selection> {
        let layout = self.layout.as_ref()?;
        match item {
            Item::All => Some(Selection::All),
            Item::Node(i) => layout.graph.nodes.get(i).map(|n| Selection::device(&n.id)),
            Item::Link(i) => layout.graph.links.get(i).map(Selection::link),
        }
    }

    fn item_label(&self, item: Item) -> String {
        let Some(layout) = self.layout.as_ref() else {
            return "all devices".into();
        };
        match item {
            Item::All => "all devices".into(),
            Item::Node(i) => layout
                .graph
                .nodes
                .get(i)
                .map_or_else(String::new, |n| {
                    let rate = self.snapshot.device_rate(&n.id);
                    format!("{:<12} {}", n.id, rate.format_in())
                }),
            Item::Link(i) => layout.graph.links.get(i).map_or_else(String::new, |l| {
                format!(
                    "{}:{} ↔ {}:{}",
                    l.source, l.source_interface, l.target, l.target_interface
                )
            }),
        }
    }

    fn link_highlighted(&self, link: &TopologyLink) -> bool {
        self.snapshot.selection == Selection::link(link)
    }

    fn link_color(&self, index: usize, link: &TopologyLink) -> Color {
        if self.items.get(self.cursor) == Some(&Item::Link(index)) {
            theme::ACCENT
        } else if self.link_highlighted(link) {
            theme::YELLOW
        } else {
            theme::MUTED
        }
    }

    fn paint(&self, ctx: &mut Context<'_>, layout: &TopologyLayout, sim: &ForceLayout) {
        for (i, (link, offset)) in layout.links().enumerate() {
            let (Some(from), Some(to)) = (sim.position(&link.source), sim.position(&link.target))
            else {
                continue;
            };
            let ctrl = offset.control_point(from, to);
            let color = self.link_color(i, link);
            let mut prev = from;
            for step in 1..=CURVE_SEGMENTS {
                let next = quadratic_point(from, ctrl, to, f64::from(step) / f64::from(CURVE_SEGMENTS));
                ctx.draw(&CanvasLine {
                    x1: prev.0,
                    y1: prev.1,
                    x2: next.0,
                    y2: next.1,
                    color,
                });
                prev = next;
            }
        }

        ctx.layer();
        let radius = layout.force.collision_radius / 3.0;
        // Group colours follow first appearance.
        let mut groups: Vec<&str> = Vec::new();
        for g in layout.graph.nodes.iter().filter_map(|n| n.group.as_deref()) {
            if !groups.contains(&g) {
                groups.push(g);
            }
        }
        for (i, node) in layout.graph.nodes.iter().enumerate() {
            let Some((x, y)) = sim.position(&node.id) else {
                continue;
            };
            let group = node
                .group
                .as_deref()
                .and_then(|g| groups.iter().position(|&known| known == g))
                .unwrap_or(0);
            let color = if self.items.get(self.cursor) == Some(&Item::Node(i)) {
                theme::ACCENT
            } else if self.snapshot.unreachable.contains(&node.id) {
                theme::RED
            } else {
                theme::group_color(group)
            };
            ctx.draw(&Circle {
                x,
                y,
                radius,
                color,
            });
            ctx.print(
                x + radius,
                y + radius,
                Span::styled(node.id.clone(), Style::default().fg(color)),
            );
        }
    }

    fn render_canvas(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(" Topology ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border(self.focused));

        let (Some(layout), Some(sim)) = (self.layout.as_deref(), self.sim.as_ref()) else {
            let inner = block.inner(area);
            frame.render_widget(block, area);
            frame.render_widget(
                Paragraph::new("  Waiting for topology…").style(theme::key_hint()),
                inner,
            );
            return;
        };

        let (x0, y0, x1, y1) = sim.bounds().unwrap_or((-100.0, -100.0, 100.0, 100.0));
        let canvas = Canvas::default()
            .block(block)
            .x_bounds([x0, x1])
            .y_bounds([y0, y1])
            .paint(|ctx| self.paint(ctx, layout, sim));
        frame.render_widget(canvas, area);
    }

    fn render_inspector(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(" Inspect ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border(self.focused));

        let items: Vec<ListItem> = self
            .items
            .iter()
            .map(|&item| {
                let active = self.selection_for(item).as_ref() == Some(&self.snapshot.selection);
                let marker = if active { "● " } else { "  " };
                ListItem::new(format!("{marker}{}", self.item_label(item)))
            })
            .collect();

        let mut state = ListState::default().with_selected(Some(self.cursor));
        let list = List::new(items)
            .block(block)
            .style(theme::table_row())
            .highlight_style(theme::table_selected());
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_detail(&self, frame: &mut Frame, area: Rect) {
        let mut lines = vec![Line::from(Span::styled(
            format!(" tracking {}", self.snapshot.selection),
            theme::key_hint(),
        ))];
        if let (Some(Item::Link(i)), Some(layout)) = (self.items.get(self.cursor), &self.layout) {
            if let Some(link) = layout.graph.links.get(*i) {
                for (dev, iface) in [
                    (&link.source, &link.source_interface),
                    (&link.target, &link.target_interface),
                ] {
                    let rate = self
                        .snapshot
                        .interface(&InterfaceKey::new(dev.as_str(), iface.as_str()))
                        .and_then(|v| v.rate);
                    lines.push(Line::from(vec![
                        Span::styled(format!(" {dev}:{iface} "), theme::table_row()),
                        Span::styled(
                            rate.map_or_else(|| "-".into(), |r| format!("↓{}", r.format_in())),
                            Style::default().fg(theme::RATE_IN),
                        ),
                        Span::raw(" "),
                        Span::styled(
                            rate.map_or_else(String::new, |r| format!("↑{}", r.format_out())),
                            Style::default().fg(theme::RATE_OUT),
                        ),
                    ]));
                }
            }
        }
        lines.push(Line::from(vec![
            Span::styled(" ↑↓", theme::key_hint_key()),
            Span::styled(" move  ", theme::key_hint()),
            Span::styled("Enter", theme::key_hint_key()),
            Span::styled(" select  ", theme::key_hint()),
            Span::styled("r", theme::key_hint_key()),
            Span::styled(" relayout", theme::key_hint()),
        ]));
        frame.render_widget(Paragraph::new(lines), area);
    }
}

impl Component for TopologyScreen {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => {
                self.cursor = (self.cursor + 1).min(self.items.len().saturating_sub(1));
                Ok(None)
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.cursor = self.cursor.saturating_sub(1);
                Ok(None)
            }
            KeyCode::Enter => Ok(self
                .items
                .get(self.cursor)
                .and_then(|&item| self.selection_for(item))
                .map(|sel| Action::Execute(Command::Select(sel)))),
            KeyCode::Char('r') => {
                if let Some(sim) = self.sim.as_mut() {
                    sim.reheat();
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        match action {
            Action::TopologyLoaded(layout) => self.load(Arc::clone(layout)),
            Action::SnapshotUpdated(snap) => self.snapshot = Arc::clone(snap),
            Action::Tick => {
                if let Some(sim) = self.sim.as_mut() {
                    for _ in 0..STEPS_PER_TICK {
                        if !sim.tick() {
                            break;
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let [canvas_area, side] =
            Layout::horizontal([Constraint::Min(40), Constraint::Length(40)]).areas(area);
        let [list_area, detail_area] =
            Layout::vertical([Constraint::Min(5), Constraint::Length(5)]).areas(side);

        self.render_canvas(frame, canvas_area);
        self.render_inspector(frame, list_area);
        self.render_detail(frame, detail_area);
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
    use ndtviz_core::{LayoutConfig, TopologyGraph, TopologyNode};

    fn graph() -> TopologyGraph {
        let node = |id: &str| TopologyNode {
            id: id.into(),
            group: None,
            image: None,
            kind: None,
            extra: Default::default(),
        };
        TopologyGraph {
            nodes: vec![node("leaf1"), node("spine1")],
            links: vec![TopologyLink {
                source: "leaf1".into(),
                source_interface: "e1-1".into(),
                target: "spine1".into(),
                target_interface: "e1-49".into(),
            }],
        }
    }

    fn loaded() -> TopologyScreen {
        let mut screen = TopologyScreen::new();
        let layout = TopologyLayout::resolve(graph(), &LayoutConfig::default());
        screen
            .update(&Action::TopologyLoaded(Arc::new(layout)))
            .unwrap();
        screen
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn curve_endpoints_and_midpoint() {
        let (from, ctrl, to) = ((0.0, 0.0), (5.0, 10.0), (10.0, 0.0));
        assert_eq!(quadratic_point(from, ctrl, to, 0.0), from);
        assert_eq!(quadratic_point(from, ctrl, to, 1.0), to);
        assert_eq!(quadratic_point(from, ctrl, to, 0.5), (5.0, 5.0));
    }

    #[test]
    fn items_list_all_nodes_then_links() {
        let screen = loaded();
        assert_eq!(
            screen.items,
            vec![Item::All, Item::Node(0), Item::Node(1), Item::Link(0)]
        );
    }

    #[test]
    fn enter_selects_focused_link() {
        let mut screen = loaded();
        for _ in 0..3 {
            screen.handle_key_event(key(KeyCode::Down)).unwrap();
        }
        let action = screen.handle_key_event(key(KeyCode::Enter)).unwrap();
        let Some(Action::Execute(Command::Select(sel))) = action else {
            panic!("expected a select command, got {action:?}");
        };
        assert_eq!(sel, Selection::link(&graph().links[0]));
    }

    #[test]
    fn cursor_is_clamped() {
        let mut screen = loaded();
        screen.handle_key_event(key(KeyCode::Up)).unwrap();
        assert_eq!(screen.cursor, 0);
        for _ in 0..10 {
            screen.handle_key_event(key(KeyCode::Down)).unwrap();
        }
        assert_eq!(screen.cursor, 3);
    }

    #[test]
    fn enter_without_topology_does_nothing() {
        let mut screen = TopologyScreen::new();
        assert!(screen.handle_key_event(key(KeyCode::Enter)).unwrap().is_none());
    }
}
