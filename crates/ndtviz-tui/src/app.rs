//! Application core: event loop, screen management, action dispatch.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Tabs},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use ndtviz_core::{Command, Controller, SessionSnapshot, TimeBasis};

use crate::action::{Action, Notification, NotificationLevel};
use crate::component::Component;
use crate::data_bridge::{spawn_command, spawn_data_bridge};
use crate::event::{Event, EventReader};
use crate::screen::ScreenId;
use crate::screens::create_screens;
use crate::theme;
use crate::tui::Tui;
use crate::widgets::time_bar::time_bar;

/// How long a toast stays on the status bar.
const NOTIFICATION_TTL: Duration = Duration::from_secs(4);

/// Connection status as seen by the TUI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Connected,
    Reconnecting(u32),
    Disconnected(String),
}

/// Top-level application state and event loop.
pub struct App {
    controller: Controller,
    /// Directory skew-log exports are written to.
    export_dir: PathBuf,
    seek_basis: TimeBasis,
    active_screen: ScreenId,
    screens: HashMap<ScreenId, Box<dyn Component>>,
    running: bool,
    connection_status: ConnectionStatus,
    help_visible: bool,
    notification: Option<(Notification, Instant)>,
    /// Latest session snapshot, for the status and time bars.
    snapshot: Arc<SessionSnapshot>,
    action_tx: mpsc::UnboundedSender<Action>,
    action_rx: mpsc::UnboundedReceiver<Action>,
}

impl App {
    pub fn new(controller: Controller, export_dir: PathBuf) -> Self {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let mut screens: HashMap<ScreenId, Box<dyn Component>> =
            create_screens().into_iter().collect();
        let active_screen = ScreenId::default();
        if let Some(screen) = screens.get_mut(&active_screen) {
            screen.set_focused(true);
        }

        Self {
            seek_basis: controller.config().seek_time_basis,
            controller,
            export_dir,
            active_screen,
            screens,
            running: true,
            connection_status: ConnectionStatus::default(),
            help_visible: false,
            notification: None,
            snapshot: Arc::default(),
            action_tx,
            action_rx,
        }
    }

    /// Run the main event loop until the operator quits.
    pub async fn run(&mut self) -> Result<()> {
        let mut tui = Tui::enter()?;
        let mut events = EventReader::new(
            Duration::from_millis(100), // 10 Hz simulation tick
            Duration::from_millis(33),  // ~30 FPS render
        );

        let cancel = CancellationToken::new();
        let bridge = tokio::spawn(spawn_data_bridge(
            self.controller.clone(),
            self.action_tx.clone(),
            cancel.clone(),
        ));

        let (w, h) = tui.size();
        info!(width = w, height = h, "TUI event loop started");

        while self.running {
            let Some(event) = events.next().await else {
                break;
            };

            match event {
                Event::Key(key) => {
                    if let Some(action) = self.handle_key_event(key)? {
                        self.action_tx.send(action)?;
                    }
                }
                Event::Resize(w, h) => self.action_tx.send(Action::Resize(w, h))?,
                Event::Tick => self.action_tx.send(Action::Tick)?,
                Event::Render => self.action_tx.send(Action::Render)?,
            }

            while let Ok(action) = self.action_rx.try_recv() {
                self.process_action(&action)?;
                if let Action::Render = action {
                    tui.draw(|frame| self.render(frame))?;
                }
            }
        }

        cancel.cancel();
        if let Err(e) = bridge.await {
            debug!(error = %e, "data bridge task ended abnormally");
        }
        info!("TUI event loop ended");
        Ok(())
    }

    /// Global keys first; everything else goes to the active screen.
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if self.help_visible {
            return match key.code {
                KeyCode::Esc | KeyCode::Char('?' | 'q') => Ok(Some(Action::ToggleHelp)),
                _ => Ok(None),
            };
        }

        let action = match (key.modifiers, key.code) {
            (KeyModifiers::CONTROL, KeyCode::Char('c'))
            | (KeyModifiers::NONE, KeyCode::Char('q')) => Some(Action::Quit),
            (_, KeyCode::Char('?')) => Some(Action::ToggleHelp),
            (_, KeyCode::Esc) if self.notification.is_some() => Some(Action::DismissNotification),

            (KeyModifiers::NONE, KeyCode::Char(c @ '1'..='3')) => c
                .to_digit(10)
                .and_then(|n| u8::try_from(n).ok())
                .and_then(ScreenId::from_number)
                .map(Action::SwitchScreen),
            (KeyModifiers::NONE, KeyCode::Tab) => {
                Some(Action::SwitchScreen(self.active_screen.next()))
            }
            (_, KeyCode::BackTab) => Some(Action::SwitchScreen(self.active_screen.prev())),

            // Time machine
            (KeyModifiers::NONE, KeyCode::Char('t')) => Some(Action::Execute(Command::ToggleLive)),
            (KeyModifiers::NONE, KeyCode::Char('[')) => {
                Some(Action::Execute(Command::StepBackward))
            }
            (KeyModifiers::NONE, KeyCode::Char(']')) => Some(Action::Execute(Command::StepForward)),

            (KeyModifiers::NONE, KeyCode::Char('e')) => {
                Some(Action::Execute(Command::ExportSkewLog {
                    dir: self.export_dir.clone(),
                }))
            }

            _ => None,
        };
        if action.is_some() {
            return Ok(action);
        }

        match self.screens.get_mut(&self.active_screen) {
            Some(screen) => screen.handle_key_event(key),
            None => Ok(None),
        }
    }

    fn process_action(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::Quit => self.running = false,

            Action::Resize(w, h) => debug!(width = w, height = h, "terminal resized"),
            Action::Render => {}

            Action::SwitchScreen(target) => {
                if *target != self.active_screen {
                    debug!("switching screen: {} → {}", self.active_screen, target);
                    if let Some(screen) = self.screens.get_mut(&self.active_screen) {
                        screen.set_focused(false);
                    }
                    self.active_screen = *target;
                    if let Some(screen) = self.screens.get_mut(&self.active_screen) {
                        screen.set_focused(true);
                    }
                }
            }

            Action::ToggleHelp => self.help_visible = !self.help_visible,

            Action::Connected => self.connection_status = ConnectionStatus::Connected,
            Action::Reconnecting(attempt) => {
                self.connection_status = ConnectionStatus::Reconnecting(*attempt);
            }
            Action::Disconnected(reason) => {
                self.connection_status = ConnectionStatus::Disconnected(reason.clone());
            }

            Action::Execute(command) => {
                debug!(?command, "executing");
                spawn_command(self.controller.clone(), command.clone(), self.action_tx.clone());
            }
            Action::Exported(path) => {
                self.notification = Some((
                    Notification::success(format!("skew log written to {}", path.display())),
                    Instant::now(),
                ));
            }
            Action::Notify(n) => self.notification = Some((n.clone(), Instant::now())),
            Action::DismissNotification => self.notification = None,

            // Data and ticks reach every screen so hidden ones stay current.
            Action::SnapshotUpdated(_) | Action::TopologyLoaded(_) | Action::Tick => {
                if let Action::SnapshotUpdated(snap) = action {
                    self.snapshot = Arc::clone(snap);
                }
                if let Action::Tick = action {
                    self.expire_notification();
                }
                for screen in self.screens.values_mut() {
                    if let Some(follow_up) = screen.update(action)? {
                        self.action_tx.send(follow_up)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn expire_notification(&mut self) {
        if self
            .notification
            .as_ref()
            .is_some_and(|(_, at)| at.elapsed() >= NOTIFICATION_TTL)
        {
            self.notification = None;
        }
    }

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();
        let [content, time, tabs, status] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(area);

        if let Some(screen) = self.screens.get(&self.active_screen) {
            screen.render(frame, content);
        }
        frame.render_widget(
            Paragraph::new(time_bar(&self.snapshot.time_travel, self.seek_basis)),
            time,
        );
        self.render_tab_bar(frame, tabs);
        self.render_status_bar(frame, status);

        if self.help_visible {
            render_help_overlay(frame, area);
        }
    }

    fn render_tab_bar(&self, frame: &mut Frame, area: Rect) {
        let titles: Vec<Line> = ScreenId::ALL
            .iter()
            .map(|&id| {
                Line::from(Span::styled(
                    format!(" {} {} ", id.number(), id.label()),
                    theme::tab(id == self.active_screen),
                ))
            })
            .collect();

        let tabs = Tabs::new(titles)
            .divider(Span::styled(" ", theme::key_hint()))
            .select(
                ScreenId::ALL
                    .iter()
                    .position(|&s| s == self.active_screen)
                    .unwrap_or(0),
            );
        frame.render_widget(tabs, area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let indicator = match &self.connection_status {
            ConnectionStatus::Connected => {
                Span::styled("● connected", Style::default().fg(theme::GREEN))
            }
            ConnectionStatus::Connecting => {
                Span::styled("◐ connecting", Style::default().fg(theme::YELLOW))
            }
            ConnectionStatus::Reconnecting(attempt) => Span::styled(
                format!("◐ reconnecting (attempt {attempt})"),
                Style::default().fg(theme::YELLOW),
            ),
            ConnectionStatus::Disconnected(reason) => Span::styled(
                format!("○ {reason}"),
                Style::default().fg(theme::RED),
            ),
        };

        let mut spans = vec![
            Span::raw(" "),
            indicator,
            Span::styled(
                format!(" │ {} cycles", self.snapshot.cycles),
                theme::key_hint(),
            ),
        ];
        if let Some(err) = &self.snapshot.last_backend_error {
            spans.push(Span::styled(
                format!(" │ backend: {err}"),
                Style::default().fg(theme::RED),
            ));
        }
        match &self.notification {
            Some((n, _)) => {
                let color = match n.level {
                    NotificationLevel::Info => theme::CYAN,
                    NotificationLevel::Success => theme::GREEN,
                    NotificationLevel::Error => theme::RED,
                };
                spans.push(Span::styled(
                    format!(" │ {}", n.message),
                    Style::default().fg(color),
                ));
            }
            None => spans.push(Span::styled(" │ ? help  q quit", theme::key_hint())),
        }

        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}

fn help_row(key: &'static str, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {key:<10}"), theme::key_hint_key()),
        Span::styled(what, theme::key_hint()),
    ])
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let width = 56u16.min(area.width.saturating_sub(4));
    let height = 21u16.min(area.height.saturating_sub(4));
    let help_area = Rect::new(
        area.x + area.width.saturating_sub(width) / 2,
        area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    );

    frame.render_widget(Clear, help_area);
    let block = Block::default()
        .title(" Keyboard Shortcuts ")
        .title_style(theme::title_style())
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(theme::border(true))
        .style(Style::default().bg(theme::BG_DARK));
    let inner = block.inner(help_area);
    frame.render_widget(block, help_area);

    let section = |name: &'static str| Line::from(Span::styled(name, theme::title_style()));
    let lines = vec![
        section("  Navigation"),
        help_row("1-3", "Jump to screen"),
        help_row("Tab", "Next screen"),
        help_row("j/k ↑/↓", "Move up/down"),
        help_row("Enter", "Track the focused device or link"),
        help_row("r", "Re-run topology layout"),
        help_row("c", "Cycle counter sparkline"),
        Line::default(),
        section("  Time machine"),
        help_row("t", "Toggle live / historical"),
        help_row("[ ]", "Step to older / newer snapshot"),
        Line::default(),
        section("  Global"),
        help_row("e", "Export clock-skew log"),
        help_row("Esc", "Dismiss notification"),
        help_row("?", "This help"),
        help_row("q", "Quit"),
    ];
    frame.render_widget(Paragraph::new(lines), inner);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ndtviz_core::DashboardConfig;
    use pretty_assertions::assert_eq;

    fn app() -> App {
        let config = DashboardConfig::for_backend("http://127.0.0.1:5000".parse().unwrap()).unwrap();
        let controller = Controller::new(config);
        App::new(controller, PathBuf::from("/tmp"))
    }

    fn press(app: &mut App, code: KeyCode) -> Option<Action> {
        app.handle_key_event(KeyEvent::new(code, KeyModifiers::NONE))
            .unwrap()
    }

    #[test]
    fn time_machine_keys_map_to_commands() {
        let mut app = app();
        assert!(matches!(
            press(&mut app, KeyCode::Char('t')),
            Some(Action::Execute(Command::ToggleLive))
        ));
        assert!(matches!(
            press(&mut app, KeyCode::Char('[')),
            Some(Action::Execute(Command::StepBackward))
        ));
        assert!(matches!(
            press(&mut app, KeyCode::Char(']')),
            Some(Action::Execute(Command::StepForward))
        ));
        let Some(Action::Execute(Command::ExportSkewLog { dir })) =
            press(&mut app, KeyCode::Char('e'))
        else {
            panic!("expected export command");
        };
        assert_eq!(dir, PathBuf::from("/tmp"));
    }

    #[test]
    fn help_swallows_keys() {
        let mut app = app();
        app.process_action(&Action::ToggleHelp).unwrap();
        assert!(press(&mut app, KeyCode::Char('t')).is_none());
        assert!(matches!(
            press(&mut app, KeyCode::Esc),
            Some(Action::ToggleHelp)
        ));
    }

    #[test]
    fn switching_screens_moves_focus() {
        let mut app = app();
        let Some(action) = press(&mut app, KeyCode::Char('3')) else {
            panic!("expected a screen switch");
        };
        app.process_action(&action).unwrap();
        assert_eq!(app.active_screen, ScreenId::Skew);
    }

    #[test]
    fn notifications_expire() {
        let mut app = app();
        app.notification = Some((
            Notification::info("hello"),
            Instant::now().checked_sub(NOTIFICATION_TTL).unwrap(),
        ));
        app.process_action(&Action::Tick).unwrap();
        assert!(app.notification.is_none());
    }
}
