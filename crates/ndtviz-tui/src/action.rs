//! All possible UI actions. Actions are the sole mechanism for state mutation.

use std::path::PathBuf;
use std::sync::Arc;

use ndtviz_core::{Command, SessionSnapshot, TopologyLayout};

use crate::screen::ScreenId;

/// Notification severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

/// A toast notification.
#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
}

impl Notification {
    pub fn success(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: NotificationLevel::Success,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: NotificationLevel::Error,
        }
    }

    pub fn info(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: NotificationLevel::Info,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    // ── Lifecycle ──────────────────────────────────────────────────
    Quit,
    Tick,
    Render,
    Resize(u16, u16),

    // ── Navigation ────────────────────────────────────────────────
    SwitchScreen(ScreenId),
    ToggleHelp,

    // ── Data events (from the data bridge) ────────────────────────
    SnapshotUpdated(Arc<SessionSnapshot>),
    TopologyLoaded(Arc<TopologyLayout>),

    // ── Connection status ─────────────────────────────────────────
    Connected,
    Disconnected(String),
    Reconnecting(u32),

    // ── Engine commands ───────────────────────────────────────────
    Execute(Command),
    Exported(PathBuf),

    // ── Notifications ─────────────────────────────────────────────
    Notify(Notification),
    DismissNotification,
}
