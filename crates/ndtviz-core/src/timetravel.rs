// ── Live / time-travel state machine ──
//
// LIVE follows the newest arriving cycle. HISTORICAL pins the display to an
// operator-chosen timestamp from the set the backend advertises. Every
// transition that the backend must know about yields a `ControlIntent`;
// out-of-range seeks and steps are silent no-ops.

use ndtviz_api::ControlIntent;
use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "UPPERCASE")]
pub enum TimeTravelMode {
    #[default]
    Live,
    Historical,
}

#[derive(Debug, Clone, Default)]
pub struct TimeTravelController {
    mode: TimeTravelMode,
    available: Vec<i64>,
    selected: Option<i64>,
}

impl TimeTravelController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> TimeTravelMode {
        self.mode
    }

    pub fn is_live(&self) -> bool {
        self.mode == TimeTravelMode::Live
    }

    /// Seekable timestamps, in the order the backend sent them.
    pub fn available(&self) -> &[i64] {
        &self.available
    }

    /// Explicit selection; always `None` while live.
    pub fn selected(&self) -> Option<i64> {
        self.selected
    }

    /// Timestamp the display should show: the selection when historical,
    /// the newest known timestamp when live.
    pub fn displayed(&self) -> Option<i64> {
        match self.mode {
            TimeTravelMode::Live => self.available.last().copied(),
            TimeTravelMode::Historical => self.selected,
        }
    }

    /// Replace the seekable set. An existing historical selection is kept
    /// even if the backend no longer lists it.
    pub fn set_available(&mut self, values: Vec<i64>) {
        self.available = values;
    }

    /// Flip between LIVE and HISTORICAL.
    ///
    /// Entering HISTORICAL pins the newest known timestamp; leaving it
    /// clears the selection.
    pub fn toggle(&mut self) -> ControlIntent {
        match self.mode {
            TimeTravelMode::Live => {
                self.mode = TimeTravelMode::Historical;
                self.selected = self.available.last().copied();
                ControlIntent::TimeMachine {
                    time_machine_active: true,
                }
            }
            TimeTravelMode::Historical => {
                self.mode = TimeTravelMode::Live;
                self.selected = None;
                ControlIntent::TimeMachine {
                    time_machine_active: false,
                }
            }
        }
    }

    /// Select any known timestamp. Ignored while live or for unknown values.
    pub fn seek(&mut self, timestamp: i64) -> Option<ControlIntent> {
        if self.is_live() || !self.available.contains(&timestamp) {
            return None;
        }
        Some(self.select(timestamp))
    }

    pub fn step_backward(&mut self) -> Option<ControlIntent> {
        let idx = self.selected_index()?;
        let target = *self.available.get(idx.checked_sub(1)?)?;
        Some(self.select(target))
    }

    pub fn step_forward(&mut self) -> Option<ControlIntent> {
        let idx = self.selected_index()?;
        let target = *self.available.get(idx + 1)?;
        Some(self.select(target))
    }

    fn selected_index(&self) -> Option<usize> {
        if self.is_live() {
            return None;
        }
        let current = self.selected?;
        self.available.iter().position(|&t| t == current)
    }

    fn select(&mut self, timestamp: i64) -> ControlIntent {
        self.selected = Some(timestamp);
        ControlIntent::Seek { timestamp }
    }
}
