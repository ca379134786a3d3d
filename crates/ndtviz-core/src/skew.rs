// ── Clock-skew tracking ──
//
// Cycle-level timing metadata arrives sparsely: each message may carry any
// subset of fields, and absent fields keep their previous value. Every
// ingest is stamped with the local receipt time and recorded in an
// unbounded log for export; deviation also feeds a bounded window.

use chrono::{DateTime, Utc};
use ndtviz_api::wire::CycleStats;
use serde::{Deserialize, Serialize};

use crate::store::{DEFAULT_WINDOW, RingBuffer};
use crate::units::epoch_millis;

/// Tracked cycle timing, in milliseconds. `None` until first reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClockSkewSample {
    /// Spread of device timestamps within the cycle.
    pub deviation_ms: Option<f64>,
    pub min_device_timestamp_ms: Option<i64>,
    pub cycle_start_ms: Option<i64>,
    pub collection_end_ms: Option<i64>,
    pub poll_duration_ms: Option<f64>,
    pub cycle_duration_ms: Option<f64>,
    /// Local arrival time of the message that produced this state.
    pub frontend_receipt_ms: Option<i64>,
}

impl ClockSkewSample {
    /// Receipt minus the slowest device's clock.
    pub fn min_timestamp_to_render_ms(&self) -> Option<i64> {
        latency(self.frontend_receipt_ms, self.min_device_timestamp_ms)
    }

    /// Receipt minus cycle initiation.
    pub fn cycle_start_to_render_ms(&self) -> Option<i64> {
        latency(self.frontend_receipt_ms, self.cycle_start_ms)
    }

    /// Overwrite every field present in `stats`; leave the rest.
    fn merge(&mut self, stats: &CycleStats) {
        if let Some(v) = stats.deviation_ms {
            self.deviation_ms = Some(v);
        }
        if let Some(v) = stats.min_timestamp_ms {
            self.min_device_timestamp_ms = Some(v);
        }
        if let Some(v) = stats.cycle_starttime_ms {
            self.cycle_start_ms = Some(v);
        }
        if let Some(v) = stats.general_timestamp_ms {
            self.collection_end_ms = Some(v);
        }
        if let Some(v) = stats.poll_duration_ms {
            self.poll_duration_ms = Some(v);
        }
        if let Some(v) = stats.cycle_duration_ms {
            self.cycle_duration_ms = Some(v);
        }
    }
}

fn latency(receipt: Option<i64>, origin: Option<i64>) -> Option<i64> {
    receipt?.checked_sub(origin?)
}

/// One exported row: tracked state after an ingest plus its derived
/// latencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SkewRecord {
    pub sample: ClockSkewSample,
    pub min_timestamp_to_render_ms: Option<i64>,
    pub cycle_start_to_render_ms: Option<i64>,
}

impl From<ClockSkewSample> for SkewRecord {
    fn from(sample: ClockSkewSample) -> Self {
        Self {
            min_timestamp_to_render_ms: sample.min_timestamp_to_render_ms(),
            cycle_start_to_render_ms: sample.cycle_start_to_render_ms(),
            sample,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClockSkewTracker {
    current: ClockSkewSample,
    deviation_history: RingBuffer<f64>,
    log: Vec<SkewRecord>,
}

impl Default for ClockSkewTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl ClockSkewTracker {
    pub fn new(window: usize) -> Self {
        Self {
            current: ClockSkewSample::default(),
            deviation_history: RingBuffer::new(window),
            log: Vec::new(),
        }
    }

    /// Ingest a cycle message received now.
    pub fn ingest(&mut self, stats: &CycleStats) -> SkewRecord {
        self.ingest_at(stats, Utc::now())
    }

    /// Ingest a cycle message received at `received_at`.
    pub fn ingest_at(&mut self, stats: &CycleStats, received_at: DateTime<Utc>) -> SkewRecord {
        self.current.frontend_receipt_ms = Some(epoch_millis(received_at));
        self.current.merge(stats);
        if let Some(deviation) = stats.deviation_ms {
            self.deviation_history.push(deviation);
        }

        let record = SkewRecord::from(self.current);
        self.log.push(record);
        record
    }

    pub fn current(&self) -> &ClockSkewSample {
        &self.current
    }

    /// Derived latencies for the current state.
    pub fn latest(&self) -> SkewRecord {
        SkewRecord::from(self.current)
    }

    pub fn deviation_history(&self) -> &RingBuffer<f64> {
        &self.deviation_history
    }

    /// Mean deviation over the window; `None` before any deviation arrived.
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn deviation_average(&self) -> Option<f64> {
        if self.deviation_history.is_empty() {
            return None;
        }
        let sum: f64 = self.deviation_history.iter().sum();
        Some(sum / self.deviation_history.len() as f64)
    }

    /// Every ingest since creation (not just the window).
    pub fn log(&self) -> &[SkewRecord] {
        &self.log
    }

    pub fn reset(&mut self) {
        self.current = ClockSkewSample::default();
        self.deviation_history.clear();
        self.log.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn sparse_fields_are_retained() {
        let mut tracker = ClockSkewTracker::new(120);
        tracker.ingest_at(
            &CycleStats {
                min_timestamp_ms: Some(1_000),
                cycle_starttime_ms: Some(900),
                poll_duration_ms: Some(40.0),
                ..CycleStats::default()
            },
            at(1_250),
        );
        let rec = tracker.ingest_at(
            &CycleStats {
                deviation_ms: Some(3.5),
                ..CycleStats::default()
            },
            at(2_000),
        );

        let cur = tracker.current();
        assert_eq!(cur.min_device_timestamp_ms, Some(1_000));
        assert_eq!(cur.cycle_start_ms, Some(900));
        assert_eq!(cur.poll_duration_ms, Some(40.0));
        assert_eq!(cur.deviation_ms, Some(3.5));
        assert_eq!(cur.frontend_receipt_ms, Some(2_000));
        assert_eq!(cur.collection_end_ms, None);

        // Recomputed from retained values with the new receipt stamp.
        assert_eq!(rec.min_timestamp_to_render_ms, Some(1_000));
        assert_eq!(rec.cycle_start_to_render_ms, Some(1_100));
    }

    #[test]
    fn deviation_window_only_grows_when_reported() {
        let mut tracker = ClockSkewTracker::new(2);
        assert_eq!(tracker.deviation_average(), None);

        tracker.ingest_at(&CycleStats { deviation_ms: Some(1.0), ..CycleStats::default() }, at(1));
        tracker.ingest_at(&CycleStats::default(), at(2));
        assert_eq!(tracker.deviation_history().len(), 1);

        tracker.ingest_at(&CycleStats { deviation_ms: Some(3.0), ..CycleStats::default() }, at(3));
        tracker.ingest_at(&CycleStats { deviation_ms: Some(5.0), ..CycleStats::default() }, at(4));
        assert_eq!(tracker.deviation_history().to_vec(), [3.0, 5.0]);
        assert_eq!(tracker.deviation_average(), Some(4.0));

        // Log keeps every ingest, window or not.
        assert_eq!(tracker.log().len(), 4);
    }

    #[test]
    fn identical_sample_differs_only_by_elapsed_time() {
        let stats = CycleStats {
            min_timestamp_ms: Some(10_000),
            cycle_starttime_ms: Some(9_000),
            ..CycleStats::default()
        };
        let mut tracker = ClockSkewTracker::new(120);
        let first = tracker.ingest_at(&stats, at(12_000));
        let second = tracker.ingest_at(&stats, at(12_000) + TimeDelta::milliseconds(37));

        assert_eq!(
            second.min_timestamp_to_render_ms.unwrap() - first.min_timestamp_to_render_ms.unwrap(),
            37
        );
        assert_eq!(
            second.cycle_start_to_render_ms.unwrap() - first.cycle_start_to_render_ms.unwrap(),
            37
        );
    }

    #[test]
    fn latencies_absent_until_origin_known() {
        let mut tracker = ClockSkewTracker::default();
        let rec = tracker.ingest_at(&CycleStats::default(), at(5));
        assert_eq!(rec.sample.frontend_receipt_ms, Some(5));
        assert_eq!(rec.min_timestamp_to_render_ms, None);
        assert_eq!(rec.cycle_start_to_render_ms, None);
    }

    #[test]
    fn reset_clears_log() {
        let mut tracker = ClockSkewTracker::default();
        tracker.ingest_at(&CycleStats { deviation_ms: Some(1.0), ..CycleStats::default() }, at(1));
        tracker.reset();
        assert!(tracker.log().is_empty());
        assert_eq!(tracker.current(), &ClockSkewSample::default());
    }
}
