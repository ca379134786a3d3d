// ── Telemetry session ──
//
// All engine state for one view session, advanced by one message at a time.
// `apply` is a plain state transition with no I/O, so it is tested without
// a socket; the controller task is the only caller at runtime.

use std::fmt;

use chrono::{DateTime, Utc};
use ndtviz_api::wire::{RawDeviceInterfaces, RouterData};
use ndtviz_api::{ControlIntent, FeedMessage, TopologyLink};
use serde::{Deserialize, Serialize};

use crate::model::{CounterKind, CounterSnapshot, InterfaceKey, RateAverage, TrafficRate};
use crate::rates::RateEngine;
use crate::skew::{ClockSkewSample, ClockSkewTracker, SkewRecord};
use crate::store::DEFAULT_WINDOW;
use crate::timetravel::{TimeTravelController, TimeTravelMode};
use crate::units::{TimeBasis, epoch_nanos};

// ── Selection ────────────────────────────────────────────────────────

/// Which interfaces the session tracks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selection {
    /// Every interface of every device.
    #[default]
    All,
    /// Every interface of one device.
    Device { device: String },
    /// The two endpoint interfaces of one link.
    Link {
        source: String,
        source_interface: String,
        target: String,
        target_interface: String,
    },
}

impl Selection {
    pub fn device(device: impl Into<String>) -> Self {
        Self::Device {
            device: device.into(),
        }
    }

    pub fn link(link: &TopologyLink) -> Self {
        Self::Link {
            source: link.source.clone(),
            source_interface: link.source_interface.clone(),
            target: link.target.clone(),
            target_interface: link.target_interface.clone(),
        }
    }

    pub fn includes_device(&self, device: &str) -> bool {
        match self {
            Self::All => true,
            Self::Device { device: d } => d == device,
            Self::Link { source, target, .. } => source == device || target == device,
        }
    }

    pub fn includes(&self, device: &str, interface: &str) -> bool {
        match self {
            Self::All => true,
            Self::Device { device: d } => d == device,
            Self::Link {
                source,
                source_interface,
                target,
                target_interface,
            } => {
                (source == device && source_interface == interface)
                    || (target == device && target_interface == interface)
            }
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all devices"),
            Self::Device { device } => write!(f, "device {device}"),
            Self::Link {
                source,
                source_interface,
                target,
                target_interface,
            } => write!(f, "link {source}:{source_interface} <-> {target}:{target_interface}"),
        }
    }
}

// ── Apply outcome ────────────────────────────────────────────────────

/// What a single message changed.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Counters {
        /// Interfaces observed under the current selection.
        interfaces: usize,
        /// How many of those produced a rate.
        rates: usize,
        unreachable: usize,
    },
    Skew(SkewRecord),
    Timestamps(usize),
    BackendError(String),
}

// ── TelemetrySession ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TelemetrySession {
    window: usize,
    basis: TimeBasis,
    selection: Selection,
    rates: RateEngine<InterfaceKey>,
    skew: ClockSkewTracker,
    time_travel: TimeTravelController,
    cycles: u64,
    last_cycle_at: Option<DateTime<Utc>>,
    devices: Vec<String>,
    unreachable: Vec<String>,
    last_backend_error: Option<String>,
}

impl Default for TelemetrySession {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, TimeBasis::default())
    }
}

impl TelemetrySession {
    /// `window` bounds every rolling series; `basis` is the producer's unit
    /// for snapshot timestamps.
    pub fn new(window: usize, basis: TimeBasis) -> Self {
        Self {
            window,
            basis,
            selection: Selection::All,
            rates: RateEngine::new(window),
            skew: ClockSkewTracker::new(window),
            time_travel: TimeTravelController::new(),
            cycles: 0,
            last_cycle_at: None,
            devices: Vec::new(),
            unreachable: Vec::new(),
            last_backend_error: None,
        }
    }

    // ── Message handling ─────────────────────────────────────────────

    /// Advance the session by one inbound message.
    pub fn apply(&mut self, msg: &FeedMessage, received_at: DateTime<Utc>) -> Applied {
        match msg {
            FeedMessage::RouterData(data) => self.apply_counters(data, received_at),
            FeedMessage::CycleStats(stats) => Applied::Skew(self.skew.ingest_at(stats, received_at)),
            FeedMessage::AvailableTimestamps(ts) => {
                self.time_travel.set_available(ts.values.clone());
                Applied::Timestamps(ts.values.len())
            }
            FeedMessage::BackendError(err) => {
                tracing::warn!(message = %err.message, "backend reported an error");
                self.last_backend_error = Some(err.message.clone());
                Applied::BackendError(err.message.clone())
            }
        }
    }

    fn apply_counters(&mut self, data: &RouterData, received_at: DateTime<Utc>) -> Applied {
        let arrival_ns = epoch_nanos(received_at);
        let mut interfaces = 0;
        let mut rates = 0;

        self.devices.clear();
        self.unreachable.clear();

        for (device, ifaces) in &data.devices {
            self.devices.push(device.clone());
            let Some(ifaces) = ifaces else {
                tracing::debug!(%device, "device unreachable this cycle");
                self.unreachable.push(device.clone());
                continue;
            };
            if !self.selection.includes_device(device) {
                continue;
            }
            let (seen, derived) = self.observe_device(device, ifaces, arrival_ns);
            interfaces += seen;
            rates += derived;
        }

        self.cycles += 1;
        self.last_cycle_at = Some(received_at);
        tracing::trace!(interfaces, rates, cycle = self.cycles, "counter cycle applied");

        Applied::Counters {
            interfaces,
            rates,
            unreachable: self.unreachable.len(),
        }
    }

    fn observe_device(
        &mut self,
        device: &str,
        ifaces: &RawDeviceInterfaces,
        arrival_ns: i64,
    ) -> (usize, usize) {
        let mut seen = 0;
        let mut derived = 0;
        for (name, record) in ifaces {
            if !self.selection.includes(device, name) {
                continue;
            }
            let Some(snapshot) = CounterSnapshot::from_record(name, record, self.basis, arrival_ns)
            else {
                continue;
            };
            seen += 1;
            if self
                .rates
                .observe(InterfaceKey::new(device, name.as_str()), snapshot)
                .is_some()
            {
                derived += 1;
            }
        }
        (seen, derived)
    }

    // ── Operator actions ─────────────────────────────────────────────

    /// Switch the tracked interfaces. A different selection discards the
    /// counter and rate histories; returns whether anything changed.
    pub fn select(&mut self, selection: Selection) -> bool {
        if selection == self.selection {
            return false;
        }
        tracing::debug!(%selection, "selection changed, rebuilding histories");
        self.selection = selection;
        self.rates = RateEngine::new(self.window);
        true
    }

    /// Run a time-travel transition and hand its intent to `deliver`.
    ///
    /// The transition is staged on a copy and only committed once `deliver`
    /// succeeds, so a failed send leaves mode and selection untouched.
    /// Returns `Ok(false)` when the transition was a no-op.
    pub fn travel<E>(
        &mut self,
        transition: impl FnOnce(&mut TimeTravelController) -> Option<ControlIntent>,
        deliver: impl FnOnce(ControlIntent) -> Result<(), E>,
    ) -> Result<bool, E> {
        let mut staged = self.time_travel.clone();
        let Some(intent) = transition(&mut staged) else {
            return Ok(false);
        };
        deliver(intent)?;
        self.time_travel = staged;
        Ok(true)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn rates(&self) -> &RateEngine<InterfaceKey> {
        &self.rates
    }

    pub fn skew(&self) -> &ClockSkewTracker {
        &self.skew
    }

    pub fn time_travel(&self) -> &TimeTravelController {
        &self.time_travel
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Immutable view of the session for publishing.
    pub fn snapshot(&self) -> SessionSnapshot {
        let interfaces = self
            .rates
            .keys()
            .filter_map(|key| {
                let latest = self.rates.latest_snapshot(key)?.clone();
                Some(InterfaceView {
                    key: key.clone(),
                    latest,
                    rate: self.rates.current(key),
                    average: self.rates.average(key),
                    rate_history: self.rates.rates().get(key).copied().collect(),
                    history: self.rates.snapshots().get(key).cloned().collect(),
                })
            })
            .collect();

        SessionSnapshot {
            selection: self.selection.clone(),
            cycles: self.cycles,
            last_cycle_at: self.last_cycle_at,
            devices: self.devices.clone(),
            unreachable: self.unreachable.clone(),
            interfaces,
            skew: SkewView {
                current: *self.skew.current(),
                latest: self.skew.latest(),
                deviation_history: self.skew.deviation_history().to_vec(),
                deviation_average: self.skew.deviation_average(),
                log_len: self.skew.log().len(),
            },
            time_travel: TimeTravelView {
                mode: self.time_travel.mode(),
                available: self.time_travel.available().to_vec(),
                selected: self.time_travel.selected(),
                displayed: self.time_travel.displayed(),
            },
            last_backend_error: self.last_backend_error.clone(),
        }
    }
}

// ── Snapshot views ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceView {
    pub key: InterfaceKey,
    pub latest: CounterSnapshot,
    /// Rate of the newest interval; `None` when it abstained.
    pub rate: Option<TrafficRate>,
    pub average: RateAverage,
    pub rate_history: Vec<TrafficRate>,
    #[serde(skip)]
    pub history: Vec<CounterSnapshot>,
}

impl InterfaceView {
    /// One counter across the retained snapshots, oldest first.
    pub fn series(&self, kind: CounterKind) -> Vec<u64> {
        self.history.iter().map(|s| s.counters.get(kind)).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SkewView {
    pub current: ClockSkewSample,
    pub latest: SkewRecord,
    pub deviation_history: Vec<f64>,
    pub deviation_average: Option<f64>,
    pub log_len: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimeTravelView {
    pub mode: TimeTravelMode,
    pub available: Vec<i64>,
    pub selected: Option<i64>,
    pub displayed: Option<i64>,
}

/// Point-in-time copy of a session, cheap to share behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub selection: Selection,
    pub cycles: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    /// Devices named in the latest counter cycle, in producer order.
    pub devices: Vec<String>,
    pub unreachable: Vec<String>,
    pub interfaces: Vec<InterfaceView>,
    pub skew: SkewView,
    pub time_travel: TimeTravelView,
    pub last_backend_error: Option<String>,
}

impl SessionSnapshot {
    pub fn interface(&self, key: &InterfaceKey) -> Option<&InterfaceView> {
        self.interfaces.iter().find(|v| &v.key == key)
    }

    pub fn device_interfaces<'a>(
        &'a self,
        device: &'a str,
    ) -> impl Iterator<Item = &'a InterfaceView> + 'a {
        self.interfaces.iter().filter(move |v| v.key.device == device)
    }

    /// Sum of the current interface rates of `device`.
    pub fn device_rate(&self, device: &str) -> TrafficRate {
        self.device_interfaces(device)
            .filter_map(|v| v.rate)
            .fold(TrafficRate::default(), |acc, r| TrafficRate {
                in_bytes_per_sec: acc.in_bytes_per_sec + r.in_bytes_per_sec,
                out_bytes_per_sec: acc.out_bytes_per_sec + r.out_bytes_per_sec,
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ndtviz_api::wire::{AvailableTimestamps, BackendError, CycleStats};
    use serde_json::json;

    const SECOND: i64 = 1_000_000_000;

    fn router_data(value: serde_json::Value) -> FeedMessage {
        FeedMessage::RouterData(serde_json::from_value(value).unwrap())
    }

    fn cycle(t: i64, octets: u64) -> FeedMessage {
        router_data(json!({
            "srl1": {
                "e1-1": { "timestamp": t, "state": { "counters": { "in-octets": octets, "out-octets": octets * 2 } } },
                "e1-2": { "timestamp": t, "state": { "counters": { "in-octets": 0 } } },
                "mgmt0": { "timestamp": t, "state": { "oper-status": "UP" } }
            },
            "srl2": {
                "e1-1": { "timestamp": t, "state": { "counters": { "out-octets": octets } } }
            },
            "srl3": null
        }))
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn counter_cycles_produce_rates() {
        let mut session = TelemetrySession::default();

        let first = session.apply(&cycle(SECOND, 1000), now());
        assert_eq!(
            first,
            Applied::Counters {
                interfaces: 3,
                rates: 0,
                unreachable: 1
            }
        );

        let second = session.apply(&cycle(2 * SECOND, 1500), now());
        assert_eq!(
            second,
            Applied::Counters {
                interfaces: 3,
                rates: 3,
                unreachable: 1
            }
        );

        let snap = session.snapshot();
        assert_eq!(snap.cycles, 2);
        assert_eq!(snap.devices, ["srl1", "srl2", "srl3"]);
        assert_eq!(snap.unreachable, ["srl3"]);

        let view = snap.interface(&InterfaceKey::new("srl1", "e1-1")).unwrap();
        let rate = view.rate.unwrap();
        assert!((rate.in_bytes_per_sec - 500.0).abs() < 1e-9);
        assert!((rate.out_bytes_per_sec - 1000.0).abs() < 1e-9);
        assert_eq!(view.series(CounterKind::InOctets), [1000, 1500]);

        let total = snap.device_rate("srl1");
        assert!((total.in_bytes_per_sec - 500.0).abs() < 1e-9);
    }

    #[test]
    fn device_selection_filters_and_resets() {
        let mut session = TelemetrySession::default();
        session.apply(&cycle(SECOND, 0), now());
        assert_eq!(session.rates().keys().count(), 3);

        assert!(session.select(Selection::device("srl2")));
        assert!(!session.select(Selection::device("srl2")));
        assert_eq!(session.rates().keys().count(), 0);

        session.apply(&cycle(2 * SECOND, 10), now());
        let keys: Vec<_> = session.rates().keys().map(ToString::to_string).collect();
        assert_eq!(keys, ["srl2/e1-1"]);
        // History was rebuilt, so one snapshot and no rate yet.
        assert!(session.snapshot().interfaces[0].rate.is_none());
    }

    #[test]
    fn link_selection_tracks_both_endpoints() {
        let mut session = TelemetrySession::default();
        session.select(Selection::link(&TopologyLink {
            source: "srl1".into(),
            source_interface: "e1-1".into(),
            target: "srl2".into(),
            target_interface: "e1-1".into(),
        }));
        session.apply(&cycle(SECOND, 0), now());
        let keys: Vec<_> = session.rates().keys().map(ToString::to_string).collect();
        assert_eq!(keys, ["srl1/e1-1", "srl2/e1-1"]);
    }

    #[test]
    fn skew_timestamps_and_errors() {
        let mut session = TelemetrySession::default();

        let applied = session.apply(
            &FeedMessage::CycleStats(CycleStats {
                min_timestamp_ms: Some(1_700_000_000_000 - 40),
                deviation_ms: Some(2.0),
                ..CycleStats::default()
            }),
            now(),
        );
        let Applied::Skew(rec) = applied else {
            panic!("expected skew record");
        };
        assert_eq!(rec.min_timestamp_to_render_ms, Some(40));

        session.apply(
            &FeedMessage::AvailableTimestamps(AvailableTimestamps {
                values: vec![10, 20, 30],
            }),
            now(),
        );
        let mut sent = Vec::new();
        let toggled = session.travel(
            |tt| Some(tt.toggle()),
            |intent| {
                sent.push(intent);
                Ok::<_, ()>(())
            },
        );
        assert_eq!(toggled, Ok(true));
        let stepped = session.travel(TimeTravelController::step_backward, |intent| {
            sent.push(intent);
            Ok::<_, ()>(())
        });
        assert_eq!(stepped, Ok(true));
        assert_eq!(
            sent,
            vec![
                ControlIntent::TimeMachine { time_machine_active: true },
                ControlIntent::Seek { timestamp: 20 },
            ]
        );

        session.apply(
            &FeedMessage::BackendError(BackendError {
                message: "poll failed".into(),
            }),
            now(),
        );

        let snap = session.snapshot();
        assert_eq!(snap.skew.log_len, 1);
        assert_eq!(snap.skew.deviation_average, Some(2.0));
        assert_eq!(snap.time_travel.mode, TimeTravelMode::Historical);
        assert_eq!(snap.time_travel.displayed, Some(20));
        assert_eq!(snap.last_backend_error.as_deref(), Some("poll failed"));
    }

    #[test]
    fn replayed_older_cycle_abstains() {
        let mut session = TelemetrySession::default();
        session.apply(&cycle(5 * SECOND, 100), now());
        session.apply(&cycle(6 * SECOND, 200), now());
        // Historical replay delivers an older cycle: no new rate.
        let applied = session.apply(&cycle(2 * SECOND, 50), now());
        assert!(matches!(applied, Applied::Counters { rates: 0, .. }));
        let key = InterfaceKey::new("srl1", "e1-1");
        assert_eq!(session.rates().rates().len_of(&key), 1);
    }

    #[test]
    fn failed_delivery_keeps_time_travel_state() {
        let mut session = TelemetrySession::default();
        session.apply(
            &FeedMessage::AvailableTimestamps(AvailableTimestamps {
                values: vec![10, 20, 30],
            }),
            now(),
        );

        let refused = session.travel(|tt| Some(tt.toggle()), |_| Err("feed closed"));
        assert_eq!(refused, Err("feed closed"));
        assert!(session.time_travel().is_live());
        assert_eq!(session.time_travel().selected(), None);

        assert_eq!(session.travel(|tt| Some(tt.toggle()), |_| Ok::<_, ()>(())), Ok(true));
        let refused = session.travel(TimeTravelController::step_backward, |_| Err("feed closed"));
        assert_eq!(refused, Err("feed closed"));
        assert_eq!(session.time_travel().selected(), Some(30));

        let idle = session.travel(TimeTravelController::step_forward, |_| Err("unreachable"));
        assert_eq!(idle, Ok(false));
    }

    #[test]
    fn selection_display() {
        assert_eq!(Selection::All.to_string(), "all devices");
        assert_eq!(Selection::device("r1").to_string(), "device r1");
    }
}
