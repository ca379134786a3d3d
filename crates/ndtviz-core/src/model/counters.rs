use std::fmt;

use ndtviz_api::wire::{RawCounters, RawInterfaceRecord};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::units::TimeBasis;

/// The eight OpenConfig interface counters.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CounterKind {
    InOctets,
    OutOctets,
    InPkts,
    OutPkts,
    InErrors,
    OutErrors,
    InDiscards,
    OutDiscards,
}

/// Interface counters at one instant. Absent wire fields read as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub in_octets: u64,
    pub out_octets: u64,
    pub in_pkts: u64,
    pub out_pkts: u64,
    pub in_errors: u64,
    pub out_errors: u64,
    pub in_discards: u64,
    pub out_discards: u64,
}

impl Counters {
    pub fn get(&self, kind: CounterKind) -> u64 {
        match kind {
            CounterKind::InOctets => self.in_octets,
            CounterKind::OutOctets => self.out_octets,
            CounterKind::InPkts => self.in_pkts,
            CounterKind::OutPkts => self.out_pkts,
            CounterKind::InErrors => self.in_errors,
            CounterKind::OutErrors => self.out_errors,
            CounterKind::InDiscards => self.in_discards,
            CounterKind::OutDiscards => self.out_discards,
        }
    }
}

impl From<&RawCounters> for Counters {
    fn from(raw: &RawCounters) -> Self {
        Self {
            in_octets: raw.in_octets.unwrap_or(0),
            out_octets: raw.out_octets.unwrap_or(0),
            in_pkts: raw.in_pkts.unwrap_or(0),
            out_pkts: raw.out_pkts.unwrap_or(0),
            in_errors: raw.in_errors.unwrap_or(0),
            out_errors: raw.out_errors.unwrap_or(0),
            in_discards: raw.in_discards.unwrap_or(0),
            out_discards: raw.out_discards.unwrap_or(0),
        }
    }
}

/// Identity of one interface on one device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InterfaceKey {
    pub device: String,
    pub interface: String,
}

impl InterfaceKey {
    pub fn new(device: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            interface: interface.into(),
        }
    }
}

impl fmt::Display for InterfaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.interface)
    }
}

/// One interface's counters at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    /// Interface name.
    pub name: String,
    /// Epoch nanoseconds.
    pub timestamp_ns: i64,
    pub counters: Counters,
}

impl CounterSnapshot {
    /// Build a snapshot from a wire record.
    ///
    /// The record timestamp is interpreted in `basis` and normalized to
    /// nanoseconds; a missing timestamp becomes `arrival_ns`. Returns `None`
    /// when the record has no counters block.
    pub fn from_record(
        name: &str,
        record: &RawInterfaceRecord,
        basis: TimeBasis,
        arrival_ns: i64,
    ) -> Option<Self> {
        let counters = Counters::from(record.counters()?);
        let timestamp_ns = record
            .timestamp
            .map_or(arrival_ns, |ts| basis.to_nanos(ts));
        Some(Self {
            name: name.to_owned(),
            timestamp_ns,
            counters,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn record(json: serde_json::Value) -> RawInterfaceRecord {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn missing_counters_default_to_zero() {
        let rec = record(serde_json::json!({
            "timestamp": 5,
            "openconfig-interfaces:state": { "counters": { "in-octets": 42 } }
        }));
        let snap = CounterSnapshot::from_record("e1-1", &rec, TimeBasis::Nanoseconds, 0).unwrap();
        assert_eq!(snap.name, "e1-1");
        assert_eq!(snap.timestamp_ns, 5);
        assert_eq!(snap.counters.in_octets, 42);
        assert_eq!(snap.counters.out_discards, 0);
    }

    #[test]
    fn timestamp_is_normalized_once() {
        let rec = record(serde_json::json!({
            "timestamp": 2,
            "state": { "counters": {} }
        }));
        let snap = CounterSnapshot::from_record("e1-1", &rec, TimeBasis::Seconds, 0).unwrap();
        assert_eq!(snap.timestamp_ns, 2_000_000_000);
    }

    #[test]
    fn missing_timestamp_uses_arrival() {
        let rec = record(serde_json::json!({ "state": { "counters": {} } }));
        let snap = CounterSnapshot::from_record("e1-1", &rec, TimeBasis::Seconds, 99).unwrap();
        assert_eq!(snap.timestamp_ns, 99);
    }

    #[test]
    fn record_without_counters_is_skipped() {
        let rec = record(serde_json::json!({ "timestamp": 1, "state": { "oper-status": "UP" } }));
        assert!(CounterSnapshot::from_record("mgmt0", &rec, TimeBasis::Nanoseconds, 0).is_none());
    }

    #[test]
    fn counter_kind_names_match_wire() {
        let names: Vec<String> = CounterKind::iter().map(|k| k.to_string()).collect();
        assert_eq!(names[0], "in-octets");
        assert_eq!(names[7], "out-discards");
        assert_eq!("in-pkts".parse::<CounterKind>().unwrap(), CounterKind::InPkts);

        let c = Counters {
            out_errors: 3,
            ..Counters::default()
        };
        assert_eq!(c.get(CounterKind::OutErrors), 3);
    }

    #[test]
    fn interface_key_display() {
        assert_eq!(InterfaceKey::new("srl1", "e1-1").to_string(), "srl1/e1-1");
    }
}
