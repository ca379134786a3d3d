//! Serde types for everything the backend sends or accepts.
//!
//! The push channel carries JSON text frames shaped
//! `{"event": "<name>", "data": <payload>}`. [`FeedMessage::parse`] turns one
//! frame into a typed message; [`ControlIntent`] is the outbound direction.
//! Field names follow the producer (OpenConfig kebab-case counters,
//! `*_ms` cycle metadata).

use std::fmt::Display;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Error;

// ── Event names ──────────────────────────────────────────────────────

pub const EVENT_ROUTER_DATA: &str = "router_data";
pub const EVENT_CYCLE_STATS: &str = "timemachine_stats";
pub const EVENT_AVAILABLE_TIMESTAMPS: &str = "available_timestamps";
pub const EVENT_ERROR: &str = "error";

// ── Counter snapshot channel ─────────────────────────────────────────

/// Raw OpenConfig interface counters. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawCounters {
    #[serde(default, deserialize_with = "lenient_opt")]
    pub in_octets: Option<u64>,
    #[serde(default, deserialize_with = "lenient_opt")]
    pub out_octets: Option<u64>,
    #[serde(default, deserialize_with = "lenient_opt")]
    pub in_pkts: Option<u64>,
    #[serde(default, deserialize_with = "lenient_opt")]
    pub out_pkts: Option<u64>,
    #[serde(default, deserialize_with = "lenient_opt")]
    pub in_errors: Option<u64>,
    #[serde(default, deserialize_with = "lenient_opt")]
    pub out_errors: Option<u64>,
    #[serde(default, deserialize_with = "lenient_opt")]
    pub in_discards: Option<u64>,
    #[serde(default, deserialize_with = "lenient_opt")]
    pub out_discards: Option<u64>,
}

/// The `openconfig-interfaces:state` block of one interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInterfaceState {
    #[serde(default)]
    pub counters: Option<RawCounters>,
    /// Everything else the device reports (oper-status, mtu, ...).
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

/// One interface record inside a `router_data` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInterfaceRecord {
    /// Collection timestamp in the producer's time basis.
    #[serde(default, deserialize_with = "lenient_i64_opt")]
    pub timestamp: Option<i64>,
    #[serde(
        default,
        rename = "openconfig-interfaces:state",
        alias = "state"
    )]
    pub state: Option<RawInterfaceState>,
}

impl RawInterfaceRecord {
    /// Counters block, if the record carries one.
    pub fn counters(&self) -> Option<&RawCounters> {
        self.state.as_ref().and_then(|s| s.counters.as_ref())
    }
}

/// Interfaces of one device, keyed by interface name in producer order.
pub type RawDeviceInterfaces = IndexMap<String, RawInterfaceRecord>;

/// One counter-snapshot cycle: device id → interfaces, or `None` when
/// the device could not be polled this cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouterData {
    pub devices: IndexMap<String, Option<RawDeviceInterfaces>>,
}

// ── Cycle metadata channel ───────────────────────────────────────────

/// Cycle-level timing metadata. Sparse: any subset of fields may be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleStats {
    #[serde(default, alias = "deviation")]
    pub deviation_ms: Option<f64>,
    #[serde(default, deserialize_with = "lenient_i64_opt")]
    pub min_timestamp_ms: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64_opt")]
    pub cycle_starttime_ms: Option<i64>,
    /// End of collection for the cycle.
    #[serde(default, deserialize_with = "lenient_i64_opt")]
    pub general_timestamp_ms: Option<i64>,
    #[serde(default)]
    pub poll_duration_ms: Option<f64>,
    #[serde(default)]
    pub cycle_duration_ms: Option<f64>,
}

// ── Available timestamps channel ─────────────────────────────────────

/// The universe of timestamps the backend can replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableTimestamps {
    #[serde(default)]
    pub values: Vec<i64>,
}

/// Backend-side failure notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendError {
    #[serde(default)]
    pub message: String,
}

// ── FeedMessage ──────────────────────────────────────────────────────

/// A parsed inbound message from the push channel.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    RouterData(RouterData),
    CycleStats(CycleStats),
    AvailableTimestamps(AvailableTimestamps),
    BackendError(BackendError),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl FeedMessage {
    /// Name of the event this message arrived on.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::RouterData(_) => EVENT_ROUTER_DATA,
            Self::CycleStats(_) => EVENT_CYCLE_STATS,
            Self::AvailableTimestamps(_) => EVENT_AVAILABLE_TIMESTAMPS,
            Self::BackendError(_) => EVENT_ERROR,
        }
    }

    /// Parse one text frame.
    ///
    /// Returns `Ok(None)` for events this client does not consume, and an
    /// error when the frame or a known payload does not have the expected
    /// shape.
    pub fn parse(text: &str) -> Result<Option<Self>, Error> {
        let envelope: Envelope = serde_json::from_str(text).map_err(|e| deser(&e, text))?;

        let msg = match envelope.event.as_str() {
            EVENT_ROUTER_DATA => Self::RouterData(parse_router_data(envelope.data)?),
            EVENT_CYCLE_STATS => Self::CycleStats(from_value(envelope.data)?),
            EVENT_AVAILABLE_TIMESTAMPS => Self::AvailableTimestamps(from_value(envelope.data)?),
            EVENT_ERROR => Self::BackendError(from_value(envelope.data)?),
            _ => return Ok(None),
        };
        Ok(Some(msg))
    }
}

/// `router_data` arrives either as `{"value": "<json text>"}` or as the
/// payload object itself.
fn parse_router_data(data: serde_json::Value) -> Result<RouterData, Error> {
    match data {
        serde_json::Value::Object(ref obj) if obj.len() == 1 && obj.contains_key("value") => {
            match obj.get("value") {
                Some(serde_json::Value::String(inner)) => {
                    serde_json::from_str(inner).map_err(|e| deser(&e, inner))
                }
                Some(serde_json::Value::Null) => Ok(RouterData::default()),
                Some(other) => from_value(other.clone()),
                None => Ok(RouterData::default()),
            }
        }
        other => from_value(other),
    }
}

fn from_value<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, Error> {
    let body = value.to_string();
    serde_json::from_value(value).map_err(|e| deser(&e, &body))
}

fn deser(err: &serde_json::Error, body: &str) -> Error {
    Error::Deserialization {
        message: err.to_string(),
        body: body.to_owned(),
    }
}

// ── Outbound control intents ─────────────────────────────────────────

/// Operator intents sent back to the backend over the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ControlIntent {
    /// Enter (`true`) or leave (`false`) historical replay.
    #[serde(rename = "timemachine")]
    TimeMachine { time_machine_active: bool },
    /// Replay the cycle recorded at `timestamp`.
    #[serde(rename = "timestamp")]
    Seek { timestamp: i64 },
}

impl ControlIntent {
    pub fn to_frame(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: format!("{self:?}"),
        })
    }
}

// ── Topology ─────────────────────────────────────────────────────────

/// A node in the lab topology.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyNode {
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string_opt")]
    pub group: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    /// Remaining node properties (mgmt address, labels, ...).
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

/// A link between two node interfaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyLink {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub source_interface: String,
    #[serde(default)]
    pub target_interface: String,
}

/// Static node/link graph returned by the one-shot topology fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyGraph {
    #[serde(default)]
    pub nodes: Vec<TopologyNode>,
    #[serde(default)]
    pub links: Vec<TopologyLink>,
}

impl TopologyGraph {
    /// Interfaces `node` terminates, in link order.
    pub fn interfaces_of(&self, node: &str) -> Vec<&str> {
        self.links
            .iter()
            .filter_map(|l| {
                if l.source == node {
                    Some(l.source_interface.as_str())
                } else if l.target == node {
                    Some(l.target_interface.as_str())
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn node(&self, id: &str) -> Option<&TopologyNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

// ── Lenient scalar decoding ──────────────────────────────────────────
//
// gNMI JSON_IETF encodes 64-bit integers as strings, and some producers
// emit float epoch values. Accept both.

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrString<T> {
    Num(T),
    Str(String),
}

fn lenient_opt<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    match Option::<NumOrString<T>>::deserialize(d)? {
        None => Ok(None),
        Some(NumOrString::Num(v)) => Ok(Some(v)),
        Some(NumOrString::Str(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseInt {
    Int(i64),
    Float(f64),
    Str(String),
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn lenient_i64_opt<'de, D>(d: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<LooseInt>::deserialize(d)?;
    let float_to_int = |f: f64| -> Result<i64, D::Error> {
        if f.is_finite() {
            Ok(f.round() as i64)
        } else {
            Err(serde::de::Error::custom("non-finite timestamp"))
        }
    };
    match raw {
        None => Ok(None),
        Some(LooseInt::Int(v)) => Ok(Some(v)),
        Some(LooseInt::Float(f)) => float_to_int(f).map(Some),
        Some(LooseInt::Str(s)) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(v) => Ok(Some(v)),
                Err(_) => s
                    .parse::<f64>()
                    .map_err(serde::de::Error::custom)
                    .and_then(float_to_int)
                    .map(Some),
            }
        }
    }
}

/// Groups are strings in containerlab but plain numbers in some exports.
fn lenient_string_opt<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(d)? {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

// ── Tests ────────────────────────────────────────────────────────────
