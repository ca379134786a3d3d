// ── Domain model ──
//
// Typed counter snapshots and the values derived from them. Wire records
// from ndtviz-api are converted here, once, into canonical units.

pub mod counters;
pub mod rate;

pub use counters::{CounterKind, CounterSnapshot, Counters, InterfaceKey};
pub use rate::{RateAverage, TrafficRate};
