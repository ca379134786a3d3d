// ── Time bases and rate units ──
//
// Snapshot timestamps are held internally in nanoseconds, cycle metadata in
// milliseconds. Producer units are declared by configuration and converted
// exactly once, where a wire record becomes a domain value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

pub const NANOS_PER_MILLI: i64 = 1_000_000;
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;
pub const MILLIS_PER_SECOND: i64 = 1_000;

const BITS_PER_BYTE: f64 = 8.0;
const BITS_PER_MEGABIT: f64 = 1e6;
const BITS_PER_GIGABIT: f64 = 1e9;

/// Unit a producer uses for an epoch timestamp.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TimeBasis {
    #[default]
    Nanoseconds,
    Milliseconds,
    Seconds,
}

impl TimeBasis {
    /// Nanoseconds in one unit of this basis.
    pub const fn nanos_per_unit(self) -> i64 {
        match self {
            Self::Nanoseconds => 1,
            Self::Milliseconds => NANOS_PER_MILLI,
            Self::Seconds => NANOS_PER_SECOND,
        }
    }

    /// Convert a value in this basis to nanoseconds, saturating at the
    /// `i64` range.
    pub const fn to_nanos(self, value: i64) -> i64 {
        value.saturating_mul(self.nanos_per_unit())
    }

    /// Interpret a value in this basis as a UTC instant.
    pub fn to_datetime(self, value: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.to_nanos(value))
    }
}

/// Nanosecond delta as fractional seconds.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn nanos_to_secs(delta_ns: i64) -> f64 {
    delta_ns as f64 / NANOS_PER_SECOND as f64
}

/// Wall-clock instant as epoch nanoseconds (saturating past year 2262).
pub fn epoch_nanos(at: DateTime<Utc>) -> i64 {
    at.timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// Wall-clock instant as epoch milliseconds.
pub fn epoch_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

// ── Rate units ───────────────────────────────────────────────────────

/// Display unit for a bit rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter)]
pub enum RateUnit {
    #[strum(serialize = "Mbit/s")]
    Mbps,
    #[strum(serialize = "Gbit/s")]
    Gbps,
}

impl RateUnit {
    /// Largest unit whose magnitude stays >= 1: Gbit/s once the rate
    /// reaches 1000 Mbit/s.
    pub fn for_mbps(mbps: f64) -> Self {
        if mbps.abs() >= 1000.0 { Self::Gbps } else { Self::Mbps }
    }

    /// Scale a byte rate into this unit.
    pub fn scale(self, bytes_per_sec: f64) -> f64 {
        match self {
            Self::Mbps => bytes_to_mbps(bytes_per_sec),
            Self::Gbps => bytes_to_gbps(bytes_per_sec),
        }
    }
}

pub fn bytes_to_mbps(bytes_per_sec: f64) -> f64 {
    bytes_per_sec * BITS_PER_BYTE / BITS_PER_MEGABIT
}

pub fn bytes_to_gbps(bytes_per_sec: f64) -> f64 {
    bytes_per_sec * BITS_PER_BYTE / BITS_PER_GIGABIT
}

/// Format a byte rate as a bit rate in the auto-selected unit, e.g.
/// `"12.34 Mbit/s"`.
pub fn format_bit_rate(bytes_per_sec: f64) -> String {
    let unit = RateUnit::for_mbps(bytes_to_mbps(bytes_per_sec));
    format!("{:.2} {unit}", unit.scale(bytes_per_sec))
}
