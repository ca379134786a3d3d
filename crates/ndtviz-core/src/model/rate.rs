use serde::{Deserialize, Serialize};

use crate::units::{RateUnit, bytes_to_gbps, bytes_to_mbps, format_bit_rate};

/// Byte rates derived from two adjacent snapshots of one interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficRate {
    pub in_bytes_per_sec: f64,
    pub out_bytes_per_sec: f64,
}

impl TrafficRate {
    pub fn in_mbps(&self) -> f64 {
        bytes_to_mbps(self.in_bytes_per_sec)
    }

    pub fn out_mbps(&self) -> f64 {
        bytes_to_mbps(self.out_bytes_per_sec)
    }

    pub fn in_gbps(&self) -> f64 {
        bytes_to_gbps(self.in_bytes_per_sec)
    }

    pub fn out_gbps(&self) -> f64 {
        bytes_to_gbps(self.out_bytes_per_sec)
    }

    /// Unit for showing both directions side by side: picked from the
    /// larger of the two.
    pub fn display_unit(&self) -> RateUnit {
        RateUnit::for_mbps(self.in_mbps().max(self.out_mbps()))
    }

    pub fn format_in(&self) -> String {
        format_bit_rate(self.in_bytes_per_sec)
    }

    pub fn format_out(&self) -> String {
        format_bit_rate(self.out_bytes_per_sec)
    }
}

/// Moving average over a rate history.
///
/// All-zero with `samples == 0` means "no data", not a measured zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RateAverage {
    pub rate: TrafficRate,
    pub samples: usize,
}

impl RateAverage {
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn of<'a>(history: impl IntoIterator<Item = &'a TrafficRate>) -> Self {
        let mut sum = TrafficRate::default();
        let mut samples = 0_usize;
        for r in history {
            sum.in_bytes_per_sec += r.in_bytes_per_sec;
            sum.out_bytes_per_sec += r.out_bytes_per_sec;
            samples += 1;
        }
        if samples == 0 {
            return Self::default();
        }
        let n = samples as f64;
        Self {
            rate: TrafficRate {
                in_bytes_per_sec: sum.in_bytes_per_sec / n,
                out_bytes_per_sec: sum.out_bytes_per_sec / n,
            },
            samples,
        }
    }

    pub fn has_data(&self) -> bool {
        self.samples > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_views() {
        let r = TrafficRate {
            in_bytes_per_sec: 500.0,
            out_bytes_per_sec: 250_000_000.0,
        };
        assert!((r.in_mbps() - 0.004).abs() < 1e-12);
        assert!((r.out_gbps() - 2.0).abs() < 1e-12);
        assert_eq!(r.display_unit(), RateUnit::Gbps);
        assert_eq!(r.format_out(), "2.00 Gbit/s");
    }

    #[test]
    fn average_of_empty_is_no_data() {
        let avg = RateAverage::of(&[]);
        assert!(!avg.has_data());
        assert_eq!(avg.rate, TrafficRate::default());
    }

    #[test]
    fn average_of_history() {
        let hist = [
            TrafficRate {
                in_bytes_per_sec: 100.0,
                out_bytes_per_sec: 0.0,
            },
            TrafficRate {
                in_bytes_per_sec: 300.0,
                out_bytes_per_sec: 10.0,
            },
        ];
        let avg = RateAverage::of(&hist);
        assert_eq!(avg.samples, 2);
        assert!((avg.rate.in_bytes_per_sec - 200.0).abs() < f64::EPSILON);
        assert!((avg.rate.out_bytes_per_sec - 5.0).abs() < f64::EPSILON);
    }
}
