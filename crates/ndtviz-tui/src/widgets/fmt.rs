//! Compact value formatting for tables and panels.

use ratatui::style::Color;

use crate::theme;

/// Milliseconds with no decimals, or "-" when unknown.
pub fn fmt_ms<T: Into<f64>>(value: Option<T>) -> String {
    value.map_or_else(|| "-".into(), |v| format!("{:.0} ms", v.into()))
}

/// Whole-millisecond values as they arrive from the wire.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn fmt_ms_i64(value: Option<i64>) -> String {
    fmt_ms(value.map(|v| v as f64))
}

/// Latency health colour: green under one second, yellow under five.
pub fn latency_color(ms: Option<i64>) -> Color {
    match ms {
        None => theme::MUTED,
        Some(v) if v < 1_000 => theme::GREEN,
        Some(v) if v < 5_000 => theme::YELLOW,
        Some(_) => theme::RED,
    }
}

/// Compact bit-rate label for chart axes: "950M", "1.2G".
pub fn fmt_rate_axis(bytes_per_sec: f64) -> String {
    let bits = bytes_per_sec * 8.0;
    if bits >= 1e9 {
        format!("{:.1}G", bits / 1e9)
    } else if bits >= 1e6 {
        format!("{:.0}M", bits / 1e6)
    } else if bits >= 1e3 {
        format!("{:.0}K", bits / 1e3)
    } else {
        format!("{bits:.0}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milliseconds() {
        assert_eq!(fmt_ms(Some(12.4)), "12 ms");
        assert_eq!(fmt_ms::<f64>(None), "-");
        assert_eq!(fmt_ms_i64(Some(1500)), "1500 ms");
    }

    #[test]
    fn latency_thresholds() {
        assert_eq!(latency_color(Some(999)), theme::GREEN);
        assert_eq!(latency_color(Some(1_000)), theme::YELLOW);
        assert_eq!(latency_color(Some(5_000)), theme::RED);
        assert_eq!(latency_color(None), theme::MUTED);
    }

    #[test]
    fn axis_labels() {
        assert_eq!(fmt_rate_axis(125_000_000.0), "1.0G");
        assert_eq!(fmt_rate_axis(1_250_000.0), "10M");
        assert_eq!(fmt_rate_axis(100.0), "800");
    }
}
