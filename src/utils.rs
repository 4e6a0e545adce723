//! # Formatting Helpers
//!
//! Small, allocation-light helpers used by the report writer and the console summary:
//! grouped number formatting, durations, timestamps, and HTML escaping.
//!
//! ```rust
//! use jmeter_sla_report::utils::*;
//! use std::time::Duration;
//!
//! assert_eq!(format_number(1234567), "1,234,567");
//! assert_eq!(format_decimal(1234.5), "1,234.50");
//! assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
//! assert_eq!(escape_html("<a & b>"), "&lt;a &amp; b&gt;");
//! ```

use chrono::{DateTime, Local, Utc};
use num_format::{Locale, ToFormattedString};
use std::time::Duration;

/// Layout used for every timestamp shown in the report.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format an integer with `,` as thousands separator.
pub fn format_number(value: u64) -> String {
    value.to_formatted_string(&Locale::en)
}

/// Format a float with two decimals and `,` as thousands separator.
///
/// Non-finite values render as `-`.
pub fn format_decimal(value: f64) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    let formatted = format!("{:.2}", value.abs());
    let (integer, fraction) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
    let sign = if value < 0.0 && formatted != "0.00" {
        "-"
    } else {
        ""
    };
    let grouped = integer
        .parse::<u128>()
        .map_or_else(|_| integer.to_string(), |n| n.to_formatted_string(&Locale::en));
    format!("{}{}.{}", sign, grouped, fraction)
}

/// Format a percentage with four decimals, e.g. `99.5000 %`.
pub fn format_percent(value: f64) -> String {
    format!("{:.4} %", value)
}

/// Format a duration in a human-readable way
///
/// Sub-second values are shown in milliseconds, values under a minute in seconds with
/// two decimals, and longer durations as compound minutes/hours.
///
/// ```rust
/// # use jmeter_sla_report::utils::format_duration;
/// # use std::time::Duration;
/// assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
/// assert_eq!(format_duration(Duration::from_millis(2500)), "2.50s");
/// assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms < 1_000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", total_ms as f64 / 1_000.0)
    } else {
        let seconds = duration.as_secs();
        let minutes = seconds / 60;
        let remaining_seconds = seconds % 60;

        if minutes < 60 {
            format!("{}m {}s", minutes, remaining_seconds)
        } else {
            let hours = minutes / 60;
            let remaining_minutes = minutes % 60;
            format!("{}h {}m {}s", hours, remaining_minutes, remaining_seconds)
        }
    }
}

/// Render an instant in the local time zone using [`TIME_FORMAT`].
pub fn format_time(time: &DateTime<Utc>) -> String {
    time.with_timezone(&Local).format(TIME_FORMAT).to_string()
}

/// Render an optional instant, `-` when absent.
pub fn format_optional_time(time: Option<&DateTime<Utc>>) -> String {
    time.map_or_else(|| "-".to_string(), format_time)
}

/// Escape text for use in HTML element content and attribute values.
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Number of logical CPU cores, as reported by `num_cpus`.
pub fn get_cpu_cores() -> usize {
    num_cpus::get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(0.0), "0.00");
        assert_eq!(format_decimal(12.345), "12.35");
        assert_eq!(format_decimal(1234567.891), "1,234,567.89");
        assert_eq!(format_decimal(-1500.0), "-1,500.00");
        assert_eq!(format_decimal(1e20), "100,000,000,000,000,000,000.00");
        assert_eq!(format_decimal(f64::NAN), "-");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(100.0), "100.0000 %");
        assert_eq!(format_percent(66.666666), "66.6667 %");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(0)), "0ms");
        assert_eq!(format_duration(Duration::from_millis(999)), "999ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(7322)), "2h 2m 2s");
    }

    #[test]
    fn test_format_time_uses_local_zone() {
        let time = Utc.timestamp_millis_opt(1_301_400_114_405).unwrap();
        let expected = time.with_timezone(&Local).format(TIME_FORMAT).to_string();
        assert_eq!(format_time(&time), expected);
        assert_eq!(format_optional_time(None), "-");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("plain"), "plain");
        assert_eq!(
            escape_html(r#"<script>alert("x & 'y'")</script>"#),
            "&lt;script&gt;alert(&quot;x &amp; &#39;y&#39;&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_get_cpu_cores() {
        assert!(get_cpu_cores() > 0);
    }
}
