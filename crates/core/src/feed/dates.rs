use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use tracing::debug;

use crate::config::DateFallback;

/// Layouts with an explicit offset, tried after RFC 2822 and RFC 3339.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%a, %d %b %Y %H:%M:%S %z"];

/// Layouts without an offset, taken as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Decode a feed publish date.
///
/// Order: Unix epoch seconds (fractional allowed), RFC 2822, RFC 3339,
/// a few offset layouts, then naive layouts as UTC.
pub fn parse_feed_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(secs) = s.parse::<f64>() {
        if secs.is_finite() {
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9) as u32;
            return DateTime::from_timestamp(whole as i64, nanos).map(|dt| dt.fixed_offset());
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().fixed_offset());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().fixed_offset());
    }

    debug!(date = %s, "Unrecognized feed date");
    None
}

/// Decode a publish date, never failing: undecodable input takes the fallback.
pub fn normalize_date(
    raw: Option<&str>,
    fallback: DateFallback,
    year: &str,
) -> DateTime<FixedOffset> {
    raw.and_then(parse_feed_date)
        .unwrap_or_else(|| fallback_date(fallback, year))
}

fn fallback_date(fallback: DateFallback, year: &str) -> DateTime<FixedOffset> {
    match fallback {
        DateFallback::Now => Utc::now().fixed_offset(),
        DateFallback::Epoch => year
            .parse::<i32>()
            .ok()
            .and_then(|y| Utc.with_ymd_and_hms(y, 1, 1, 0, 0, 0).single())
            .unwrap_or(DateTime::UNIX_EPOCH)
            .fixed_offset(),
    }
}
