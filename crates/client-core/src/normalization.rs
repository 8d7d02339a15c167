use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::types::RawTimestamp;

/// Seconds between the Unix epoch and 2001-01-01T00:00:00Z, the zero point
/// of the backend's second-resolution timestamp encoding.
pub const PLATFORM_EPOCH_OFFSET_SECS: i64 = 978_307_200;

/// Numeric values at or above this magnitude are epoch milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1_000_000_000_000.0;

/// Convert a raw backend timestamp into a canonical instant.
///
/// The backend hands back three encodings with no format tag: epoch
/// milliseconds, seconds since the platform epoch, and textual dates.
/// Returns `None` for empty or unparseable input; callers treat that as
/// "unknown time", never as a fatal error.
pub fn normalize_timestamp(raw: &RawTimestamp) -> Option<DateTime<Utc>> {
    match raw {
        RawTimestamp::Number(value) => from_numeric(*value),
        RawTimestamp::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            if let Ok(value) = trimmed.parse::<f64>() {
                return from_numeric(value);
            }
            parse_date_text(trimmed)
        }
    }
}

/// Millisecond form of [`normalize_timestamp`] for view code.
pub fn normalize_timestamp_ms(raw: Option<&RawTimestamp>) -> Option<i64> {
    raw.and_then(normalize_timestamp)
        .map(|instant| instant.timestamp_millis())
}

fn from_numeric(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }

    let magnitude = value.abs();
    if magnitude >= EPOCH_MILLIS_THRESHOLD {
        return from_millis(value);
    }
    if magnitude < PLATFORM_EPOCH_OFFSET_SECS as f64 {
        // A Unix-seconds reading would land before 2001, impossible for this
        // domain, so the value must be platform seconds.
        return from_platform_seconds(value);
    }

    // Ambiguous band: valid both as Unix seconds and as platform seconds.
    // Keep Unix seconds unless that reading lands before 2001.
    let tentative = from_millis(value * 1_000.0)?;
    if tentative.year() < 2001 {
        from_platform_seconds(value)
    } else {
        Some(tentative)
    }
}

fn from_platform_seconds(value: f64) -> Option<DateTime<Utc>> {
    from_millis((value + PLATFORM_EPOCH_OFFSET_SECS as f64) * 1_000.0)
}

fn from_millis(millis: f64) -> Option<DateTime<Utc>> {
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    Utc.timestamp_millis_opt(millis as i64).single()
}

fn parse_date_text(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}
