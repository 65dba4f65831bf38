//! Parsing of "last updated at" values coming from either store.
//!
//! Both stores hand us free-form strings. A value that cannot be parsed is
//! "no timestamp", never an error. Values without a zone are read as UTC so
//! that zoned and zone-less values stay comparable.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Zone-less ISO-8601 shapes accepted after the zoned (RFC 3339) attempt.
const NAIVE_ISO_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Common spreadsheet date-time formats.
const SHEET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M:%S"];

/// Common spreadsheet date-only formats.
const SHEET_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Date formats recognised when re-rendering a value as `MM-DD-YYYY`.
const US_DATE_INPUT_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d"];

/// Parses a "last updated at" value.
///
/// Accepts ISO-8601 with or without a zone suffix (`Z`, `+05:30`) and the
/// formats `%Y-%m-%d %H:%M:%S`, `%Y-%m-%d`, `%m/%d/%Y %H:%M:%S`, `%m/%d/%Y`.
/// Returns `None` for empty or unparsable input.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Some(dt) = parse_iso(value) {
        return Some(dt);
    }

    for fmt in SHEET_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }

    for fmt in SHEET_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return Some(date.and_time(NaiveTime::MIN).and_utc());
        }
    }

    None
}

/// Re-renders a date value as `MM-DD-YYYY`.
///
/// Values that are not recognised as a date are returned unchanged (trimmed).
#[must_use]
pub fn format_us_date(raw: &str) -> String {
    let value = raw.trim();
    if value.is_empty() {
        return String::new();
    }

    if let Some(dt) = parse_iso(value) {
        return dt.format("%m-%d-%Y").to_string();
    }

    for fmt in US_DATE_INPUT_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return date.format("%m-%d-%Y").to_string();
        }
    }

    value.to_string()
}

fn parse_iso(value: &str) -> Option<DateTime<Utc>> {
    if !value.contains('T') && !value.ends_with('Z') {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_ISO_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}
