use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::constants::LATE_ARRIVAL_THRESHOLD_DAYS;

const ISO_OUTPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

// `%.f` also matches values without a fractional part
const NAIVE_INPUT_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Current UTC time as a naive ISO-8601 string, e.g. `2024-05-01T12:00:00.123456`.
pub fn current_timestamp() -> String {
    format_timestamp(Utc::now().naive_utc())
}

pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(ISO_OUTPUT_FORMAT).to_string()
}

/// Parses naive ISO date-times, RFC 3339 (normalized to UTC) and bare dates.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for format in NAIVE_INPUT_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// True when more than `threshold_days` whole days separate `record_time`
/// from now. Offset timestamps are compared in UTC. Unparsable timestamps
/// are never late.
pub fn is_late_arrival(record_time: &str, threshold_days: i64) -> bool {
    is_late_arrival_at(record_time, threshold_days, Utc::now().naive_utc())
}

pub fn is_late_arrival_at(record_time: &str, threshold_days: i64, now: NaiveDateTime) -> bool {
    match parse_timestamp(record_time) {
        Some(record_dt) => (now - record_dt).num_days() > threshold_days,
        None => false,
    }
}

/// Lateness check with the default seven-day threshold.
pub fn is_late_arrival_default(record_time: &str) -> bool {
    is_late_arrival(record_time, LATE_ARRIVAL_THRESHOLD_DAYS)
}
