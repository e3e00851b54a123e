//! Date and timestamp parsing for both sources.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use tally_core::ViewClock;
use tracing::warn;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

// Offset-less timestamps are read as UTC.
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an RFC 3339, Postgres-style (`2026-02-18 15:04:05.123+00`) or
/// offset-less timestamp.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

/// Parse a calendar date. Full timestamps resolve to the viewer's local day.
pub fn parse_date(raw: &str, clock: &ViewClock) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| parse_timestamp(raw).map(|ts| clock.local_date(ts)))
}

/// Resolved date fields of one record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedDates {
    pub date: Option<NaiveDate>,
    pub created_at: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
    pub effective_date: NaiveDate,
}

/// Resolve a record's dates. An explicit date wins for the effective date;
/// the creation instant wins for the timestamp. Nothing usable means "now".
pub fn resolve(
    date_raw: Option<&str>,
    created_raw: Option<&str>,
    clock: &ViewClock,
    record_id: &str,
) -> ResolvedDates {
    let date = date_raw.and_then(|raw| {
        let parsed = parse_date(raw, clock);
        if parsed.is_none() {
            warn!(record = record_id, value = raw, "malformed date; ignoring");
        }
        parsed
    });
    let created_at = created_raw.and_then(|raw| {
        let parsed = parse_timestamp(raw);
        if parsed.is_none() {
            warn!(record = record_id, value = raw, "malformed created_at; ignoring");
        }
        parsed
    });

    match (date, created_at) {
        (None, None) => {
            warn!(record = record_id, "no usable date; falling back to now");
            ResolvedDates {
                date: None,
                created_at: None,
                timestamp: clock.now,
                effective_date: clock.today(),
            }
        }
        (date, created_at) => {
            let timestamp = created_at
                .or_else(|| date.map(|d| clock.local_midnight(d)))
                .unwrap_or(clock.now);
            let effective_date = date.unwrap_or_else(|| clock.local_date(timestamp));
            ResolvedDates {
                date,
                created_at,
                timestamp,
                effective_date,
            }
        }
    }
}
