//! Temporal correction: move recently created records onto the viewer's
//! "today" when the source clock disagrees with the local day boundary.
//!
//! This is a compatibility shim with fixed windows, not a timezone
//! conversion. Rules run in order:
//!   1. external record whose timestamp is within `recent_external` -> today
//!   2. any record whose dated instant is within `recent_any` and not in
//!      the future -> today

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::record::ExpenseRecord;
use crate::time::ViewClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionPolicy {
    #[serde(default = "default_recent_external_hours")]
    pub recent_external_hours: i64,
    #[serde(default = "default_recent_any_days")]
    pub recent_any_days: i64,
}

fn default_recent_external_hours() -> i64 {
    24
}

fn default_recent_any_days() -> i64 {
    3
}

impl Default for CorrectionPolicy {
    fn default() -> Self {
        Self {
            recent_external_hours: default_recent_external_hours(),
            recent_any_days: default_recent_any_days(),
        }
    }
}

impl CorrectionPolicy {
    fn recent_external(&self) -> TimeDelta {
        TimeDelta::hours(self.recent_external_hours)
    }

    fn recent_any(&self) -> TimeDelta {
        TimeDelta::days(self.recent_any_days)
    }

    /// Apply both rules in place. Returns how many records moved.
    pub fn apply(&self, records: &mut [ExpenseRecord], clock: &ViewClock) -> usize {
        let today = clock.today();
        let mut moved = 0;

        for record in records.iter_mut() {
            let corrected = if record.is_external()
                && within(clock.now, record.timestamp, self.recent_external())
            {
                true
            } else {
                within(clock.now, dated_instant(record, clock), self.recent_any())
            };

            if corrected && record.effective_date != today {
                record.effective_date = today;
                moved += 1;
            }
        }

        moved
    }
}

/// `instant` is not in the future and less than `window` old.
fn within(now: DateTime<Utc>, instant: DateTime<Utc>, window: TimeDelta) -> bool {
    let age = now - instant;
    age >= TimeDelta::zero() && age < window
}

/// Instant the effective date was derived from: the explicit date's local
/// midnight when present, else the creation instant.
fn dated_instant(record: &ExpenseRecord, clock: &ViewClock) -> DateTime<Utc> {
    match record.date {
        Some(date) => clock.local_midnight(date),
        None => record.created_at.unwrap_or(record.timestamp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordId;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn clock() -> ViewClock {
        // 2026-02-20 20:00 in Chicago
        let now = Utc.with_ymd_and_hms(2026, 2, 21, 2, 0, 0).unwrap();
        ViewClock::for_timezone(now, "America/Chicago").unwrap()
    }

    fn record(id: RecordId, date: Option<NaiveDate>, created_at: Option<DateTime<Utc>>, clock: &ViewClock) -> ExpenseRecord {
        let timestamp = created_at
            .or_else(|| date.map(|d| clock.local_midnight(d)))
            .unwrap();
        let effective_date = date.unwrap_or_else(|| timestamp.date_naive());
        ExpenseRecord {
            id,
            amount: Decimal::new(1250, 2),
            title: "Lunch".to_string(),
            description: String::new(),
            category: "Meals".to_string(),
            original_category: None,
            date,
            created_at,
            timestamp,
            effective_date,
        }
    }

    #[test]
    fn test_recent_external_moves_to_today() {
        let clock = clock();
        // two hours ago, raw UTC date is the 21st
        let created = clock.now - TimeDelta::hours(2);
        let mut records = vec![record(RecordId::External("r1".into()), None, Some(created), &clock)];
        records[0].effective_date = NaiveDate::from_ymd_opt(2026, 2, 21).unwrap();

        let moved = CorrectionPolicy::default().apply(&mut records, &clock);
        assert_eq!(moved, 1);
        assert_eq!(records[0].effective_date, clock.today());
    }

    #[test]
    fn test_external_rule_uses_timestamp_over_date() {
        let clock = clock();
        let created = clock.now - TimeDelta::hours(20);
        let old_date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let mut records = vec![record(RecordId::External("r1".into()), Some(old_date), Some(created), &clock)];

        CorrectionPolicy::default().apply(&mut records, &clock);
        assert_eq!(records[0].effective_date, clock.today());
    }

    #[test]
    fn test_recent_any_source_moves_to_today() {
        let clock = clock();
        let two_days_ago = clock.today() - TimeDelta::days(2);
        let mut records = vec![record(RecordId::Relational(Uuid::nil()), Some(two_days_ago), None, &clock)];

        CorrectionPolicy::default().apply(&mut records, &clock);
        assert_eq!(records[0].effective_date, clock.today());
    }

    #[test]
    fn test_old_records_untouched() {
        let clock = clock();
        let last_month = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let mut records = vec![
            record(RecordId::Relational(Uuid::nil()), Some(last_month), None, &clock),
            record(RecordId::External("r2".into()), None, Some(clock.now - TimeDelta::days(10)), &clock),
        ];
        let moved = CorrectionPolicy::default().apply(&mut records, &clock);
        assert_eq!(moved, 0);
        assert_eq!(records[0].effective_date, last_month);
    }

    #[test]
    fn test_future_records_untouched() {
        let clock = clock();
        let next_week = clock.today() + TimeDelta::days(7);
        let mut records = vec![record(RecordId::Relational(Uuid::nil()), Some(next_week), None, &clock)];
        CorrectionPolicy::default().apply(&mut records, &clock);
        assert_eq!(records[0].effective_date, next_week);
    }

    #[test]
    fn test_custom_windows() {
        let clock = clock();
        let policy = CorrectionPolicy { recent_external_hours: 1, recent_any_days: 0 };
        let created = clock.now - TimeDelta::hours(2);
        let mut records = vec![record(RecordId::External("r1".into()), None, Some(created), &clock)];
        records[0].effective_date = NaiveDate::from_ymd_opt(2026, 2, 21).unwrap();
        assert_eq!(policy.apply(&mut records, &clock), 0);
    }
}
