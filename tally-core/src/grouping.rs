//! Ordering and grouping: filter by view mode, sort newest first, and
//! bucket by the viewer's calendar day.

use chrono::{Datelike, NaiveDate, TimeDelta};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::record::ExpenseRecord;
use crate::time::ViewClock;

/// Decimal places kept for currency totals.
pub const CURRENCY_SCALE: u32 = 2;

/// Which slice of history the caller wants to see.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
    Today,
    ThisWeek,
    ThisMonth,
    #[default]
    All,
}

impl FromStr for ViewMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "today" => Ok(ViewMode::Today),
            "week" | "this-week" => Ok(ViewMode::ThisWeek),
            "month" | "this-month" => Ok(ViewMode::ThisMonth),
            "all" => Ok(ViewMode::All),
            other => anyhow::bail!("unknown view mode: {other} (expected today, week, month or all)"),
        }
    }
}

impl ViewMode {
    /// Whether a record whose day key is `day` belongs in this view.
    ///
    /// Takes the same `effective_date` the grouping stage keys on, so the
    /// two stages cannot disagree about which day a record is on.
    pub fn includes(&self, day: NaiveDate, clock: &ViewClock) -> bool {
        let today = clock.today();
        match self {
            ViewMode::Today => day == today,
            ViewMode::ThisWeek => {
                let monday = today - TimeDelta::days(today.weekday().num_days_from_monday() as i64);
                day >= monday && day <= today
            }
            ViewMode::ThisMonth => {
                day.year() == today.year() && day.month() == today.month() && day <= today
            }
            ViewMode::All => true,
        }
    }
}

/// One calendar day's worth of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub key: String,
    /// Newest first
    pub records: Vec<ExpenseRecord>,
    pub total: Decimal,
    pub expanded: bool,
}

/// Day groups ordered newest day first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupedView {
    pub groups: Vec<DayGroup>,
}

impl GroupedView {
    pub fn get(&self, date: NaiveDate) -> Option<&DayGroup> {
        self.groups.iter().find(|g| g.date == date)
    }

    pub fn get_by_key(&self, key: &str) -> Option<&DayGroup> {
        self.groups.iter().find(|g| g.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.groups.iter().map(|g| g.records.len()).sum()
    }

    pub fn records(&self) -> impl Iterator<Item = &ExpenseRecord> {
        self.groups.iter().flat_map(|g| g.records.iter())
    }

    /// Sum over every group.
    pub fn total(&self) -> Decimal {
        sum_amounts(self.records().map(|r| r.amount))
    }

    /// Totals per canonical category.
    pub fn category_totals(&self) -> BTreeMap<String, Decimal> {
        let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
        for r in self.records() {
            let total = totals.entry(r.category.clone()).or_default();
            *total = total.saturating_add(r.amount);
        }
        for total in totals.values_mut() {
            *total = total.round_dp(CURRENCY_SCALE);
        }
        totals
    }
}

/// Exact decimal sum rounded to currency precision. Saturates instead of
/// overflowing.
pub fn sum_amounts(amounts: impl IntoIterator<Item = Decimal>) -> Decimal {
    amounts
        .into_iter()
        .fold(Decimal::ZERO, |acc, a| acc.saturating_add(a))
        .round_dp(CURRENCY_SCALE)
}

/// Keep only the records `mode` includes.
pub fn filter(records: Vec<ExpenseRecord>, mode: ViewMode, clock: &ViewClock) -> Vec<ExpenseRecord> {
    if mode == ViewMode::All {
        return records;
    }
    records
        .into_iter()
        .filter(|r| mode.includes(r.effective_date, clock))
        .collect()
}

/// Sort by effective date, then timestamp (both descending), and group by day.
pub fn group(mut records: Vec<ExpenseRecord>, clock: &ViewClock) -> GroupedView {
    records.sort_by(|a, b| {
        b.effective_date
            .cmp(&a.effective_date)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    });

    let today = clock.today();
    let mut groups: Vec<DayGroup> = Vec::new();
    for record in records {
        match groups.last_mut() {
            Some(g) if g.date == record.effective_date => g.records.push(record),
            _ => groups.push(DayGroup {
                date: record.effective_date,
                key: ViewClock::day_key(record.effective_date),
                expanded: record.effective_date == today,
                records: vec![record],
                total: Decimal::ZERO,
            }),
        }
    }

    for g in &mut groups {
        g.total = sum_amounts(g.records.iter().map(|r| r.amount));
    }

    GroupedView { groups }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordId;
    use chrono::{DateTime, TimeZone, Utc};

    fn clock() -> ViewClock {
        // Wednesday 2026-03-11, 15:00 UTC
        let now = Utc.with_ymd_and_hms(2026, 3, 11, 15, 0, 0).unwrap();
        ViewClock::for_timezone(now, "UTC").unwrap()
    }

    fn rec(id: &str, amount: Decimal, ts: DateTime<Utc>, day: NaiveDate) -> ExpenseRecord {
        ExpenseRecord {
            id: RecordId::External(id.to_string()),
            amount,
            title: id.to_string(),
            description: String::new(),
            category: "Meals".to_string(),
            original_category: None,
            date: Some(day),
            created_at: Some(ts),
            timestamp: ts,
            effective_date: day,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn test_group_total_is_exact() {
        let d = day(2);
        let ts = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let view = group(
            vec![
                rec("a", Decimal::from_str("19.99").unwrap(), ts, d),
                rec("b", Decimal::from_str("0.01").unwrap(), ts, d),
            ],
            &clock(),
        );
        let g = view.get(d).unwrap();
        assert_eq!(g.total, Decimal::from_str("20.00").unwrap());
        assert_eq!(g.total.to_string(), "20.00");
    }

    #[test]
    fn test_sum_saturates() {
        assert_eq!(sum_amounts([Decimal::MAX, Decimal::MAX]), Decimal::MAX);

        let d = day(2);
        let ts = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let view = group(
            vec![rec("a", Decimal::MAX, ts, d), rec("b", Decimal::MAX, ts, d)],
            &clock(),
        );
        assert_eq!(view.total(), Decimal::MAX);
        assert_eq!(view.category_totals().values().next(), Some(&Decimal::MAX));
    }

    #[test]
    fn test_two_level_sort() {
        // effective date was overridden on "late": its timestamp is older
        // than "early" but it belongs to the newer day
        let late = rec("late", Decimal::ONE, Utc.with_ymd_and_hms(2026, 3, 9, 8, 0, 0).unwrap(), day(11));
        let early = rec("early", Decimal::ONE, Utc.with_ymd_and_hms(2026, 3, 10, 23, 0, 0).unwrap(), day(10));
        let same_day_newer = rec("newer", Decimal::ONE, Utc.with_ymd_and_hms(2026, 3, 11, 9, 0, 0).unwrap(), day(11));

        let view = group(vec![early, late, same_day_newer], &clock());
        let keys: Vec<_> = view.groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, ["2026-03-11", "2026-03-10"]);
        let first: Vec<_> = view.groups[0].records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(first, ["newer", "late"]);
    }

    #[test]
    fn test_only_today_expanded() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 11, 9, 0, 0).unwrap();
        let view = group(vec![rec("a", Decimal::ONE, ts, day(11)), rec("b", Decimal::ONE, ts, day(4))], &clock());
        assert!(view.get(day(11)).unwrap().expanded);
        assert!(!view.get(day(4)).unwrap().expanded);
    }

    #[test]
    fn test_view_modes() {
        let clock = clock();
        assert!(ViewMode::Today.includes(day(11), &clock));
        assert!(!ViewMode::Today.includes(day(10), &clock));
        // week starts Monday the 9th
        assert!(ViewMode::ThisWeek.includes(day(9), &clock));
        assert!(!ViewMode::ThisWeek.includes(day(8), &clock));
        assert!(ViewMode::ThisMonth.includes(day(1), &clock));
        assert!(!ViewMode::ThisMonth.includes(NaiveDate::from_ymd_opt(2026, 2, 28).unwrap(), &clock));
        assert!(ViewMode::All.includes(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), &clock));
    }

    #[test]
    fn test_filter_uses_effective_date() {
        let clock = clock();
        let old_ts = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        // timestamp is old but effective date says today
        let moved = rec("moved", Decimal::ONE, old_ts, day(11));
        let stale = rec("stale", Decimal::ONE, old_ts, day(1));
        let out = filter(vec![moved, stale], ViewMode::Today, &clock);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "moved");
    }

    #[test]
    fn test_view_mode_parse() {
        assert_eq!("week".parse::<ViewMode>().unwrap(), ViewMode::ThisWeek);
        assert_eq!("Today".parse::<ViewMode>().unwrap(), ViewMode::Today);
        assert!("fortnight".parse::<ViewMode>().is_err());
    }

    #[test]
    fn test_category_totals_and_grand_total() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let mut travel = rec("t", Decimal::from_str("100.10").unwrap(), ts, day(2));
        travel.category = "Travel".to_string();
        let view = group(
            vec![
                travel,
                rec("a", Decimal::from_str("0.10").unwrap(), ts, day(3)),
                rec("b", Decimal::from_str("0.20").unwrap(), ts, day(3)),
            ],
            &clock(),
        );
        assert_eq!(view.total(), Decimal::from_str("100.40").unwrap());
        let totals = view.category_totals();
        assert_eq!(totals["Meals"], Decimal::from_str("0.30").unwrap());
        assert_eq!(totals["Travel"], Decimal::from_str("100.10").unwrap());
    }
}
