//! Time utilities: the viewer's clock and local calendar-day helpers.
//!
//! Every stage that needs "now" or "today" takes a [`ViewClock`] instead of
//! reading the system clock, so a reconciliation pass is deterministic.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Day-key format shared by the filter and grouping stages.
pub const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// The viewer's current instant and IANA timezone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewClock {
    pub now: DateTime<Utc>,
    pub tz: Tz,
}

impl ViewClock {
    pub fn new(now: DateTime<Utc>, tz: Tz) -> Self {
        Self { now, tz }
    }

    /// Clock pinned to the current system time.
    pub fn system(tz: Tz) -> Self {
        Self::new(Utc::now(), tz)
    }

    /// Build a clock from an IANA timezone name like "America/Chicago".
    pub fn for_timezone(now: DateTime<Utc>, tz: &str) -> Result<Self> {
        Ok(Self::new(now, parse_timezone(tz)?))
    }

    /// The viewer's calendar day.
    pub fn today(&self) -> NaiveDate {
        self.local_date(self.now)
    }

    /// Calendar day of `instant` in the viewer's timezone.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    /// Hour component (0-23) of `instant` in the viewer's timezone.
    pub fn local_hour(&self, instant: DateTime<Utc>) -> u32 {
        instant.with_timezone(&self.tz).hour()
    }

    /// Start of `date` in the viewer's timezone, as UTC.
    ///
    /// Midnight can fall in a DST gap; the earliest valid mapping wins and
    /// a nonexistent local midnight is read as UTC midnight.
    pub fn local_midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        let ndt = date.and_time(NaiveTime::MIN);
        self.tz
            .from_local_datetime(&ndt)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&ndt))
    }

    /// Day key for `date` (`YYYY-MM-DD`).
    pub fn day_key(date: NaiveDate) -> String {
        date.format(DAY_KEY_FORMAT).to_string()
    }
}

pub fn parse_timezone(tz: &str) -> Result<Tz> {
    tz.parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chicago(y: i32, m: u32, d: u32, h: u32, min: u32) -> ViewClock {
        let now = Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap();
        ViewClock::for_timezone(now, "America/Chicago").unwrap()
    }

    #[test]
    fn test_today_west_of_utc() {
        // 03:30 UTC on the 21st is still the evening of the 20th in CST (UTC-6)
        let clock = chicago(2026, 2, 21, 3, 30);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 2, 20).unwrap());
        assert_eq!(clock.local_hour(clock.now), 21);
    }

    #[test]
    fn test_local_midnight() {
        let clock = chicago(2026, 2, 21, 12, 0);
        let midnight = clock.local_midnight(NaiveDate::from_ymd_opt(2026, 2, 20).unwrap());
        assert_eq!(midnight.to_rfc3339(), "2026-02-20T06:00:00+00:00");
    }

    #[test]
    fn test_invalid_timezone() {
        assert!(parse_timezone("Mars/Olympus").is_err());
    }

    #[test]
    fn test_day_key() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(ViewClock::day_key(d), "2026-03-07");
    }
}
