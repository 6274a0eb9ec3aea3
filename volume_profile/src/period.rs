//! Calendar period keys and boundaries.
//!
//! - Session: one calendar day in the session time zone.
//! - Week: ISO week, Monday 00:00 start.
//! - Month / Quarter / Year / Decade: calendar units.
//!
//! All math happens on local calendar dates of the [`PeriodClock`]'s zone
//! (UTC unless configured otherwise); boundaries are converted back to UTC
//! seconds. A period is identified by its first local date.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum PeriodType {
    #[default]
    Session,
    Week,
    Month,
    Quarter,
    Year,
    Decade,
}

impl PeriodType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Session => "Session",
            Self::Week => "Week",
            Self::Month => "Month",
            Self::Quarter => "Quarter",
            Self::Year => "Year",
            Self::Decade => "Decade",
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Never fails: anything unrecognized is [`PeriodType::Session`].
impl FromStr for PeriodType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "week" | "weekly" | "w" => Self::Week,
            "month" | "monthly" | "m" => Self::Month,
            "quarter" | "quarterly" | "q" => Self::Quarter,
            "year" | "yearly" | "y" => Self::Year,
            "decade" => Self::Decade,
            _ => Self::Session,
        })
    }
}

impl From<String> for PeriodType {
    fn from(s: String) -> Self {
        let Ok(period) = s.parse();
        period
    }
}

impl From<PeriodType> for &'static str {
    fn from(period: PeriodType) -> Self {
        period.as_str()
    }
}

/// Half-open `[start_time, end_time)` in UTC seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeriodSpan {
    pub start_time: i64,
    pub end_time: i64,
}

/// Maps UTC timestamps onto calendar periods of one time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodClock {
    tz: Tz,
}

impl Default for PeriodClock {
    fn default() -> Self {
        Self::utc()
    }
}

impl PeriodClock {
    pub fn utc() -> Self {
        Self { tz: Tz::UTC }
    }

    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// First local date of the period holding `time`; `None` if `time` is
    /// outside chrono's representable range.
    pub fn key(&self, period: PeriodType, time: i64) -> Option<NaiveDate> {
        let local = DateTime::from_timestamp(time, 0)?.with_timezone(&self.tz);
        first_day(period, local.date_naive())
    }

    pub fn span(&self, period: PeriodType, time: i64) -> Option<PeriodSpan> {
        let key = self.key(period, time)?;
        self.span_of_key(period, key)
    }

    pub fn span_of_key(&self, period: PeriodType, key: NaiveDate) -> Option<PeriodSpan> {
        let next = next_first_day(period, key)?;
        Some(PeriodSpan {
            start_time: self.local_midnight(key)?,
            end_time: self.local_midnight(next)?,
        })
    }

    /// Local midnight of `date` in UTC seconds. A midnight skipped by a DST
    /// transition resolves to the first valid instant after it.
    fn local_midnight(&self, date: NaiveDate) -> Option<i64> {
        use chrono::offset::LocalResult;

        let mut naive: NaiveDateTime = date.and_hms_opt(0, 0, 0)?;
        for _ in 0..=120 {
            match self.tz.from_local_datetime(&naive) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
                    return Some(dt.with_timezone(&Utc).timestamp());
                }
                LocalResult::None => naive += chrono::Duration::minutes(1),
            }
        }
        None
    }
}

fn first_day(period: PeriodType, date: NaiveDate) -> Option<NaiveDate> {
    let year = date.year();
    match period {
        PeriodType::Session => Some(date),
        PeriodType::Week => date.checked_sub_days(Days::new(date.weekday().num_days_from_monday().into())),
        PeriodType::Month => NaiveDate::from_ymd_opt(year, date.month(), 1),
        PeriodType::Quarter => NaiveDate::from_ymd_opt(year, (date.month0() / 3) * 3 + 1, 1),
        PeriodType::Year => NaiveDate::from_ymd_opt(year, 1, 1),
        PeriodType::Decade => NaiveDate::from_ymd_opt(year.div_euclid(10) * 10, 1, 1),
    }
}

fn next_first_day(period: PeriodType, first: NaiveDate) -> Option<NaiveDate> {
    match period {
        PeriodType::Session => first.checked_add_days(Days::new(1)),
        PeriodType::Week => first.checked_add_days(Days::new(7)),
        PeriodType::Month => first.checked_add_months(chrono::Months::new(1)),
        PeriodType::Quarter => first.checked_add_months(chrono::Months::new(3)),
        PeriodType::Year => NaiveDate::from_ymd_opt(first.year() + 1, 1, 1),
        PeriodType::Decade => NaiveDate::from_ymd_opt(first.year() + 10, 1, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap().timestamp()
    }

    #[test]
    fn session_is_utc_day_by_default() {
        let clock = PeriodClock::utc();
        let span = clock.span(PeriodType::Session, ts(2024, 3, 5, 15)).unwrap();
        assert_eq!(span.start_time, ts(2024, 3, 5, 0));
        assert_eq!(span.end_time, ts(2024, 3, 6, 0));
    }

    #[test]
    fn week_starts_monday() {
        // 2024-03-07 is a Thursday
        let span = PeriodClock::utc().span(PeriodType::Week, ts(2024, 3, 7, 12)).unwrap();
        assert_eq!(span.start_time, ts(2024, 3, 4, 0));
        assert_eq!(span.end_time, ts(2024, 3, 11, 0));
    }

    #[test]
    fn calendar_units() {
        let clock = PeriodClock::utc();
        let t = ts(2024, 8, 19, 9);
        assert_eq!(clock.span(PeriodType::Month, t).unwrap().start_time, ts(2024, 8, 1, 0));
        assert_eq!(clock.span(PeriodType::Month, t).unwrap().end_time, ts(2024, 9, 1, 0));
        assert_eq!(clock.span(PeriodType::Quarter, t).unwrap().start_time, ts(2024, 7, 1, 0));
        assert_eq!(clock.span(PeriodType::Quarter, t).unwrap().end_time, ts(2024, 10, 1, 0));
        assert_eq!(clock.span(PeriodType::Year, t).unwrap().start_time, ts(2024, 1, 1, 0));
        assert_eq!(clock.span(PeriodType::Decade, t).unwrap().start_time, ts(2020, 1, 1, 0));
        assert_eq!(clock.span(PeriodType::Decade, t).unwrap().end_time, ts(2030, 1, 1, 0));
    }

    #[test]
    fn december_quarter_rolls_into_next_year() {
        let span = PeriodClock::utc().span(PeriodType::Quarter, ts(2023, 12, 31, 23)).unwrap();
        assert_eq!(span.start_time, ts(2023, 10, 1, 0));
        assert_eq!(span.end_time, ts(2024, 1, 1, 0));
    }

    #[test]
    fn session_follows_configured_zone() {
        let clock = PeriodClock::new(chrono_tz::America::New_York);
        // 2024-01-10 03:00Z is still Jan 9 in New York (UTC-5)
        let span = clock.span(PeriodType::Session, ts(2024, 1, 10, 3)).unwrap();
        assert_eq!(span.start_time, ts(2024, 1, 9, 5));
        assert_eq!(span.end_time, ts(2024, 1, 10, 5));
    }

    #[test]
    fn skipped_midnight_shifts_forward() {
        // Havana springs forward at 00:00 local on 2024-03-10
        let clock = PeriodClock::new(chrono_tz::America::Havana);
        let span = clock.span(PeriodType::Session, ts(2024, 3, 10, 12)).unwrap();
        assert_eq!(span.start_time, ts(2024, 3, 10, 5));
    }

    #[test]
    fn unknown_names_fall_back_to_session() {
        assert_eq!("Quarterly".parse::<PeriodType>(), Ok(PeriodType::Quarter));
        assert_eq!("fortnight".parse::<PeriodType>(), Ok(PeriodType::Session));
        assert_eq!(PeriodType::from(String::new()), PeriodType::Session);
    }
}
