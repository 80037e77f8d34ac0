//! Calendar periods used by the scheduled jobs and by the monthly reports.
//!
//! A [`Period`] is half-open internally (`[start, end_exclusive)`) so storage
//! queries never miss sub-millisecond timestamps; [`Period::end_of_day`] gives
//! the inclusive last instant handed to the gateway.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end_exclusive: DateTime<Utc>,
}

impl Period {
    /// The whole calendar month, first day 00:00 through last day end-of-day.
    pub fn month(year: i32, month: u32) -> ResultEngine<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| EngineError::InvalidPeriod(format!("{year}-{month:02}")))?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| EngineError::InvalidPeriod(format!("{year}-{month:02}")))?;

        Ok(Self {
            start: midnight(first),
            end_exclusive: midnight(next),
        })
    }

    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: midnight(date),
            end_exclusive: midnight(date) + Duration::days(1),
        }
    }

    /// The calendar day before `now`.
    pub fn previous_day(now: DateTime<Utc>) -> Self {
        Self::day(now.date_naive() - Duration::days(1))
    }

    /// The calendar month before `now`, as `(year, month)`.
    pub fn previous_month(now: DateTime<Utc>) -> (i32, u32) {
        if now.month() == 1 {
            (now.year() - 1, 12)
        } else {
            (now.year(), now.month() - 1)
        }
    }

    /// Inclusive last instant of the period (millisecond precision).
    pub fn end_of_day(&self) -> DateTime<Utc> {
        self.end_exclusive - Duration::milliseconds(1)
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_spans_first_to_last_day() {
        let p = Period::month(2024, 2).unwrap();
        assert_eq!(p.start, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(
            p.end_exclusive,
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(p.end_of_day().date_naive().to_string(), "2024-02-29");
    }

    #[test]
    fn december_rolls_into_next_year() {
        let p = Period::month(2025, 12).unwrap();
        assert_eq!(
            p.end_exclusive,
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn invalid_month_is_rejected() {
        assert!(matches!(
            Period::month(2025, 13),
            Err(EngineError::InvalidPeriod(_))
        ));
        assert!(Period::month(2025, 0).is_err());
    }

    #[test]
    fn previous_day_and_month() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 3, 0, 0).unwrap();
        let day = Period::previous_day(now);
        assert_eq!(day.start, Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap());
        assert_eq!(Period::previous_month(now), (2025, 12));

        let mid = Utc.with_ymd_and_hms(2025, 11, 15, 0, 0, 0).unwrap();
        assert_eq!(Period::previous_month(mid), (2025, 10));
    }
}
