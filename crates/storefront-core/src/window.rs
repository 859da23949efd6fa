//! # Aggregation Windows
//!
//! Half-open time intervals that scope every analytics query.
//!
//! ## Calendar Alignment
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  days = 3, now = Oct 18 15:20 (reporting zone)                          │
//! │                                                                         │
//! │         previous window              current window                     │
//! │  ┌──────────────────────────┐┌──────────────────────────┐               │
//! │  │ Oct 13 │ Oct 14 │ Oct 15 ││ Oct 16 │ Oct 17 │ Oct 18 │               │
//! │  └──────────────────────────┘└──────────────────────────┘               │
//! │  ▲                           ▲                          ▲               │
//! │  prev.start          start = prev.end          end (midnight Oct 19)    │
//! │                                                                         │
//! │  • [start, end) is exactly `days` calendar days                        │
//! │  • the daily series has exactly `days` buckets                         │
//! │  • previous window is the same length, immediately before              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Calendar days are taken in a fixed [`ReportingZone`], never the ambient
//! zone of the host.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use std::fmt;

use crate::error::{CoreResult, ValidationError};

// =============================================================================
// Reporting Zone
// =============================================================================

/// The fixed UTC offset in which calendar days are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingZone(FixedOffset);

impl ReportingZone {
    /// UTC+00:00.
    pub fn utc() -> Self {
        ReportingZone(Utc.fix())
    }

    /// Creates a zone from an offset east of UTC in minutes (`-300` = UTC-05:00).
    pub fn from_offset_minutes(minutes: i32) -> CoreResult<Self> {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "utc_offset_minutes".to_string(),
                min: -(24 * 60 - 1),
                max: 24 * 60 - 1,
            })?;
        Ok(ReportingZone(offset))
    }

    #[inline]
    pub fn offset(&self) -> FixedOffset {
        self.0
    }

    /// Calendar date of `ts` in this zone.
    pub fn date_of(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.0).date_naive()
    }

    /// The UTC instant of local midnight at the start of `date`.
    pub fn midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        let local = date.and_time(NaiveTime::MIN);
        let utc = local - Duration::seconds(i64::from(self.0.local_minus_utc()));
        Utc.from_utc_datetime(&utc)
    }
}

impl Default for ReportingZone {
    fn default() -> Self {
        ReportingZone::utc()
    }
}

/// Renders as `+05:30` / `-03:00`.
impl fmt::Display for ReportingZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Aggregation Window
// =============================================================================

/// A half-open interval `[start, end)` of `days` calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    days: u32,
    zone: ReportingZone,
}

impl AggregationWindow {
    /// The `days` calendar days ending with the day containing `now`.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::{TimeZone, Utc};
    /// use storefront_core::window::{AggregationWindow, ReportingZone};
    ///
    /// let now = Utc.with_ymd_and_hms(2026, 10, 18, 15, 20, 0).unwrap();
    /// let window = AggregationWindow::ending_at(now, 7, ReportingZone::utc()).unwrap();
    ///
    /// assert_eq!(window.start(), Utc.with_ymd_and_hms(2026, 10, 12, 0, 0, 0).unwrap());
    /// assert_eq!(window.end(), Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap());
    /// assert!(window.contains(now));
    /// ```
    pub fn ending_at(now: DateTime<Utc>, days: u32, zone: ReportingZone) -> CoreResult<Self> {
        if days == 0 {
            return Err(ValidationError::MustBePositive {
                field: "days".to_string(),
            }
            .into());
        }

        let today = zone.date_of(now);
        let first_day = today - Duration::days(i64::from(days) - 1);
        let day_after = today + Duration::days(1);

        Ok(AggregationWindow {
            start: zone.midnight(first_day),
            end: zone.midnight(day_after),
            days,
            zone,
        })
    }

    /// The window of equal length immediately before this one.
    pub fn previous(&self) -> Self {
        let first_day = self.first_day() - Duration::days(i64::from(self.days));
        AggregationWindow {
            start: self.zone.midnight(first_day),
            end: self.start,
            days: self.days,
            zone: self.zone,
        }
    }

    #[inline]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Exclusive upper bound.
    #[inline]
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    #[inline]
    pub fn days(&self) -> u32 {
        self.days
    }

    #[inline]
    pub fn zone(&self) -> ReportingZone {
        self.zone
    }

    /// True when `start <= ts < end`.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }

    pub fn first_day(&self) -> NaiveDate {
        self.zone.date_of(self.start)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.first_day() + Duration::days(i64::from(self.days) - 1)
    }

    /// Every calendar day in the window, ascending.
    pub fn calendar_days(&self) -> impl Iterator<Item = NaiveDate> {
        self.first_day().iter_days().take(self.days as usize)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_window_is_calendar_aligned() {
        let window = AggregationWindow::ending_at(at(2026, 10, 18, 15, 20), 3, ReportingZone::utc())
            .unwrap();

        assert_eq!(window.start(), at(2026, 10, 16, 0, 0));
        assert_eq!(window.end(), at(2026, 10, 19, 0, 0));
        assert_eq!(window.days(), 3);

        let days: Vec<NaiveDate> = window.calendar_days().collect();
        assert_eq!(days.len(), 3);
        assert_eq!(days[0], NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());
        assert_eq!(days[2], window.last_day());
    }

    #[test]
    fn test_previous_window_is_adjacent() {
        let window = AggregationWindow::ending_at(at(2026, 3, 2, 9, 0), 7, ReportingZone::utc())
            .unwrap();
        let previous = window.previous();

        assert_eq!(previous.end(), window.start());
        assert_eq!(previous.days(), 7);
        assert_eq!(previous.end() - previous.start(), Duration::days(7));
        assert!(!previous.contains(window.start()));
        assert!(window.contains(window.start()));
        assert!(!window.contains(window.end()));
    }

    #[test]
    fn test_zone_shifts_day_boundaries() {
        // 02:00 UTC on Oct 18 is still Oct 17 at UTC-05:00
        let zone = ReportingZone::from_offset_minutes(-300).unwrap();
        let now = at(2026, 10, 18, 2, 0);
        assert_eq!(zone.date_of(now), NaiveDate::from_ymd_opt(2026, 10, 17).unwrap());

        let window = AggregationWindow::ending_at(now, 1, zone).unwrap();
        assert_eq!(window.start(), at(2026, 10, 17, 5, 0));
        assert_eq!(window.end(), at(2026, 10, 18, 5, 0));
        assert_eq!(zone.to_string(), "-05:00");
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(AggregationWindow::ending_at(Utc::now(), 0, ReportingZone::utc()).is_err());
        assert!(ReportingZone::from_offset_minutes(24 * 60).is_err());
        assert!(ReportingZone::from_offset_minutes(330).is_ok());
    }
}
