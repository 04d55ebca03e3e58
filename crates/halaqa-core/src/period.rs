//! # Periods and Windows
//!
//! Period buckets carried by related records (KPI values, monitoring rows,
//! attendance weeks) and the evaluation windows metrics are restricted to.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

// =============================================================================
// PERIOD
// =============================================================================

/// The period a related record reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// Inclusive date range.
    Range { start: NaiveDate, end: NaiveDate },
    /// ISO week bucket.
    Week { year: i32, week: u32 },
    /// Whole calendar year.
    Year(i32),
}

impl Period {
    /// Inclusive calendar span of the period, if it denotes real dates.
    #[must_use]
    pub fn span(&self) -> Option<(NaiveDate, NaiveDate)> {
        match *self {
            Self::Range { start, end } => (start <= end).then_some((start, end)),
            Self::Week { year, week } => {
                let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?;
                let sunday = NaiveDate::from_isoywd_opt(year, week, Weekday::Sun)?;
                Some((monday, sunday))
            }
            Self::Year(year) => Some((
                NaiveDate::from_ymd_opt(year, 1, 1)?,
                NaiveDate::from_ymd_opt(year, 12, 31)?,
            )),
        }
    }

    /// Whether the period falls within the window.
    ///
    /// Ranges and years must lie fully inside. ISO weeks are placed by their
    /// Thursday, so a week straddling New Year belongs to exactly one year.
    #[must_use]
    pub fn within(&self, window: &Window) -> bool {
        match *self {
            Self::Week { year, week } => NaiveDate::from_isoywd_opt(year, week, Weekday::Thu)
                .is_some_and(|thursday| window.contains(thursday)),
            _ => self
                .span()
                .is_some_and(|(start, end)| window.contains(start) && window.contains(end)),
        }
    }
}

// =============================================================================
// WINDOW
// =============================================================================

/// Inclusive date window a metric is evaluated over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// January 1st to December 31st of `year`.
    #[must_use]
    pub fn calendar_year(year: i32) -> Option<Self> {
        Period::Year(year).span().map(|(start, end)| Self { start, end })
    }

    /// Monday to Sunday of the ISO week containing `date`.
    #[must_use]
    pub fn iso_week_of(date: NaiveDate) -> Self {
        let offset = i64::from(date.weekday().num_days_from_monday());
        let start = date - Duration::days(offset);
        Self {
            start,
            end: start + Duration::days(6),
        }
    }

    /// First to last day of the month containing `date`.
    #[must_use]
    pub fn month_of(date: NaiveDate) -> Self {
        let start = date.with_day(1).unwrap_or(date);
        let next = if date.month() == 12 {
            NaiveDate::from_ymd_opt(date.year().saturating_add(1), 1, 1)
        } else {
            NaiveDate::from_ymd_opt(date.year(), date.month().saturating_add(1), 1)
        };
        let end = next.and_then(|d| d.pred_opt()).unwrap_or(date);
        Self { start, end }
    }

    /// Inclusive containment. A window with `start > end` contains nothing.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// How a metric chooses its window at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum WindowSpec {
    /// Calendar year of the request context's date.
    #[default]
    CurrentYear,
    /// A fixed calendar year.
    Year { year: i32 },
    /// A fixed inclusive range.
    Range { start: NaiveDate, end: NaiveDate },
}

impl WindowSpec {
    /// Resolve against the request date. Never cached.
    #[must_use]
    pub fn resolve(&self, today: NaiveDate) -> Option<Window> {
        match *self {
            Self::CurrentYear => Window::calendar_year(today.year()),
            Self::Year { year } => Window::calendar_year(year),
            Self::Range { start, end } => Some(Window::new(start, end)),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap_or_default()
    }

    #[test]
    fn range_must_lie_inside_window() {
        let year = Window::calendar_year(2026);
        assert!(year.is_some());
        let year = year.unwrap_or(Window::new(d(2026, 1, 1), d(2026, 12, 31)));

        let inside = Period::Range { start: d(2026, 2, 1), end: d(2026, 2, 28) };
        let straddling = Period::Range { start: d(2025, 12, 20), end: d(2026, 1, 10) };
        assert!(inside.within(&year));
        assert!(!straddling.within(&year));
    }

    #[test]
    fn inverted_range_is_never_within() {
        let window = Window::new(d(2026, 1, 1), d(2026, 12, 31));
        let inverted = Period::Range { start: d(2026, 5, 1), end: d(2026, 4, 1) };
        assert!(!inverted.within(&window));
    }

    #[test]
    fn iso_week_belongs_to_one_year() {
        // ISO week 1 of 2026 runs Mon 2025-12-29 to Sun 2026-01-04.
        let week = Period::Week { year: 2026, week: 1 };
        let y2025 = Window::new(d(2025, 1, 1), d(2025, 12, 31));
        let y2026 = Window::new(d(2026, 1, 1), d(2026, 12, 31));
        assert!(week.within(&y2026));
        assert!(!week.within(&y2025));
    }

    #[test]
    fn invalid_week_has_no_span() {
        assert!(Period::Week { year: 2026, week: 60 }.span().is_none());
    }

    #[test]
    fn relative_windows() {
        let sunday = d(2026, 10, 18);
        let week = Window::iso_week_of(sunday);
        assert_eq!(week.start, d(2026, 10, 12));
        assert_eq!(week.end, sunday);

        let december = Window::month_of(d(2026, 12, 5));
        assert_eq!(december.end, d(2026, 12, 31));
        let february = Window::month_of(d(2028, 2, 10));
        assert_eq!(february.end, d(2028, 2, 29));
    }

    #[test]
    fn current_year_tracks_request_date() {
        let window = WindowSpec::CurrentYear.resolve(d(2027, 6, 1));
        assert_eq!(window.map(|w| w.start), Some(d(2027, 1, 1)));
    }
}
