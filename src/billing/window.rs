//! Calendar-day windows and the policies that produce them.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::BillingError;

/// First day covered by a full backfill when no start date is configured.
pub const DEFAULT_BACKFILL_START: (i32, u32, u32) = (2020, 1, 1);

/// Inclusive range of calendar days.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use allegro_billing::billing::{DateWindow, DayOrder};
///
/// let start = NaiveDate::from_ymd_opt(2024, 3, 13).unwrap();
/// let end = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
/// let window = DateWindow::new(start, end).unwrap();
/// assert_eq!(window.days(DayOrder::NewestFirst), vec![end, start]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, BillingError> {
        if start > end {
            return Err(BillingError::InvalidWindow(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn len_days(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    pub fn days(&self, order: DayOrder) -> Vec<NaiveDate> {
        let mut days: Vec<NaiveDate> = self.start.iter_days().take(self.len_days()).collect();
        if order == DayOrder::NewestFirst {
            days.reverse();
        }
        days
    }
}

/// Order in which days of a window are fetched.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DayOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// How the window for a run is chosen relative to "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPolicy {
    /// Yesterday only.
    DailyIncremental,
    /// Every day from `since` through today.
    FullBackfill { since: NaiveDate },
    /// The last `n` days, today included.
    LastDays(u32),
    Explicit { start: NaiveDate, end: NaiveDate },
}

impl WindowPolicy {
    pub fn full_backfill() -> Self {
        let (y, m, d) = DEFAULT_BACKFILL_START;
        Self::FullBackfill {
            since: NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN),
        }
    }

    pub fn resolve(&self, today: NaiveDate) -> Result<DateWindow, BillingError> {
        match *self {
            Self::DailyIncremental => {
                let yesterday = today
                    .checked_sub_days(Days::new(1))
                    .ok_or_else(|| BillingError::InvalidWindow("no day before today".into()))?;
                Ok(DateWindow::single(yesterday))
            }
            Self::FullBackfill { since } => DateWindow::new(since, today),
            Self::LastDays(0) => Err(BillingError::InvalidWindow(
                "day count must be at least 1".into(),
            )),
            Self::LastDays(n) => {
                let start = today
                    .checked_sub_days(Days::new(u64::from(n - 1)))
                    .ok_or_else(|| BillingError::InvalidWindow(format!("{n} days is too far back")))?;
                DateWindow::new(start, today)
            }
            Self::Explicit { start, end } => DateWindow::new(start, end),
        }
    }
}

/// Inclusive instant bounds of `day` in the billing API's timestamp format.
pub fn day_bounds(day: NaiveDate) -> (String, String) {
    let start = format!("{}T00:00:00.000000Z", day.format("%Y-%m-%d"));
    let end = format!("{}T23:59:59.999999Z", day.format("%Y-%m-%d"));
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn daily_load_covers_yesterday_only() {
        let window = WindowPolicy::DailyIncremental
            .resolve(date(2024, 3, 15))
            .unwrap();
        assert_eq!(window.start(), date(2024, 3, 14));
        assert_eq!(window.end(), date(2024, 3, 14));
    }

    #[test]
    fn full_backfill_runs_from_2020_through_today() {
        let window = WindowPolicy::full_backfill()
            .resolve(date(2024, 3, 15))
            .unwrap();
        assert_eq!(window.start(), date(2020, 1, 1));
        assert_eq!(window.end(), date(2024, 3, 15));
    }

    #[test]
    fn last_days_includes_today() {
        let window = WindowPolicy::LastDays(3).resolve(date(2024, 3, 1)).unwrap();
        assert_eq!(
            window.days(DayOrder::OldestFirst),
            vec![date(2024, 2, 28), date(2024, 2, 29), date(2024, 3, 1)]
        );
    }

    #[test]
    fn zero_last_days_is_rejected() {
        assert!(matches!(
            WindowPolicy::LastDays(0).resolve(date(2024, 3, 1)),
            Err(BillingError::InvalidWindow(_))
        ));
    }

    #[test]
    fn reversed_window_is_rejected() {
        assert!(DateWindow::new(date(2024, 3, 2), date(2024, 3, 1)).is_err());
    }

    #[test]
    fn days_respect_order() {
        let window = DateWindow::new(date(2024, 3, 1), date(2024, 3, 3)).unwrap();
        assert_eq!(
            window.days(DayOrder::NewestFirst),
            vec![date(2024, 3, 3), date(2024, 3, 2), date(2024, 3, 1)]
        );
        assert_eq!(window.len_days(), 3);
    }

    #[test]
    fn day_bounds_span_the_whole_day() {
        let (start, end) = day_bounds(date(2024, 3, 14));
        assert_eq!(start, "2024-03-14T00:00:00.000000Z");
        assert_eq!(end, "2024-03-14T23:59:59.999999Z");
    }
}
