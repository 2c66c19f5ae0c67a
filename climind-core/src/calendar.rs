//! Calendar model for climate time axes.
//!
//! Climate datasets are produced against several calendars: the real-world
//! proleptic Gregorian calendar, model calendars without leap years (365-day),
//! with only leap years (366-day), and idealized 360-day calendars where every
//! month has 30 days. Day-of-year arithmetic in this crate never assumes a
//! fixed year length; every date maps into a fixed 366-slot layout via
//! [`CalDate::doy_366`] so day-of-year percentile arrays always have exactly
//! 366 entries regardless of the calendar.

use crate::errors::{ClimError, ClimResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Month lengths of a non-leap Gregorian year.
const DAYS_IN_MONTH: [u8; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Cumulative days before each month in a leap-year layout.
/// Used to assign every (month, day) pair a stable 366-slot index.
const CUM_DAYS_LEAP: [usize; 12] = [0, 31, 60, 91, 121, 152, 182, 213, 244, 274, 305, 335];

/// Number of day-of-year slots in the fixed layout (Feb 29 included).
pub const DOY_SLOTS: usize = 366;

/// Calendar convention of a time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Calendar {
    /// Standard calendar with Gregorian leap-year rules.
    #[default]
    ProlepticGregorian,
    /// 365-day calendar; February always has 28 days.
    NoLeap,
    /// 366-day calendar; February always has 29 days.
    AllLeap,
    /// 360-day calendar; every month has 30 days.
    Day360,
}

impl Calendar {
    pub fn is_leap_year(self, year: i32) -> bool {
        match self {
            Calendar::ProlepticGregorian => {
                (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
            }
            Calendar::NoLeap | Calendar::Day360 => false,
            Calendar::AllLeap => true,
        }
    }

    pub fn days_in_month(self, year: i32, month: u8) -> u8 {
        debug_assert!((1..=12).contains(&month));
        match self {
            Calendar::Day360 => 30,
            _ => {
                if month == 2 && self.is_leap_year(year) {
                    29
                } else {
                    DAYS_IN_MONTH[(month - 1) as usize]
                }
            }
        }
    }

    pub fn days_in_year(self, year: i32) -> u16 {
        match self {
            Calendar::Day360 => 360,
            _ => {
                if self.is_leap_year(year) {
                    366
                } else {
                    365
                }
            }
        }
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Calendar::ProlepticGregorian => write!(f, "proleptic_gregorian"),
            Calendar::NoLeap => write!(f, "noleap"),
            Calendar::AllLeap => write!(f, "all_leap"),
            Calendar::Day360 => write!(f, "360_day"),
        }
    }
}

/// A calendar date. Ordering follows (year, month, day).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CalDate {
    pub year: i32,
    pub month: u8,
    pub day: u8,
}

impl CalDate {
    /// Create a date, validating it against the given calendar.
    pub fn new(year: i32, month: u8, day: u8, calendar: Calendar) -> ClimResult<Self> {
        if !(1..=12).contains(&month) || day == 0 || day > calendar.days_in_month(year, month) {
            return Err(ClimError::InvalidDate {
                year,
                month,
                day,
                calendar: calendar.to_string(),
            });
        }
        Ok(Self { year, month, day })
    }

    /// Create a date, clamping the day to the end of the month when needed.
    /// Used for nominal period bounds like "Feb 29" in a non-leap year.
    pub fn clamped(year: i32, month: u8, day: u8, calendar: Calendar) -> Self {
        let max_day = calendar.days_in_month(year, month);
        Self {
            year,
            month,
            day: day.min(max_day).max(1),
        }
    }

    /// The following day in the given calendar.
    pub fn succ(self, calendar: Calendar) -> Self {
        if self.day < calendar.days_in_month(self.year, self.month) {
            Self {
                day: self.day + 1,
                ..self
            }
        } else if self.month < 12 {
            Self {
                year: self.year,
                month: self.month + 1,
                day: 1,
            }
        } else {
            Self {
                year: self.year + 1,
                month: 1,
                day: 1,
            }
        }
    }

    /// Day-of-year slot in the fixed 366-slot layout.
    ///
    /// Independent of the calendar: March 1 is slot 60 everywhere, so values
    /// from different calendars and leap/non-leap years pool into the same
    /// slots. Feb 29 owns slot 59 and is only ever populated by calendars and
    /// years that contain it.
    pub fn doy_366(self) -> usize {
        CUM_DAYS_LEAP[(self.month - 1) as usize] + (self.day - 1) as usize
    }

    /// (month, day) pair, for recurring-window comparisons.
    pub fn month_day(self) -> (u8, u8) {
        (self.month, self.day)
    }
}

impl fmt::Display for CalDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// A strictly increasing sequence of dates under one calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAxis {
    calendar: Calendar,
    dates: Vec<CalDate>,
}

impl TimeAxis {
    /// Build an axis from explicit dates.
    ///
    /// The axis must be non-empty, every date must be valid for the calendar
    /// and the sequence must be strictly increasing.
    pub fn from_dates(calendar: Calendar, dates: Vec<CalDate>) -> ClimResult<Self> {
        if dates.is_empty() {
            return Err(ClimError::EmptyTimeAxis);
        }
        for d in &dates {
            // Round-trip through the validating constructor.
            CalDate::new(d.year, d.month, d.day, calendar)?;
        }
        for (i, pair) in dates.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(ClimError::NonMonotonicTimeAxis { index: i + 1 });
            }
        }
        Ok(Self { calendar, dates })
    }

    /// Build a contiguous daily axis of `n` steps starting at `start`.
    pub fn daily(calendar: Calendar, start: CalDate, n: usize) -> ClimResult<Self> {
        if n == 0 {
            return Err(ClimError::EmptyTimeAxis);
        }
        let start = CalDate::new(start.year, start.month, start.day, calendar)?;
        let mut dates = Vec::with_capacity(n);
        let mut current = start;
        for _ in 0..n {
            dates.push(current);
            current = current.succ(calendar);
        }
        Ok(Self { calendar, dates })
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn get(&self, index: usize) -> CalDate {
        self.dates[index]
    }

    pub fn dates(&self) -> &[CalDate] {
        &self.dates
    }

    pub fn first(&self) -> CalDate {
        self.dates[0]
    }

    pub fn last(&self) -> CalDate {
        self.dates[self.dates.len() - 1]
    }

    /// Indices of all samples whose year falls in `start_year..=end_year`.
    pub fn year_indices(&self, start_year: i32, end_year: i32) -> Vec<usize> {
        self.dates
            .iter()
            .enumerate()
            .filter(|(_, d)| d.year >= start_year && d.year <= end_year)
            .map(|(i, _)| i)
            .collect()
    }

    /// Sorted distinct years present on the axis.
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.dates.iter().map(|d| d.year).collect();
        years.dedup();
        years
    }
}
