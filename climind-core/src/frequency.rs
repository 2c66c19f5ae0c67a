//! Output sampling frequencies and calendar-aware resampling.
//!
//! A [`Frequency`] turns a time axis into an ordered list of non-overlapping
//! [`Period`]s. Each period carries the sample indices that fall into it, a
//! representative label timestamp (the first day of the period) and its
//! nominal inclusive `[start, end]` bounds, reconstructed after grouping.
//!
//! Seasons may wrap the year boundary. A wrapping season attributes its
//! pre-wrap months to the *following* year's bucket, so a December sample
//! lands in the same DJF bucket as the subsequent January and February.

use crate::calendar::{CalDate, Calendar, TimeAxis};
use crate::errors::{ClimError, ClimResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Frequency tokens accepted by [`Frequency::parse`].
pub const ACCEPTED_TOKENS: &[&str] = &["year", "YS", "annual", "month", "MS", "none"];

/// A recurring month-day, parsed from `"MM-DD"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthDay {
    pub month: u8,
    pub day: u8,
}

impl MonthDay {
    pub fn new(month: u8, day: u8) -> ClimResult<Self> {
        // Validate against the most permissive layout; per-year clamping
        // happens when bounds are materialized.
        if !(1..=12).contains(&month) || day == 0 || day > 31 {
            return Err(ClimError::InvalidMonthDay {
                token: format!("{month:02}-{day:02}"),
            });
        }
        Ok(Self { month, day })
    }

    pub fn parse(token: &str) -> ClimResult<Self> {
        let invalid = || ClimError::InvalidMonthDay {
            token: token.to_string(),
        };
        let (m, d) = token.split_once('-').ok_or_else(invalid)?;
        let month: u8 = m.parse().map_err(|_| invalid())?;
        let day: u8 = d.parse().map_err(|_| invalid())?;
        MonthDay::new(month, day)
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

/// How a season window is defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeasonSpec {
    /// Whole calendar months, e.g. `[11, 12, 1, 2]`.
    Months(Vec<u8>),
    /// A recurring date window, inclusive on both ends, e.g. `11-20 ..= 02-15`.
    DateRange { start: MonthDay, end: MonthDay },
}

/// An output sampling frequency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    /// Calendar years.
    Year,
    /// Calendar months.
    Month,
    /// One bucket per season occurrence.
    Season(SeasonSpec),
    /// A single bucket spanning the whole series (no time axis on output).
    Whole,
}

/// One output time step: label, inclusive bounds and member sample indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Period {
    /// Representative timestamp (first day of the period).
    pub label: CalDate,
    /// Nominal inclusive `[start, end]` bounds.
    pub bounds: (CalDate, CalDate),
    /// Indices into the source time axis, in order.
    pub indices: Vec<usize>,
}

impl Frequency {
    /// Parse a frequency token. Season frequencies are built structurally via
    /// [`Frequency::season_months`] / [`Frequency::season_between`].
    pub fn parse(token: &str) -> ClimResult<Self> {
        match token {
            "year" | "YS" | "annual" => Ok(Frequency::Year),
            "month" | "MS" => Ok(Frequency::Month),
            "none" => Ok(Frequency::Whole),
            _ => Err(ClimError::UnknownFrequency {
                token: token.to_string(),
                accepted: ACCEPTED_TOKENS.join(", "),
            }),
        }
    }

    /// Build a month-list season, e.g. `[11, 12, 1, 2]` for NDJF.
    ///
    /// The months must form a consecutive run of calendar months; the run may
    /// wrap across December.
    pub fn season_months(months: Vec<u8>) -> ClimResult<Self> {
        if months.is_empty() || months.len() > 12 {
            return Err(ClimError::NonConsecutiveSeasonMonths { months });
        }
        for &m in &months {
            if !(1..=12).contains(&m) {
                return Err(ClimError::NonConsecutiveSeasonMonths { months });
            }
        }
        for pair in months.windows(2) {
            if pair[1] != pair[0] % 12 + 1 {
                return Err(ClimError::NonConsecutiveSeasonMonths { months });
            }
        }
        Ok(Frequency::Season(SeasonSpec::Months(months)))
    }

    /// Build a date-bounded season from two `"MM-DD"` strings.
    pub fn season_between(start: &str, end: &str) -> ClimResult<Self> {
        Ok(Frequency::Season(SeasonSpec::DateRange {
            start: MonthDay::parse(start)?,
            end: MonthDay::parse(end)?,
        }))
    }

    /// Whether outputs of this frequency form an ordered set of periods with
    /// reconstructible time bounds. Only the degenerate whole-series bucket
    /// does not.
    pub fn has_time_buckets(&self) -> bool {
        !matches!(self, Frequency::Whole)
    }

    /// Group every sample of `axis` into ordered, non-overlapping periods.
    ///
    /// Samples outside a season window are dropped. Periods are returned in
    /// chronological order; a period is only emitted if at least one sample
    /// falls into it.
    pub fn split(&self, axis: &TimeAxis) -> ClimResult<Vec<Period>> {
        let calendar = axis.calendar();
        match self {
            Frequency::Whole => Ok(vec![Period {
                label: axis.first(),
                bounds: (axis.first(), axis.last()),
                indices: (0..axis.len()).collect(),
            }]),
            Frequency::Year => {
                let mut buckets: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
                for (i, d) in axis.dates().iter().enumerate() {
                    buckets.entry(d.year).or_default().push(i);
                }
                Ok(buckets
                    .into_iter()
                    .map(|(year, indices)| Period {
                        label: CalDate::clamped(year, 1, 1, calendar),
                        bounds: (
                            CalDate::clamped(year, 1, 1, calendar),
                            CalDate::clamped(year, 12, 31, calendar),
                        ),
                        indices,
                    })
                    .collect())
            }
            Frequency::Month => {
                let mut buckets: BTreeMap<(i32, u8), Vec<usize>> = BTreeMap::new();
                for (i, d) in axis.dates().iter().enumerate() {
                    buckets.entry((d.year, d.month)).or_default().push(i);
                }
                Ok(buckets
                    .into_iter()
                    .map(|((year, month), indices)| Period {
                        label: CalDate::clamped(year, month, 1, calendar),
                        bounds: (
                            CalDate::clamped(year, month, 1, calendar),
                            CalDate::clamped(year, month, 31, calendar),
                        ),
                        indices,
                    })
                    .collect())
            }
            Frequency::Season(spec) => Ok(split_season(spec, axis)),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Year => write!(f, "year"),
            Frequency::Month => write!(f, "month"),
            Frequency::Season(SeasonSpec::Months(months)) => {
                write!(f, "season{months:?}")
            }
            Frequency::Season(SeasonSpec::DateRange { start, end }) => {
                write!(f, "season[{start}..={end}]")
            }
            Frequency::Whole => write!(f, "none"),
        }
    }
}

fn split_season(spec: &SeasonSpec, axis: &TimeAxis) -> Vec<Period> {
    let calendar = axis.calendar();
    let mut buckets: BTreeMap<i32, Vec<usize>> = BTreeMap::new();

    match spec {
        SeasonSpec::Months(months) => {
            let first = months[0];
            // A wrapping run ends on a smaller month than it starts on.
            let wrapped = *months.last().expect("validated non-empty") < first;
            for (i, d) in axis.dates().iter().enumerate() {
                if !months.contains(&d.month) {
                    continue;
                }
                // Pre-wrap months belong to the following year's bucket.
                let season_year = if wrapped && d.month >= first {
                    d.year + 1
                } else {
                    d.year
                };
                buckets.entry(season_year).or_default().push(i);
            }
            let last = *months.last().expect("validated non-empty");
            buckets
                .into_iter()
                .map(|(season_year, indices)| {
                    let start_year = if wrapped { season_year - 1 } else { season_year };
                    Period {
                        label: CalDate::clamped(start_year, first, 1, calendar),
                        bounds: (
                            CalDate::clamped(start_year, first, 1, calendar),
                            CalDate::clamped(season_year, last, 31, calendar),
                        ),
                        indices,
                    }
                })
                .collect()
        }
        SeasonSpec::DateRange { start, end } => {
            let s = (start.month, start.day);
            let e = (end.month, end.day);
            let wrapped = e < s;
            for (i, d) in axis.dates().iter().enumerate() {
                let md = d.month_day();
                let inside = if wrapped {
                    md >= s || md <= e
                } else {
                    md >= s && md <= e
                };
                if !inside {
                    continue;
                }
                let season_year = if wrapped && md >= s { d.year + 1 } else { d.year };
                buckets.entry(season_year).or_default().push(i);
            }
            buckets
                .into_iter()
                .map(|(season_year, indices)| {
                    let start_year = if wrapped { season_year - 1 } else { season_year };
                    Period {
                        label: CalDate::clamped(start_year, start.month, start.day, calendar),
                        bounds: (
                            CalDate::clamped(start_year, start.month, start.day, calendar),
                            CalDate::clamped(season_year, end.month, end.day, calendar),
                        ),
                        indices,
                    }
                })
                .collect()
        }
    }
}
