//! Occurrence counting and spell-length operators.

use super::{check_same_axis, EventDates, IndicatorOutput};
use crate::errors::{ClimError, ClimResult};
use crate::frequency::Frequency;
use crate::threshold::{LogicalOperation, ResolvedThreshold};
use crate::timeseries::{ClimateVariable, FloatValue};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// How per-variable event masks are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkOperation {
    And,
    Or,
}

impl LinkOperation {
    pub fn parse(token: &str) -> ClimResult<Self> {
        match token {
            "and" | "AND" | "&&" => Ok(LinkOperation::And),
            "or" | "OR" | "||" => Ok(LinkOperation::Or),
            _ => Err(ClimError::ConfigParse {
                message: format!("unknown link operation '{token}'; accepted are 'and', 'or'"),
            }),
        }
    }
}

/// One (variable, comparison, threshold) triple of an event configuration.
#[derive(Debug)]
pub struct EventPair<'a> {
    pub variable: &'a ClimateVariable,
    pub operation: LogicalOperation,
    pub threshold: &'a ResolvedThreshold,
}

/// Configuration for multi-threshold event counting.
///
/// Each pair's boolean mask is evaluated independently, then the masks are
/// combined with the link operator before counting. The link operator is
/// required iff more than one pair is supplied; with a single pair it is
/// ignored.
#[derive(Debug)]
pub struct NbEventConfig<'a> {
    pub pairs: Vec<EventPair<'a>>,
    pub link: Option<LinkOperation>,
}

impl<'a> NbEventConfig<'a> {
    /// Single-variable configuration.
    pub fn single(
        variable: &'a ClimateVariable,
        operation: LogicalOperation,
        threshold: &'a ResolvedThreshold,
    ) -> Self {
        Self {
            pairs: vec![EventPair {
                variable,
                operation,
                threshold,
            }],
            link: None,
        }
    }

    fn validate(&self) -> ClimResult<()> {
        if self.pairs.is_empty() {
            return Err(ClimError::MismatchedEventConfig {
                operations: 0,
                thresholds: 0,
                variables: 0,
            });
        }
        if self.pairs.len() > 1 && self.link.is_none() {
            return Err(ClimError::MissingParameter {
                operation: "nb_events".to_string(),
                parameter: "link_logical_operations".to_string(),
            });
        }
        let first = self.pairs[0].variable.series();
        for pair in &self.pairs[1..] {
            check_same_axis("nb_events", first, pair.variable.series())?;
        }
        Ok(())
    }
}

/// Boolean event mask of one pair, shaped `(time, cells)`.
fn pair_mask(pair: &EventPair<'_>) -> ClimResult<Array2<bool>> {
    let series = pair.variable.series();
    let values = series.values();
    let mut mask = Array2::from_elem((series.len_time(), series.n_cells()), false);
    for (t, date) in series.time().dates().iter().enumerate() {
        for cell in 0..series.n_cells() {
            let threshold = pair.threshold.value_at(*date, cell)?;
            mask[[t, cell]] = pair.operation.apply(values[[t, cell]], threshold);
        }
    }
    Ok(mask)
}

fn combined_mask(config: &NbEventConfig<'_>) -> ClimResult<Array2<bool>> {
    let mut combined = pair_mask(&config.pairs[0])?;
    for pair in &config.pairs[1..] {
        let mask = pair_mask(pair)?;
        match config.link.expect("validated when pairs > 1") {
            LinkOperation::And => combined.zip_mut_with(&mask, |a, &b| *a = *a && b),
            LinkOperation::Or => combined.zip_mut_with(&mask, |a, &b| *a = *a || b),
        }
    }
    Ok(combined)
}

/// Count the time steps satisfying the event configuration in each period.
///
/// With `date_event`, the timestamps of the first and last occurrence in each
/// period are recorded as auxiliary event-date coordinates.
pub fn count_occurrences(
    config: &NbEventConfig<'_>,
    frequency: &Frequency,
    date_event: bool,
) -> ClimResult<IndicatorOutput> {
    config.validate()?;
    let series = config.pairs[0].variable.series();
    let mask = combined_mask(config)?;
    let periods = frequency.split(series.time())?;

    let n_cells = series.n_cells();
    let mut values = Array2::from_elem((periods.len(), n_cells), 0.0);
    let mut starts = vec![vec![None; n_cells]; periods.len()];
    let mut ends = vec![vec![None; n_cells]; periods.len()];

    for (pi, period) in periods.iter().enumerate() {
        for cell in 0..n_cells {
            let mut count = 0usize;
            for &i in &period.indices {
                if mask[[i, cell]] {
                    count += 1;
                    let date = series.time().get(i);
                    if starts[pi][cell].is_none() {
                        starts[pi][cell] = Some(date);
                    }
                    ends[pi][cell] = Some(date);
                }
            }
            values[[pi, cell]] = count as FloatValue;
        }
    }

    Ok(IndicatorOutput {
        values,
        periods,
        unit: "d".to_string(),
        event_dates: date_event.then_some(EventDates {
            start: starts,
            end: ends,
        }),
    })
}

/// Maximal runs of `true` in a mask slice, as (start offset, length) pairs.
fn runs(mask: &[bool]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, &m) in mask.iter().enumerate() {
        match (m, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                out.push((s, i - s));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push((s, mask.len() - s));
    }
    out
}

/// Longest run of consecutive satisfying time steps per period.
///
/// Ties are broken by first occurrence; a period with no satisfying step
/// yields 0. With `date_event`, the start and end of the longest run are
/// recorded.
pub fn max_consecutive_occurrence(
    variable: &ClimateVariable,
    operation: LogicalOperation,
    threshold: &ResolvedThreshold,
    frequency: &Frequency,
    date_event: bool,
) -> ClimResult<IndicatorOutput> {
    let config = NbEventConfig::single(variable, operation, threshold);
    config.validate()?;
    let series = variable.series();
    let mask = combined_mask(&config)?;
    let periods = frequency.split(series.time())?;

    let n_cells = series.n_cells();
    let mut values = Array2::from_elem((periods.len(), n_cells), 0.0);
    let mut starts = vec![vec![None; n_cells]; periods.len()];
    let mut ends = vec![vec![None; n_cells]; periods.len()];

    for (pi, period) in periods.iter().enumerate() {
        for cell in 0..n_cells {
            let period_mask: Vec<bool> =
                period.indices.iter().map(|&i| mask[[i, cell]]).collect();
            let best = runs(&period_mask)
                .into_iter()
                .max_by_key(|&(start, len)| (len, std::cmp::Reverse(start)));
            if let Some((start, len)) = best {
                values[[pi, cell]] = len as FloatValue;
                let first = period.indices[start];
                let last = period.indices[start + len - 1];
                starts[pi][cell] = Some(series.time().get(first));
                ends[pi][cell] = Some(series.time().get(last));
            }
        }
    }

    Ok(IndicatorOutput {
        values,
        periods,
        unit: "d".to_string(),
        event_dates: date_event.then_some(EventDates {
            start: starts,
            end: ends,
        }),
    })
}

/// Sum of the lengths of all runs of at least `min_length` per period.
pub fn sum_of_spell_lengths(
    variable: &ClimateVariable,
    operation: LogicalOperation,
    threshold: &ResolvedThreshold,
    frequency: &Frequency,
    min_length: usize,
) -> ClimResult<IndicatorOutput> {
    let config = NbEventConfig::single(variable, operation, threshold);
    config.validate()?;
    let series = variable.series();
    let mask = combined_mask(&config)?;
    let periods = frequency.split(series.time())?;

    let n_cells = series.n_cells();
    let mut values = Array2::from_elem((periods.len(), n_cells), 0.0);
    for (pi, period) in periods.iter().enumerate() {
        for cell in 0..n_cells {
            let period_mask: Vec<bool> =
                period.indices.iter().map(|&i| mask[[i, cell]]).collect();
            let total: usize = runs(&period_mask)
                .into_iter()
                .filter(|&(_, len)| len >= min_length)
                .map(|(_, len)| len)
                .sum();
            values[[pi, cell]] = total as FloatValue;
        }
    }

    Ok(IndicatorOutput {
        values,
        periods,
        unit: "d".to_string(),
        event_dates: None,
    })
}
