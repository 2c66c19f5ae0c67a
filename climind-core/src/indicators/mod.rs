//! The indicator operator algebra.
//!
//! Every operator shares the same shape: it consumes one or two
//! [`ClimateVariable`]s, resolved thresholds where applicable and a
//! [`Frequency`], and produces an [`IndicatorOutput`]: one value per output
//! period per cell, plus the periods themselves (labels and time bounds) and
//! optionally per-period event dates.
//!
//! Operators never consume threshold tags, only resolved representations, and
//! all argument validation happens before any per-period reduction starts.

pub mod diff;
pub mod occurrence;
pub mod reduce;
pub mod rolling;

pub use diff::{
    difference_of_extremes, difference_of_means, mean_of_absolute_one_timestep_difference,
    mean_of_difference,
};
pub use occurrence::{
    count_occurrences, max_consecutive_occurrence, sum_of_spell_lengths, EventPair, LinkOperation,
    NbEventConfig,
};
pub use reduce::{deficit, excess, fraction_of_total, reduce, ReduceOp, ThresholdFilter};
pub use rolling::{rolling_extreme, ExtremeMode, RollingAgg};

use crate::calendar::CalDate;
use crate::errors::{ClimError, ClimResult};
use crate::frequency::Period;
use crate::timeseries::{FloatValue, Timeseries};
use ndarray::Array2;

/// First and last event timestamps per output period per cell.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDates {
    /// `start[period][cell]`
    pub start: Vec<Vec<Option<CalDate>>>,
    /// `end[period][cell]`
    pub end: Vec<Vec<Option<CalDate>>>,
}

/// The aggregated result of one operator.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorOutput {
    /// Values shaped `(periods, cells)`.
    pub values: Array2<FloatValue>,
    /// The output periods, in chronological order, with labels and bounds.
    pub periods: Vec<Period>,
    /// Unit attribute of the output values.
    pub unit: String,
    /// Present when the operator was asked to record event dates.
    pub event_dates: Option<EventDates>,
}

/// Validate an operator's variable count before any computation.
pub fn expect_variable_count(operation: &str, expected: usize, got: usize) -> ClimResult<()> {
    if got != expected {
        return Err(ClimError::WrongVariableCount {
            operation: operation.to_string(),
            expected: expected.to_string(),
            got,
        });
    }
    Ok(())
}

/// Validate that two series are defined on the same time axis.
pub(crate) fn check_same_axis(
    operation: &str,
    a: &Timeseries,
    b: &Timeseries,
) -> ClimResult<()> {
    if a.time() != b.time() {
        return Err(ClimError::ShapeMismatch {
            context: format!("operation '{operation}' requires aligned time axes"),
            expected: a.len_time(),
            got: b.len_time(),
        });
    }
    if a.n_cells() != b.n_cells() {
        return Err(ClimError::ShapeMismatch {
            context: format!("operation '{operation}' requires matching grids"),
            expected: a.n_cells(),
            got: b.n_cells(),
        });
    }
    Ok(())
}
