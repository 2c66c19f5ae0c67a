//! Threshold model: scalar thresholds and percentile-based thresholds.
//!
//! A [`Threshold`] is a tagged union over the supported variants. Resolution
//! against a [`ClimateVariable`] turns it into a concrete
//! [`ResolvedThreshold`] (a scalar, a list of scalars, or per-day-of-year
//! arrays); operators consume only the resolved representation, never the
//! tag. The resolution record also carries everything the metadata
//! collaborator needs for reproducibility: the interpolation scheme, whether
//! bootstrap was applied and the reference period used.

use crate::calendar::CalDate;
use crate::errors::{ClimError, ClimResult};
use crate::percentile::{
    bootstrap_overlap, doy_percentiles, period_percentiles, Interpolation,
};
use crate::timeseries::{ClimateVariable, FloatValue};
use crate::units;
use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A comparison between a variable and a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOperation {
    Greater,
    GreaterOrEqual,
    Lower,
    LowerOrEqual,
    Equal,
    NotEqual,
}

impl LogicalOperation {
    pub fn parse(token: &str) -> ClimResult<Self> {
        match token {
            ">" | "gt" => Ok(LogicalOperation::Greater),
            ">=" | "get" | "ge" => Ok(LogicalOperation::GreaterOrEqual),
            "<" | "lt" => Ok(LogicalOperation::Lower),
            "<=" | "let" | "le" => Ok(LogicalOperation::LowerOrEqual),
            "==" | "e" | "equal" => Ok(LogicalOperation::Equal),
            "!=" | "ne" => Ok(LogicalOperation::NotEqual),
            _ => Err(ClimError::UnknownLogicalOperation {
                token: token.to_string(),
            }),
        }
    }

    /// Apply the comparison. NaN on either side never satisfies it.
    pub fn apply(&self, value: FloatValue, threshold: FloatValue) -> bool {
        if value.is_nan() || threshold.is_nan() {
            return false;
        }
        match self {
            LogicalOperation::Greater => value > threshold,
            LogicalOperation::GreaterOrEqual => value >= threshold,
            LogicalOperation::Lower => value < threshold,
            LogicalOperation::LowerOrEqual => value <= threshold,
            LogicalOperation::Equal => value == threshold,
            LogicalOperation::NotEqual => value != threshold,
        }
    }
}

impl fmt::Display for LogicalOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogicalOperation::Greater => ">",
            LogicalOperation::GreaterOrEqual => ">=",
            LogicalOperation::Lower => "<",
            LogicalOperation::LowerOrEqual => "<=",
            LogicalOperation::Equal => "==",
            LogicalOperation::NotEqual => "!=",
        };
        write!(f, "{s}")
    }
}

/// The threshold variants accepted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Threshold {
    /// A constant, optionally declared in its own unit.
    Scalar { value: FloatValue, unit: Option<String> },
    /// Several constants evaluated as independent thresholds.
    MultiValue {
        values: Vec<FloatValue>,
        unit: Option<String>,
    },
    /// A percentile computed per day of year over a smoothing window.
    DoyPercentile { percentile: f64, window_width: usize },
    /// Percentiles pooled over the whole reference period.
    PeriodPercentile { percentiles: Vec<f64> },
}

impl Threshold {
    pub fn scalar(value: FloatValue) -> Self {
        Threshold::Scalar { value, unit: None }
    }

    pub fn scalar_with_unit(value: FloatValue, unit: impl Into<String>) -> Self {
        Threshold::Scalar {
            value,
            unit: Some(unit.into()),
        }
    }

    /// The default day-of-year percentile threshold (5-day window).
    pub fn doy_percentile(percentile: f64) -> Self {
        Threshold::DoyPercentile {
            percentile,
            window_width: 5,
        }
    }

    pub fn is_doy_based(&self) -> bool {
        matches!(self, Threshold::DoyPercentile { .. })
    }

    pub fn is_period_based(&self) -> bool {
        matches!(self, Threshold::PeriodPercentile { .. })
    }

    /// Whether resolving against this variable will run the bootstrap.
    ///
    /// True iff the threshold is day-of-year-percentile based and the
    /// reference and study year sets partially overlap.
    pub fn requires_bootstrap(&self, variable: &ClimateVariable) -> bool {
        self.is_doy_based()
            && bootstrap_overlap(&variable.reference_years(), &variable.study_years()).is_some()
    }

    /// Resolve into a concrete representation against a variable.
    pub fn resolve(
        &self,
        variable: &ClimateVariable,
        interpolation: Interpolation,
    ) -> ClimResult<Resolution> {
        let reference_period = variable.reference_period();
        match self {
            Threshold::Scalar { value, unit } => {
                let value = convert_to_variable_unit(*value, unit.as_deref(), variable)?;
                Ok(Resolution {
                    threshold: ResolvedThreshold::Scalar(value),
                    bootstrapped: false,
                    interpolation,
                    reference_period: None,
                })
            }
            Threshold::MultiValue { values, unit } => {
                let values = values
                    .iter()
                    .map(|&v| convert_to_variable_unit(v, unit.as_deref(), variable))
                    .collect::<ClimResult<Vec<_>>>()?;
                Ok(Resolution {
                    threshold: ResolvedThreshold::PerValue(values),
                    bootstrapped: false,
                    interpolation,
                    reference_period: None,
                })
            }
            Threshold::DoyPercentile {
                percentile,
                window_width,
            } => {
                let base = doy_percentiles(
                    variable.in_base(),
                    *percentile,
                    *window_width,
                    interpolation,
                    None,
                )?;
                let overlap =
                    bootstrap_overlap(&variable.reference_years(), &variable.study_years());
                let mut per_year = HashMap::new();
                if let Some(years) = &overlap {
                    debug!(
                        "bootstrapping doy percentile {percentile} for {} overlapping year(s)",
                        years.len()
                    );
                    for &year in years {
                        let loo = doy_percentiles(
                            variable.in_base(),
                            *percentile,
                            *window_width,
                            interpolation,
                            Some(year),
                        )?;
                        per_year.insert(year, loo.values);
                    }
                }
                Ok(Resolution {
                    threshold: ResolvedThreshold::Doy(DoyThreshold {
                        base: base.values,
                        per_year,
                        percentile: *percentile,
                        window_width: *window_width,
                    }),
                    bootstrapped: overlap.is_some(),
                    interpolation,
                    reference_period: Some(reference_period),
                })
            }
            Threshold::PeriodPercentile { percentiles } => {
                let values = period_percentiles(variable.in_base(), percentiles, interpolation)?;
                Ok(Resolution {
                    threshold: ResolvedThreshold::PeriodPercentiles(values),
                    bootstrapped: false,
                    interpolation,
                    reference_period: Some(reference_period),
                })
            }
        }
    }
}

fn convert_to_variable_unit(
    value: FloatValue,
    declared_unit: Option<&str>,
    variable: &ClimateVariable,
) -> ClimResult<FloatValue> {
    match declared_unit {
        Some(unit) if unit != variable.series().unit() => {
            units::convert(value, unit, variable.series().unit())
        }
        _ => Ok(value),
    }
}

/// A day-of-year threshold with optional per-year bootstrap overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct DoyThreshold {
    /// Base percentile array shaped `(366, cells)`.
    pub base: Array2<FloatValue>,
    /// Leave-one-year-out arrays for overlapping study years.
    pub per_year: HashMap<i32, Array2<FloatValue>>,
    pub percentile: f64,
    pub window_width: usize,
}

impl DoyThreshold {
    /// Threshold value for a given sample date and cell. Uses the
    /// leave-one-year-out array when the sample's year was bootstrapped.
    pub fn value_for(&self, date: CalDate, cell: usize) -> FloatValue {
        let doy = date.doy_366();
        match self.per_year.get(&date.year) {
            Some(values) => values[[doy, cell]],
            None => self.base[[doy, cell]],
        }
    }
}

/// The concrete representation operators consume.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedThreshold {
    Scalar(FloatValue),
    PerValue(Vec<FloatValue>),
    Doy(DoyThreshold),
    /// Shaped `(percentiles, cells)`.
    PeriodPercentiles(Array2<FloatValue>),
}

impl ResolvedThreshold {
    /// The per-timestep threshold value for operators that compare sample by
    /// sample. List-valued variants do not resolve to a single per-timestep
    /// value; operator configuration rejects them up front.
    pub fn value_at(&self, date: CalDate, cell: usize) -> ClimResult<FloatValue> {
        match self {
            ResolvedThreshold::Scalar(v) => Ok(*v),
            ResolvedThreshold::Doy(doy) => Ok(doy.value_for(date, cell)),
            ResolvedThreshold::PerValue(_) | ResolvedThreshold::PeriodPercentiles(_) => {
                Err(ClimError::InvalidThresholdForOperation {
                    operation: "per-timestep comparison".to_string(),
                    reason: "a list-valued threshold does not resolve to one value per time step"
                        .to_string(),
                })
            }
        }
    }
}

/// The outcome of threshold resolution, including the reproducibility record
/// surfaced to the metadata collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub threshold: ResolvedThreshold,
    /// Whether the leave-one-year-out bootstrap was applied.
    pub bootstrapped: bool,
    pub interpolation: Interpolation,
    /// First and last year of the reference data, when percentiles were used.
    pub reference_period: Option<(i32, i32)>,
}
