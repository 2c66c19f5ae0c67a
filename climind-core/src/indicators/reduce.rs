//! Per-period reductions: extremes, integrals and fractions.

use super::IndicatorOutput;
use crate::errors::{ClimError, ClimResult};
use crate::frequency::Frequency;
use crate::threshold::{LogicalOperation, ResolvedThreshold};
use crate::timeseries::{ClimateVariable, FloatValue};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// The simple per-period reductions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReduceOp {
    Max,
    Min,
    Mean,
    Sum,
    StandardDeviation,
}

impl ReduceOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReduceOp::Max => "max",
            ReduceOp::Min => "min",
            ReduceOp::Mean => "mean",
            ReduceOp::Sum => "sum",
            ReduceOp::StandardDeviation => "std",
        }
    }
}

/// An in-place filter: values not satisfying the comparison are masked out
/// (treated as missing) before reduction.
#[derive(Debug)]
pub struct ThresholdFilter<'a> {
    pub operation: LogicalOperation,
    pub threshold: &'a ResolvedThreshold,
}

/// Sum of finite values; NaN when the input holds no finite value.
pub(crate) fn nan_sum(values: impl Iterator<Item = FloatValue>) -> FloatValue {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values.filter(|v| v.is_finite()) {
        sum += v;
        count += 1;
    }
    if count == 0 {
        FloatValue::NAN
    } else {
        sum
    }
}

/// Mean of finite values; NaN when the input holds no finite value.
pub(crate) fn nan_mean(values: impl Iterator<Item = FloatValue>) -> FloatValue {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values.filter(|v| v.is_finite()) {
        sum += v;
        count += 1;
    }
    if count == 0 {
        FloatValue::NAN
    } else {
        sum / count as FloatValue
    }
}

fn nan_extreme(values: impl Iterator<Item = FloatValue>, take_max: bool) -> FloatValue {
    values
        .filter(|v| v.is_finite())
        .fold(FloatValue::NAN, |acc, v| {
            if acc.is_nan() || (take_max && v > acc) || (!take_max && v < acc) {
                v
            } else {
                acc
            }
        })
}

/// Sample standard deviation (N-1 denominator) of finite values; NaN for
/// fewer than two finite values.
fn nan_std(values: &[FloatValue]) -> FloatValue {
    let finite: Vec<FloatValue> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return FloatValue::NAN;
    }
    let n = finite.len() as FloatValue;
    let mean = finite.iter().sum::<FloatValue>() / n;
    let ss: FloatValue = finite.iter().map(|&v| (v - mean) * (v - mean)).sum();
    (ss / (n - 1.0)).sqrt()
}

fn apply_reduce(op: ReduceOp, values: &[FloatValue]) -> FloatValue {
    match op {
        ReduceOp::Max => nan_extreme(values.iter().copied(), true),
        ReduceOp::Min => nan_extreme(values.iter().copied(), false),
        ReduceOp::Mean => nan_mean(values.iter().copied()),
        ReduceOp::Sum => nan_sum(values.iter().copied()),
        ReduceOp::StandardDeviation => nan_std(values),
    }
}

/// Per-period reduction of one variable, with an optional threshold filter.
pub fn reduce(
    variable: &ClimateVariable,
    op: ReduceOp,
    frequency: &Frequency,
    filter: Option<ThresholdFilter<'_>>,
) -> ClimResult<IndicatorOutput> {
    let series = variable.series();
    let periods = frequency.split(series.time())?;
    let data = series.values();

    let mut values = Array2::from_elem((periods.len(), series.n_cells()), FloatValue::NAN);
    for (pi, period) in periods.iter().enumerate() {
        for cell in 0..series.n_cells() {
            let mut samples = Vec::with_capacity(period.indices.len());
            for &i in &period.indices {
                let v = data[[i, cell]];
                let keep = match &filter {
                    Some(f) => {
                        let thr = f.threshold.value_at(series.time().get(i), cell)?;
                        f.operation.apply(v, thr)
                    }
                    None => true,
                };
                samples.push(if keep { v } else { FloatValue::NAN });
            }
            values[[pi, cell]] = apply_reduce(op, &samples);
        }
    }

    Ok(IndicatorOutput {
        values,
        periods,
        unit: series.unit().to_string(),
        event_dates: None,
    })
}

/// Per-period integral of `max(0, value - threshold)`.
///
/// The threshold may be day-of-year-percentile based, in which case the
/// per-timestep value is looked up by calendar day. Timesteps where either
/// side is undefined (a missing value, or a calendar day the reference data
/// never covers) contribute no term; a period with no defined term is NaN.
pub fn excess(
    variable: &ClimateVariable,
    threshold: &ResolvedThreshold,
    frequency: &Frequency,
) -> ClimResult<IndicatorOutput> {
    integral(variable, threshold, frequency, false)
}

/// Per-period integral of `max(0, threshold - value)`.
pub fn deficit(
    variable: &ClimateVariable,
    threshold: &ResolvedThreshold,
    frequency: &Frequency,
) -> ClimResult<IndicatorOutput> {
    integral(variable, threshold, frequency, true)
}

fn integral(
    variable: &ClimateVariable,
    threshold: &ResolvedThreshold,
    frequency: &Frequency,
    below: bool,
) -> ClimResult<IndicatorOutput> {
    let series = variable.series();
    let periods = frequency.split(series.time())?;
    let data = series.values();

    let mut values = Array2::from_elem((periods.len(), series.n_cells()), FloatValue::NAN);
    for (pi, period) in periods.iter().enumerate() {
        for cell in 0..series.n_cells() {
            let mut terms = Vec::with_capacity(period.indices.len());
            for &i in &period.indices {
                let v = data[[i, cell]];
                let thr = threshold.value_at(series.time().get(i), cell)?;
                let diff = if below { thr - v } else { v - thr };
                terms.push(if v.is_finite() && thr.is_finite() {
                    diff.max(0.0)
                } else {
                    FloatValue::NAN
                });
            }
            values[[pi, cell]] = nan_sum(terms.into_iter());
        }
    }

    Ok(IndicatorOutput {
        values,
        periods,
        unit: series.unit().to_string(),
        event_dates: None,
    })
}

/// Per-period sum of values satisfying the threshold, divided by the
/// per-period sum of all values. In [0, 1]; NaN when the total is zero or
/// entirely missing.
pub fn fraction_of_total(
    variable: &ClimateVariable,
    operation: LogicalOperation,
    threshold: &ResolvedThreshold,
    frequency: &Frequency,
) -> ClimResult<IndicatorOutput> {
    let series = variable.series();
    let periods = frequency.split(series.time())?;
    let data = series.values();

    let mut values = Array2::from_elem((periods.len(), series.n_cells()), FloatValue::NAN);
    for (pi, period) in periods.iter().enumerate() {
        for cell in 0..series.n_cells() {
            let mut selected = 0.0;
            let mut total = 0.0;
            let mut any = false;
            for &i in &period.indices {
                let v = data[[i, cell]];
                if !v.is_finite() {
                    continue;
                }
                any = true;
                total += v;
                let thr = threshold.value_at(series.time().get(i), cell)?;
                if operation.apply(v, thr) {
                    selected += v;
                }
            }
            values[[pi, cell]] = if any && total != 0.0 {
                selected / total
            } else {
                FloatValue::NAN
            };
        }
    }

    Ok(IndicatorOutput {
        values,
        periods,
        unit: "1".to_string(),
        event_dates: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{CalDate, Calendar, TimeAxis};
    use is_close::is_close;
    use std::sync::Arc;

    fn variable(values: Vec<FloatValue>, unit: &str) -> ClimateVariable {
        let cal = Calendar::ProlepticGregorian;
        let axis = Arc::new(
            TimeAxis::daily(cal, CalDate::new(2001, 1, 1, cal).unwrap(), values.len()).unwrap(),
        );
        ClimateVariable::new(
            "pr",
            "precipitation_flux",
            crate::timeseries::Timeseries::from_values(values, axis, unit).unwrap(),
        )
    }

    #[test]
    fn monthly_reductions() {
        // January 1.0, February 3.0.
        let mut values = vec![1.0; 31];
        values.extend(vec![3.0; 28]);
        let var = variable(values, "mm/day");
        let out = reduce(&var, ReduceOp::Sum, &Frequency::Month, None).unwrap();
        assert!(is_close!(out.values[[0, 0]], 31.0));
        assert!(is_close!(out.values[[1, 0]], 84.0));
        let out = reduce(&var, ReduceOp::Mean, &Frequency::Month, None).unwrap();
        assert!(is_close!(out.values[[1, 0]], 3.0));
        assert_eq!(out.unit, "mm/day");
    }

    #[test]
    fn reductions_skip_missing_values() {
        let mut values = vec![2.0; 31];
        values[3] = f64::NAN;
        values[4] = 8.0;
        let var = variable(values, "mm/day");
        let out = reduce(&var, ReduceOp::Max, &Frequency::Month, None).unwrap();
        assert!(is_close!(out.values[[0, 0]], 8.0));
        let out = reduce(&var, ReduceOp::Mean, &Frequency::Month, None).unwrap();
        assert!(is_close!(out.values[[0, 0]], (29.0 * 2.0 + 8.0) / 30.0));
    }

    #[test]
    fn all_missing_period_is_nan() {
        let var = variable(vec![f64::NAN; 31], "mm/day");
        let out = reduce(&var, ReduceOp::Mean, &Frequency::Month, None).unwrap();
        assert!(out.values[[0, 0]].is_nan());
    }

    #[test]
    fn threshold_filter_masks_before_reduction() {
        let mut values = vec![1.0; 31];
        values[10] = 20.0;
        values[11] = 30.0;
        let var = variable(values, "mm/day");
        let thr = ResolvedThreshold::Scalar(10.0);
        let filter = ThresholdFilter {
            operation: LogicalOperation::GreaterOrEqual,
            threshold: &thr,
        };
        let out = reduce(&var, ReduceOp::Mean, &Frequency::Month, Some(filter)).unwrap();
        assert!(is_close!(out.values[[0, 0]], 25.0));
    }

    #[test]
    fn standard_deviation_uses_sample_denominator() {
        let var = variable(vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], "degC");
        let out = reduce(&var, ReduceOp::StandardDeviation, &Frequency::Whole, None).unwrap();
        assert!(is_close!(out.values[[0, 0]], 2.138090, abs_tol = 1e-5));
    }

    #[test]
    fn excess_and_deficit_integrals() {
        // Degree-day style integrals against a constant threshold of 5.
        let var = variable(vec![3.0, 5.0, 8.0, 10.0], "degC");
        let thr = ResolvedThreshold::Scalar(5.0);
        let out = excess(&var, &thr, &Frequency::Whole).unwrap();
        assert!(is_close!(out.values[[0, 0]], 3.0 + 5.0));
        let out = deficit(&var, &thr, &Frequency::Whole).unwrap();
        assert!(is_close!(out.values[[0, 0]], 2.0));
    }

    #[test]
    fn undefined_thresholds_do_not_integrate_as_zero() {
        let var = variable(vec![8.0, 8.0, 8.0], "degC");
        let thr = ResolvedThreshold::Scalar(f64::NAN);
        let out = excess(&var, &thr, &Frequency::Whole).unwrap();
        assert!(out.values[[0, 0]].is_nan());
        let out = deficit(&var, &thr, &Frequency::Whole).unwrap();
        assert!(out.values[[0, 0]].is_nan());
    }

    #[test]
    fn fraction_of_total_bounds() {
        // 4 wet days of 10 mm/day among 10 drizzle days of 1 mm/day.
        let mut values = vec![1.0; 10];
        for v in values.iter_mut().take(4) {
            *v = 10.0;
        }
        let var = variable(values, "mm/day");
        let thr = ResolvedThreshold::Scalar(5.0);
        let out =
            fraction_of_total(&var, LogicalOperation::GreaterOrEqual, &thr, &Frequency::Whole)
                .unwrap();
        let f = out.values[[0, 0]];
        assert!(is_close!(f, 40.0 / 46.0));
        assert!((0.0..=1.0).contains(&f));
        assert_eq!(out.unit, "1");
    }

    #[test]
    fn fraction_of_total_zero_total_is_nan() {
        let var = variable(vec![0.0; 5], "mm/day");
        let thr = ResolvedThreshold::Scalar(1.0);
        let out = fraction_of_total(&var, LogicalOperation::Greater, &thr, &Frequency::Whole)
            .unwrap();
        assert!(out.values[[0, 0]].is_nan());
    }
}
