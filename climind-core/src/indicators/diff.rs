//! Cross-variable operators: differences between two variables and the
//! anomaly between a study period and a reference.
//!
//! Both input series must share the same time axis and grid. When the second
//! variable is expressed in a different but compatible unit, its values are
//! converted into the first variable's unit before any arithmetic.

use super::reduce::nan_mean;
use super::{check_same_axis, IndicatorOutput};
use crate::errors::{ClimError, ClimResult};
use crate::frequency::{Frequency, Period};
use crate::timeseries::{ClimateVariable, FloatValue, Timeseries};
use crate::units;
use ndarray::Array2;

/// Express a value of `b` in `a`'s unit, when the two differ.
fn aligned_value(
    b_value: FloatValue,
    b_unit: &str,
    a_unit: &str,
) -> ClimResult<FloatValue> {
    if b_unit == a_unit {
        return Ok(b_value);
    }
    units::convert(b_value, b_unit, a_unit)
}

fn per_period<F>(
    a: &Timeseries,
    frequency: &Frequency,
    mut reducer: F,
) -> ClimResult<(Array2<FloatValue>, Vec<Period>)>
where
    F: FnMut(&[usize], usize) -> ClimResult<FloatValue>,
{
    let periods = frequency.split(a.time())?;
    let mut values = Array2::from_elem((periods.len(), a.n_cells()), FloatValue::NAN);
    for (pi, period) in periods.iter().enumerate() {
        for cell in 0..a.n_cells() {
            values[[pi, cell]] = reducer(&period.indices, cell)?;
        }
    }
    Ok((values, periods))
}

/// Mean of the timestep-wise difference `a - b` over each period.
pub fn mean_of_difference(
    a: &ClimateVariable,
    b: &ClimateVariable,
    frequency: &Frequency,
) -> ClimResult<IndicatorOutput> {
    let (sa, sb) = (a.series(), b.series());
    check_same_axis("mean_of_difference", sa, sb)?;
    let (values, periods) = per_period(sa, frequency, |indices, cell| {
        let mut diffs = Vec::with_capacity(indices.len());
        for &i in indices {
            let bv = aligned_value(sb.values()[[i, cell]], sb.unit(), sa.unit())?;
            diffs.push(sa.values()[[i, cell]] - bv);
        }
        Ok(nan_mean(diffs.into_iter()))
    })?;
    Ok(IndicatorOutput {
        values,
        periods,
        unit: sa.unit().to_string(),
        event_dates: None,
    })
}

/// Per-period `max(a) - min(b)`, e.g. the extreme temperature range.
pub fn difference_of_extremes(
    a: &ClimateVariable,
    b: &ClimateVariable,
    frequency: &Frequency,
) -> ClimResult<IndicatorOutput> {
    let (sa, sb) = (a.series(), b.series());
    check_same_axis("difference_of_extremes", sa, sb)?;
    let (values, periods) = per_period(sa, frequency, |indices, cell| {
        let max_a = indices
            .iter()
            .map(|&i| sa.values()[[i, cell]])
            .filter(|v| v.is_finite())
            .fold(FloatValue::NAN, FloatValue::max);
        let mut min_b = FloatValue::NAN;
        for &i in indices {
            let bv = aligned_value(sb.values()[[i, cell]], sb.unit(), sa.unit())?;
            if bv.is_finite() && (min_b.is_nan() || bv < min_b) {
                min_b = bv;
            }
        }
        Ok(max_a - min_b)
    })?;
    Ok(IndicatorOutput {
        values,
        periods,
        unit: sa.unit().to_string(),
        event_dates: None,
    })
}

/// Per-period mean of the absolute one-timestep change of `a - b`, e.g. the
/// mean day-to-day variation of the diurnal temperature range.
///
/// Only pairs of consecutive timesteps fully inside the period contribute, so
/// a period shorter than two timesteps yields NaN.
pub fn mean_of_absolute_one_timestep_difference(
    a: &ClimateVariable,
    b: &ClimateVariable,
    frequency: &Frequency,
) -> ClimResult<IndicatorOutput> {
    let (sa, sb) = (a.series(), b.series());
    check_same_axis("mean_of_absolute_one_timestep_difference", sa, sb)?;
    let (values, periods) = per_period(sa, frequency, |indices, cell| {
        let mut diffs = Vec::new();
        for pair in indices.windows(2) {
            if pair[1] != pair[0] + 1 {
                continue;
            }
            let b_prev = aligned_value(sb.values()[[pair[0], cell]], sb.unit(), sa.unit())?;
            let b_curr = aligned_value(sb.values()[[pair[1], cell]], sb.unit(), sa.unit())?;
            let prev = sa.values()[[pair[0], cell]] - b_prev;
            let curr = sa.values()[[pair[1], cell]] - b_curr;
            diffs.push((curr - prev).abs());
        }
        Ok(nan_mean(diffs.into_iter()))
    })?;
    Ok(IndicatorOutput {
        values,
        periods,
        unit: sa.unit().to_string(),
        event_dates: None,
    })
}

/// Anomaly: difference of the whole-period means of a study series and a
/// reference series. With `percent` the result is expressed relative to the
/// reference mean, in percent.
///
/// The output always has a single period spanning the study series.
pub fn difference_of_means(
    study: &ClimateVariable,
    reference: &ClimateVariable,
    percent: bool,
) -> ClimResult<IndicatorOutput> {
    let (ss, sr) = (study.series(), reference.series());
    if ss.n_cells() != sr.n_cells() {
        return Err(ClimError::ShapeMismatch {
            context: "operation 'anomaly' requires matching grids".to_string(),
            expected: ss.n_cells(),
            got: sr.n_cells(),
        });
    }
    let periods = Frequency::Whole.split(ss.time())?;

    let mut values = Array2::from_elem((1, ss.n_cells()), FloatValue::NAN);
    for cell in 0..ss.n_cells() {
        let mean_study = nan_mean(ss.cell(cell).iter().copied());
        let mut ref_values = Vec::with_capacity(sr.len_time());
        for &v in sr.cell(cell).iter() {
            ref_values.push(aligned_value(v, sr.unit(), ss.unit())?);
        }
        let mean_ref = nan_mean(ref_values.into_iter());
        values[[0, cell]] = if percent {
            (mean_study - mean_ref) / mean_ref * 100.0
        } else {
            mean_study - mean_ref
        };
    }

    Ok(IndicatorOutput {
        values,
        periods,
        unit: if percent {
            "%".to_string()
        } else {
            ss.unit().to_string()
        },
        event_dates: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{CalDate, Calendar, TimeAxis};
    use crate::timeseries::Timeseries;
    use is_close::is_close;
    use std::sync::Arc;

    fn variable(name: &str, values: Vec<FloatValue>, unit: &str) -> ClimateVariable {
        let cal = Calendar::ProlepticGregorian;
        let axis = Arc::new(
            TimeAxis::daily(cal, CalDate::new(2001, 1, 1, cal).unwrap(), values.len()).unwrap(),
        );
        ClimateVariable::new(
            name,
            name,
            Timeseries::from_values(values, axis, unit).unwrap(),
        )
    }

    #[test]
    fn mean_difference_per_month() {
        let a = variable("tasmax", vec![10.0; 59], "degC");
        let b = variable("tasmin", vec![4.0; 59], "degC");
        let out = mean_of_difference(&a, &b, &Frequency::Month).unwrap();
        assert_eq!(out.values.nrows(), 2);
        assert!(is_close!(out.values[[0, 0]], 6.0));
        assert_eq!(out.unit, "degC");
    }

    #[test]
    fn second_variable_is_converted_into_the_first_unit() {
        let a = variable("tasmax", vec![300.0; 31], "K");
        let b = variable("tasmin", vec![20.0; 31], "degC");
        let out = mean_of_difference(&a, &b, &Frequency::Month).unwrap();
        assert!(is_close!(out.values[[0, 0]], 300.0 - 293.15));
    }

    #[test]
    fn extreme_range() {
        let mut hi = vec![10.0; 31];
        hi[4] = 25.0;
        let mut lo = vec![5.0; 31];
        lo[20] = -3.0;
        let a = variable("tasmax", hi, "degC");
        let b = variable("tasmin", lo, "degC");
        let out = difference_of_extremes(&a, &b, &Frequency::Month).unwrap();
        assert!(is_close!(out.values[[0, 0]], 28.0));
    }

    #[test]
    fn one_timestep_variation_of_the_range() {
        let a = variable("tasmax", vec![10.0, 14.0, 11.0, 13.0], "degC");
        let b = variable("tasmin", vec![5.0, 6.0, 5.0, 4.0], "degC");
        // Ranges are 5, 8, 6, 9; |changes| are 3, 2, 3 -> mean 8/3.
        let out =
            mean_of_absolute_one_timestep_difference(&a, &b, &Frequency::Month).unwrap();
        assert!(is_close!(out.values[[0, 0]], 8.0 / 3.0));
    }

    #[test]
    fn anomaly_against_a_reference() {
        let study = variable("tas", vec![12.0; 31], "degC");
        let reference = variable("tas", vec![10.0; 31], "degC");
        let out = difference_of_means(&study, &reference, false).unwrap();
        assert_eq!(out.values.nrows(), 1);
        assert!(is_close!(out.values[[0, 0]], 2.0));
        assert_eq!(out.unit, "degC");
    }

    #[test]
    fn anomaly_in_percent() {
        let study = variable("pr", vec![5.5; 31], "mm/day");
        let reference = variable("pr", vec![5.0; 31], "mm/day");
        let out = difference_of_means(&study, &reference, true).unwrap();
        assert!(is_close!(out.values[[0, 0]], 10.0));
        assert_eq!(out.unit, "%");
    }

    #[test]
    fn mismatched_axes_are_rejected() {
        let a = variable("tasmax", vec![1.0; 10], "degC");
        let b = variable("tasmin", vec![1.0; 12], "degC");
        assert!(mean_of_difference(&a, &b, &Frequency::Month).is_err());
    }
}
