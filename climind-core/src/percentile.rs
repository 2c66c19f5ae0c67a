//! Percentile estimation for threshold calibration.
//!
//! Two flavours are computed from a variable's in-base data:
//!
//! - **period percentiles**: one value per requested percentile per cell,
//!   pooled over the whole reference period;
//! - **day-of-year percentiles**: one value per 366-slot day of year per
//!   cell, pooled inside a centered window of neighbouring days across all
//!   reference years. Feb 29 is pooled directly: leap years contribute the
//!   day itself, every year contributes its window neighbours.
//!
//! Percentile estimation is the one eager step of the engine; it only ever
//! sorts the reference subset, never the full study series.
//!
//! The bootstrap decision for partially overlapping reference/study periods
//! lives here as well; the leave-one-year-out recomputation itself is driven
//! by threshold resolution.

use crate::calendar::DOY_SLOTS;
use crate::errors::{ClimError, ClimResult};
use crate::timeseries::{FloatValue, Timeseries};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Interpolation scheme used between order statistics.
///
/// The scheme changes numeric output and is reproduced exactly as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Interpolation {
    /// Hyndman & Fan type 7 (the "linear" scheme of numpy and R).
    Linear,
    /// Hyndman & Fan type 8, approximately median-unbiased regardless of the
    /// underlying distribution. The default for day-of-year percentiles.
    #[default]
    MedianUnbiased,
}

impl Interpolation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interpolation::Linear => "linear",
            Interpolation::MedianUnbiased => "median_unbiased",
        }
    }
}

/// Validate a percentile given in 0..=100.
pub fn check_percentile(percentile: f64) -> ClimResult<()> {
    if !(0.0..=100.0).contains(&percentile) || percentile.is_nan() {
        return Err(ClimError::InvalidPercentile { percentile });
    }
    Ok(())
}

/// Quantile of pre-sorted data at probability `prob` in [0, 1].
///
/// Expects sorted, finite input (callers filter NaN before sorting).
/// Returns NaN for empty input.
pub fn quantile(sorted: &[FloatValue], prob: f64, interpolation: Interpolation) -> FloatValue {
    let n = sorted.len();
    if n == 0 {
        return FloatValue::NAN;
    }
    if n == 1 {
        return sorted[0];
    }
    let nf = n as f64;
    // Zero-based fractional order statistic.
    let h = match interpolation {
        Interpolation::Linear => (nf - 1.0) * prob,
        Interpolation::MedianUnbiased => (nf + 1.0 / 3.0) * prob + 1.0 / 3.0 - 1.0,
    };
    let h = h.clamp(0.0, nf - 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    sorted[lo] + (h - h.floor()) * (sorted[hi] - sorted[lo])
}

fn sorted_finite(values: impl Iterator<Item = FloatValue>) -> Vec<FloatValue> {
    let mut v: Vec<FloatValue> = values.filter(|x| x.is_finite()).collect();
    v.sort_by(FloatValue::total_cmp);
    v
}

/// Period percentiles of a series: one value per percentile per cell.
///
/// Missing (NaN) values are ignored. Returns an array shaped
/// `(percentiles, cells)`.
pub fn period_percentiles(
    series: &Timeseries,
    percentiles: &[f64],
    interpolation: Interpolation,
) -> ClimResult<Array2<FloatValue>> {
    for &p in percentiles {
        check_percentile(p)?;
    }
    let mut out = Array2::from_elem((percentiles.len(), series.n_cells()), FloatValue::NAN);
    for cell in 0..series.n_cells() {
        let sorted = sorted_finite(series.cell(cell).iter().copied());
        for (pi, &p) in percentiles.iter().enumerate() {
            out[[pi, cell]] = quantile(&sorted, p / 100.0, interpolation);
        }
    }
    Ok(out)
}

/// A day-of-year percentile array: 366 slots per cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoyPercentiles {
    /// Values shaped `(366, cells)`; slots with no pooled data are NaN.
    pub values: Array2<FloatValue>,
    pub percentile: f64,
    pub window_width: usize,
}

/// Day-of-year percentiles of a reference series.
///
/// For each of the 366 day-of-year slots, values within a centered window of
/// `window_width` days (cyclic over the year) are pooled across all reference
/// years and the percentile is taken over the pool. For even window widths the
/// extra day is taken on the trailing side.
///
/// `exclude_year` supports the bootstrap procedure: samples from that year
/// are left out of every pool.
pub fn doy_percentiles(
    series: &Timeseries,
    percentile: f64,
    window_width: usize,
    interpolation: Interpolation,
    exclude_year: Option<i32>,
) -> ClimResult<DoyPercentiles> {
    check_percentile(percentile)?;
    if window_width == 0 || window_width > DOY_SLOTS {
        return Err(ClimError::InvalidWindow {
            window_width,
            series_len: series.len_time(),
        });
    }

    let lo = (window_width - 1) / 2;
    let hi = window_width / 2;
    let mut slot_indices: Vec<Vec<usize>> = vec![Vec::new(); DOY_SLOTS];
    for (i, date) in series.time().dates().iter().enumerate() {
        if Some(date.year) == exclude_year {
            continue;
        }
        // A day contributes to every slot whose window contains it,
        // i.e. slots doy-lo ..= doy+hi, cyclic over the year.
        let doy = date.doy_366();
        for off in 0..=(lo + hi) {
            let slot = (doy + DOY_SLOTS + off - lo) % DOY_SLOTS;
            slot_indices[slot].push(i);
        }
    }

    let values_view = series.values();
    let mut out = Array2::from_elem((DOY_SLOTS, series.n_cells()), FloatValue::NAN);
    for (slot, indices) in slot_indices.iter().enumerate() {
        if indices.is_empty() {
            continue;
        }
        for cell in 0..series.n_cells() {
            let sorted = sorted_finite(indices.iter().map(|&i| values_view[[i, cell]]));
            out[[slot, cell]] = quantile(&sorted, percentile / 100.0, interpolation);
        }
    }
    Ok(DoyPercentiles {
        values: out,
        percentile,
        window_width,
    })
}

/// Decide whether the bootstrap procedure is required and, if so, for which
/// years.
///
/// Bootstrap is required iff the reference and study year sets partially
/// overlap: `1 < |overlap| < |study|`. No overlap, full overlap, or a single
/// overlapping year all skip it. Returns the sorted overlapping years to
/// recompute with leave-one-year-out, or `None`.
pub fn bootstrap_overlap(reference_years: &[i32], study_years: &[i32]) -> Option<Vec<i32>> {
    let mut overlap: Vec<i32> = reference_years
        .iter()
        .copied()
        .filter(|y| study_years.contains(y))
        .collect();
    overlap.sort_unstable();
    overlap.dedup();

    let mut study: Vec<i32> = study_years.to_vec();
    study.sort_unstable();
    study.dedup();

    if overlap.len() > 1 && overlap.len() < study.len() {
        Some(overlap)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{CalDate, Calendar, TimeAxis};
    use is_close::is_close;
    use std::sync::Arc;

    fn daily_series(year: i32, values: Vec<FloatValue>) -> Timeseries {
        let cal = Calendar::ProlepticGregorian;
        let axis = Arc::new(
            TimeAxis::daily(cal, CalDate::new(year, 1, 1, cal).unwrap(), values.len()).unwrap(),
        );
        Timeseries::from_values(values, axis, "degC").unwrap()
    }

    #[test]
    fn quantile_linear_matches_type7() {
        let sorted: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        // R: quantile(1:10, 0.3, type=7) = 3.7
        assert!(is_close!(quantile(&sorted, 0.3, Interpolation::Linear), 3.7));
        assert!(is_close!(quantile(&sorted, 0.0, Interpolation::Linear), 1.0));
        assert!(is_close!(quantile(&sorted, 1.0, Interpolation::Linear), 10.0));
    }

    #[test]
    fn quantile_median_unbiased_matches_type8() {
        let sorted: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        // R: quantile(1:10, 0.3, type=8) = 3.433333
        let q = quantile(&sorted, 0.3, Interpolation::MedianUnbiased);
        assert!(is_close!(q, 3.433333, abs_tol = 1e-5));
        // Extremes clamp to the data range.
        assert!(is_close!(
            quantile(&sorted, 0.0, Interpolation::MedianUnbiased),
            1.0
        ));
        assert!(is_close!(
            quantile(&sorted, 1.0, Interpolation::MedianUnbiased),
            10.0
        ));
    }

    #[test]
    fn quantile_degenerate_inputs() {
        assert!(quantile(&[], 0.5, Interpolation::Linear).is_nan());
        assert_eq!(quantile(&[4.2], 0.9, Interpolation::MedianUnbiased), 4.2);
    }

    #[test]
    fn constant_series_percentiles_equal_the_constant() {
        // Every percentile of a constant series is that constant, for both
        // interpolation schemes.
        let series = daily_series(2000, vec![7.5; 366]);
        for interp in [Interpolation::Linear, Interpolation::MedianUnbiased] {
            let period = period_percentiles(&series, &[10.0, 50.0, 90.0], interp).unwrap();
            assert!(period.iter().all(|&v| v == 7.5));
            let doy = doy_percentiles(&series, 90.0, 5, interp, None).unwrap();
            // All 366 slots are populated by a full leap year of data.
            assert!(doy.values.iter().all(|&v| v == 7.5));
        }
    }

    #[test]
    fn period_percentiles_ignore_nan() {
        let mut values: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        values.push(f64::NAN);
        let series = daily_series(2001, values);
        let out = period_percentiles(&series, &[50.0], Interpolation::Linear).unwrap();
        assert!(is_close!(out[[0, 0]], 5.5));
    }

    #[test]
    fn invalid_percentile_rejected() {
        let series = daily_series(2001, vec![1.0, 2.0]);
        assert!(period_percentiles(&series, &[101.0], Interpolation::Linear).is_err());
        assert!(doy_percentiles(&series, -1.0, 5, Interpolation::Linear, None).is_err());
        assert!(doy_percentiles(&series, 90.0, 0, Interpolation::Linear, None).is_err());
    }

    #[test]
    fn doy_window_pools_neighbouring_days() {
        // Non-leap year, day i has value i. With window 5 the slot for
        // Jan 10 (doy_366 = 9) pools days 8..=12 (values 8..=12).
        let values: Vec<f64> = (1..=365).map(|x| x as f64).collect();
        let series = daily_series(2001, values);
        let doy = doy_percentiles(&series, 50.0, 5, Interpolation::Linear, None).unwrap();
        assert!(is_close!(doy.values[[9, 0]], 10.0));
        // Feb 29 slot (59) has no direct samples in a non-leap year but is
        // still populated from its window neighbours Feb 27, 28 and
        // Mar 1, 2 (values 58, 59, 60, 61).
        assert!(is_close!(doy.values[[59, 0]], 59.5));
    }

    #[test]
    fn doy_exclusion_drops_a_year() {
        // Two years: 2001 all 10.0, 2002 all 20.0.
        let mut values = vec![10.0; 365];
        values.extend(vec![20.0; 365]);
        let series = daily_series(2001, values);
        let all = doy_percentiles(&series, 50.0, 5, Interpolation::Linear, None).unwrap();
        assert!(is_close!(all.values[[100, 0]], 15.0));
        let loo = doy_percentiles(&series, 50.0, 5, Interpolation::Linear, Some(2002)).unwrap();
        assert!(is_close!(loo.values[[100, 0]], 10.0));
    }

    #[test]
    fn bootstrap_trigger_boundary() {
        // Full overlap: no bootstrap.
        assert!(bootstrap_overlap(&[2000, 2001, 2002], &[2000, 2001, 2002]).is_none());
        // Single overlapping year: no bootstrap.
        assert!(bootstrap_overlap(&[2000, 2001, 2002], &[2002, 2003, 2004]).is_none());
        // No overlap: no bootstrap.
        assert!(bootstrap_overlap(&[1990, 1991], &[2000, 2001]).is_none());
        // Two of three study years overlap: bootstrap those two.
        assert_eq!(
            bootstrap_overlap(&[2000, 2001, 2002], &[2001, 2002, 2003]),
            Some(vec![2001, 2002])
        );
    }
}
