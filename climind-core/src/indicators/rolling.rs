//! Rolling-window extremes: per-period max/min of a rolled series.
//!
//! The rolling aggregate is **centered**: position `t` covers
//! `t - (w-1)/2 ..= t + w/2`. Positions where the window leaves the series
//! bounds are NaN (the window never wraps or truncates silently) and NaN
//! positions are skipped by the per-period extreme.

use super::IndicatorOutput;
use crate::errors::{ClimError, ClimResult};
use crate::frequency::Frequency;
use crate::timeseries::{ClimateVariable, FloatValue};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// The rolling aggregate applied before the per-period extreme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollingAgg {
    Sum,
    Mean,
}

/// Which extreme of the rolled series to report per period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtremeMode {
    Max,
    Min,
}

impl ExtremeMode {
    pub fn parse(token: &str) -> ClimResult<Self> {
        match token {
            "max" => Ok(ExtremeMode::Max),
            "min" => Ok(ExtremeMode::Min),
            _ => Err(ClimError::ConfigParse {
                message: format!("unknown extreme mode '{token}'; accepted are 'max', 'min'"),
            }),
        }
    }
}

/// Centered rolling aggregate of one cell. A window containing any missing
/// value yields NaN for that position.
fn rolled_cell(
    values: &[FloatValue],
    window_width: usize,
    agg: RollingAgg,
) -> Vec<FloatValue> {
    let n = values.len();
    let lo = (window_width - 1) / 2;
    let hi = window_width / 2;
    let mut out = vec![FloatValue::NAN; n];
    for t in lo..n.saturating_sub(hi) {
        let window = &values[t - lo..=t + hi];
        if window.iter().any(|v| !v.is_finite()) {
            continue;
        }
        let sum: FloatValue = window.iter().sum();
        out[t] = match agg {
            RollingAgg::Sum => sum,
            RollingAgg::Mean => sum / window_width as FloatValue,
        };
    }
    out
}

/// Per-period extreme of a rolling aggregate.
pub fn rolling_extreme(
    variable: &ClimateVariable,
    agg: RollingAgg,
    mode: ExtremeMode,
    window_width: usize,
    frequency: &Frequency,
) -> ClimResult<IndicatorOutput> {
    let series = variable.series();
    if window_width == 0 || window_width > series.len_time() {
        return Err(ClimError::InvalidWindow {
            window_width,
            series_len: series.len_time(),
        });
    }
    let periods = frequency.split(series.time())?;

    let mut values = Array2::from_elem((periods.len(), series.n_cells()), FloatValue::NAN);
    for cell in 0..series.n_cells() {
        let rolled = rolled_cell(&series.cell(cell).to_vec(), window_width, agg);
        for (pi, period) in periods.iter().enumerate() {
            let extreme = period
                .indices
                .iter()
                .map(|&i| rolled[i])
                .filter(|v| v.is_finite())
                .fold(FloatValue::NAN, |acc, v| {
                    if acc.is_nan() {
                        v
                    } else {
                        match mode {
                            ExtremeMode::Max => acc.max(v),
                            ExtremeMode::Min => acc.min(v),
                        }
                    }
                });
            values[[pi, cell]] = extreme;
        }
    }

    Ok(IndicatorOutput {
        values,
        periods,
        unit: series.unit().to_string(),
        event_dates: None,
    })
}
