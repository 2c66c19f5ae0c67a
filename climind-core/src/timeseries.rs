//! Gridded time series and climate variables.
//!
//! All data flowing through the engine is a [`Timeseries`]: an
//! `Array2<FloatValue>` shaped `(time, cell)` plus a shared [`TimeAxis`] and a
//! unit string. A [`ClimateVariable`] couples the full "study" series with its
//! reference ("in-base") subset used for percentile calibration.

use crate::calendar::TimeAxis;
use crate::errors::{ClimError, ClimResult};
use crate::threshold::Threshold;
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The floating point type used for all values.
pub type FloatValue = f64;

/// Sampling frequency of the source data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SourceFrequency {
    #[default]
    Daily,
    Monthly,
}

/// A time-indexed block of values over an arbitrary number of grid cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeseries {
    values: Array2<FloatValue>,
    time: Arc<TimeAxis>,
    unit: String,
}

impl Timeseries {
    /// Create a new timeseries. The number of rows must match the axis length.
    pub fn new(
        values: Array2<FloatValue>,
        time: Arc<TimeAxis>,
        unit: impl Into<String>,
    ) -> ClimResult<Self> {
        if values.nrows() != time.len() {
            return Err(ClimError::ShapeMismatch {
                context: "timeseries values".to_string(),
                expected: time.len(),
                got: values.nrows(),
            });
        }
        Ok(Self {
            values,
            time,
            unit: unit.into(),
        })
    }

    /// Convenience constructor for a single-cell series.
    pub fn from_values(
        values: Vec<FloatValue>,
        time: Arc<TimeAxis>,
        unit: impl Into<String>,
    ) -> ClimResult<Self> {
        let n = values.len();
        let values = Array2::from_shape_vec((n, 1), values).expect("vec length matches shape");
        Self::new(values, time, unit)
    }

    pub fn values(&self) -> &Array2<FloatValue> {
        &self.values
    }

    pub fn time(&self) -> &TimeAxis {
        &self.time
    }

    pub fn time_arc(&self) -> Arc<TimeAxis> {
        Arc::clone(&self.time)
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn len_time(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_cells(&self) -> usize {
        self.values.ncols()
    }

    /// Values of one grid cell over time.
    pub fn cell(&self, cell: usize) -> ArrayView1<'_, FloatValue> {
        self.values.column(cell)
    }

    /// A copy with every value multiplied by `coef`. The unit is kept; the
    /// caller owns the semantics of the scaling.
    pub fn scaled(&self, coef: FloatValue) -> Self {
        Self {
            values: &self.values * coef,
            time: Arc::clone(&self.time),
            unit: self.unit.clone(),
        }
    }

    /// Restrict the series to `start_year..=end_year`.
    pub fn select_years(&self, start_year: i32, end_year: i32) -> ClimResult<Self> {
        let indices = self.time.year_indices(start_year, end_year);
        if indices.is_empty() {
            return Err(ClimError::EmptyReferencePeriod {
                start: start_year,
                end: end_year,
            });
        }
        let dates = indices.iter().map(|&i| self.time.get(i)).collect();
        let axis = TimeAxis::from_dates(self.time.calendar(), dates)?;
        let values = self.values.select(Axis(0), &indices);
        Ok(Self {
            values,
            time: Arc::new(axis),
            unit: self.unit.clone(),
        })
    }
}

/// A physical variable ready for index computation.
///
/// Couples the studied series with its in-base (reference) subset. The two
/// share all non-time dimensions; when no explicit reference period is given
/// the in-base data equals the studied data. Immutable after construction,
/// except for threshold attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateVariable {
    pub name: String,
    pub standard_name: String,
    pub source_frequency: SourceFrequency,
    series: Timeseries,
    in_base: Timeseries,
    threshold: Option<Threshold>,
    explicit_reference: bool,
}

impl ClimateVariable {
    pub fn new(
        name: impl Into<String>,
        standard_name: impl Into<String>,
        series: Timeseries,
    ) -> Self {
        Self {
            name: name.into(),
            standard_name: standard_name.into(),
            source_frequency: SourceFrequency::Daily,
            in_base: series.clone(),
            series,
            threshold: None,
            explicit_reference: false,
        }
    }

    /// Clip the in-base data to `start_year..=end_year`.
    ///
    /// An empty result after clipping is a fatal configuration error.
    pub fn with_reference_period(mut self, start_year: i32, end_year: i32) -> ClimResult<Self> {
        self.in_base = self.series.select_years(start_year, end_year)?;
        self.explicit_reference = true;
        Ok(self)
    }

    /// Attach a threshold to compare this variable against.
    pub fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn series(&self) -> &Timeseries {
        &self.series
    }

    pub fn in_base(&self) -> &Timeseries {
        &self.in_base
    }

    pub fn threshold(&self) -> Option<&Threshold> {
        self.threshold.as_ref()
    }

    /// Whether an explicit reference period was configured.
    pub fn has_explicit_reference(&self) -> bool {
        self.explicit_reference
    }

    /// Distinct years of the studied series.
    pub fn study_years(&self) -> Vec<i32> {
        self.series.time().years()
    }

    /// Distinct years of the in-base series.
    pub fn reference_years(&self) -> Vec<i32> {
        self.in_base.time().years()
    }

    /// First and last year of the in-base series.
    pub fn reference_period(&self) -> (i32, i32) {
        (
            self.in_base.time().first().year,
            self.in_base.time().last().year,
        )
    }

    /// A copy with the studied and in-base values scaled by `coef`.
    pub fn scaled(&self, coef: FloatValue) -> Self {
        Self {
            series: self.series.scaled(coef),
            in_base: self.in_base.scaled(coef),
            ..self.clone()
        }
    }
}
