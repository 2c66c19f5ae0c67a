pub mod calendar;
pub mod frequency;
pub mod indicators;
pub mod percentile;
pub mod threshold;
pub mod timeseries;
pub mod units;

pub mod errors;

pub use calendar::{CalDate, Calendar, TimeAxis};
pub use errors::{ClimError, ClimResult, ErrorKind};
pub use frequency::{Frequency, Period};
pub use threshold::{LogicalOperation, Threshold};
pub use timeseries::{ClimateVariable, FloatValue, Timeseries};
