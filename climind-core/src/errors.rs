use thiserror::Error;

/// Coarse error taxonomy exposed to callers.
///
/// Callers branch on this: `MissingInput` means a parameter required by the
/// selected operation was not supplied, everything else is a malformed or
/// unsupported configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    MissingInput,
}

/// Error type for invalid operations.
///
/// All variants are raised at configuration or resolution time, before any
/// per-period reduction starts.
#[derive(Error, Debug)]
pub enum ClimError {
    #[error("unknown frequency token '{token}'; accepted tokens are {accepted}")]
    UnknownFrequency { token: String, accepted: String },

    #[error("season months {months:?} do not form a consecutive run of calendar months")]
    NonConsecutiveSeasonMonths { months: Vec<u8> },

    #[error("invalid date {year:04}-{month:02}-{day:02} for calendar {calendar}")]
    InvalidDate {
        year: i32,
        month: u8,
        day: u8,
        calendar: String,
    },

    #[error("invalid month-day '{token}'; expected 'MM-DD'")]
    InvalidMonthDay { token: String },

    #[error("time axis is empty")]
    EmptyTimeAxis,

    #[error("time axis is not strictly increasing at index {index}")]
    NonMonotonicTimeAxis { index: usize },

    #[error("reference period {start}..={end} leaves no data after clipping")]
    EmptyReferencePeriod { start: i32, end: i32 },

    #[error("{context}: expected {expected}, got {got}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        got: usize,
    },

    #[error("cannot convert '{from}' to '{to}': incompatible dimensions")]
    IncompatibleUnits { from: String, to: String },

    #[error("unknown unit '{unit}'")]
    UnknownUnit { unit: String },

    #[error("operation '{operation}' expects {expected} variable(s), got {got}")]
    WrongVariableCount {
        operation: String,
        expected: String,
        got: usize,
    },

    #[error("percentile {percentile} is outside the valid range 0..=100")]
    InvalidPercentile { percentile: f64 },

    #[error("rolling window width {window_width} is invalid for a series of {series_len} steps")]
    InvalidWindow {
        window_width: usize,
        series_len: usize,
    },

    #[error("operation '{operation}' does not accept this threshold: {reason}")]
    InvalidThresholdForOperation { operation: String, reason: String },

    #[error(
        "event configuration is inconsistent: {operations} logical operation(s), \
         {thresholds} threshold(s), {variables} variable(s)"
    )]
    MismatchedEventConfig {
        operations: usize,
        thresholds: usize,
        variables: usize,
    },

    #[error("unknown calculation operation '{name}'; accepted operations are {accepted}")]
    UnknownOperation { name: String, accepted: String },

    #[error("unknown logical operation '{token}'; accepted are >, >=, <, <=, ==, !=")]
    UnknownLogicalOperation { token: String },

    #[error("operation '{operation}' requires parameter '{parameter}'")]
    MissingParameter {
        operation: String,
        parameter: String,
    },

    #[error("could not parse index configuration: {message}")]
    ConfigParse { message: String },
}

impl ClimError {
    /// Which of the two top-level error kinds this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClimError::MissingParameter { .. } => ErrorKind::MissingInput,
            _ => ErrorKind::InvalidArgument,
        }
    }
}

/// Convenience type for `Result<T, ClimError>`.
pub type ClimResult<T> = Result<T, ClimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_parameter_is_missing_input() {
        let e = ClimError::MissingParameter {
            operation: "anomaly".to_string(),
            parameter: "reference period".to_string(),
        };
        assert_eq!(e.kind(), ErrorKind::MissingInput);
        assert_eq!(
            e.to_string(),
            "operation 'anomaly' requires parameter 'reference period'"
        );
    }

    #[test]
    fn configuration_errors_are_invalid_argument() {
        let e = ClimError::UnknownFrequency {
            token: "decade".to_string(),
            accepted: "year, month".to_string(),
        };
        assert_eq!(e.kind(), ErrorKind::InvalidArgument);

        let e = ClimError::WrongVariableCount {
            operation: "mean_of_difference".to_string(),
            expected: "2".to_string(),
            got: 1,
        };
        assert_eq!(e.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_impl<T: Send + Sync>() {}
        assert_impl::<ClimError>();
    }
}
