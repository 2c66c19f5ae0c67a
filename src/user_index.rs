//! User-defined index dispatcher.
//!
//! Maps a small declarative configuration (a stable operation name plus
//! parameters) onto one typed operation, validating the per-operation
//! required parameters strictly before dispatch. A missing required
//! parameter is a `MissingInput` error; an unknown operation name or a
//! wrongly-typed parameter is `InvalidArgument`. Callers branch on the
//! distinction.

use climind_core::errors::{ClimError, ClimResult};
use climind_core::indicators::{ExtremeMode, LinkOperation, ReduceOp, RollingAgg};
use climind_core::threshold::{LogicalOperation, Threshold};
use serde::{Deserialize, Serialize};

/// Every operation name the dispatcher accepts, in registry order.
pub const CALC_OPERATIONS: &[&str] = &[
    "max",
    "min",
    "sum",
    "mean",
    "nb_events",
    "max_nb_consecutive_events",
    "run_mean",
    "run_sum",
    "anomaly",
];

/// A threshold parameter: one value or a list of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdInput {
    Single(f64),
    Multi(Vec<f64>),
}

impl ThresholdInput {
    fn into_threshold(self) -> Threshold {
        match self {
            ThresholdInput::Single(value) => Threshold::Scalar { value, unit: None },
            ThresholdInput::Multi(values) => Threshold::MultiValue { values, unit: None },
        }
    }
}

/// Raw user-index configuration as deserialized from a config file.
///
/// Which optional fields are required depends on `calc_operation`;
/// [`UserIndex::build`] enforces that before any dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UserIndexConfig {
    pub index_name: String,
    pub calc_operation: String,
    #[serde(default)]
    pub logical_operation: Option<String>,
    #[serde(default)]
    pub link_logical_operations: Option<String>,
    #[serde(default)]
    pub thresh: Option<ThresholdInput>,
    #[serde(default)]
    pub extreme_mode: Option<String>,
    #[serde(default)]
    pub window_width: Option<usize>,
    #[serde(default)]
    pub coef: Option<f64>,
    #[serde(default)]
    pub date_event: Option<bool>,
    #[serde(default)]
    pub percent: Option<bool>,
    /// Reference period for `anomaly`, as `(start_year, end_year)`.
    #[serde(default)]
    pub reference_period: Option<(i32, i32)>,
}

impl UserIndexConfig {
    /// Parse a configuration from a TOML document.
    pub fn from_toml(document: &str) -> ClimResult<Self> {
        toml::from_str(document).map_err(|e| ClimError::ConfigParse {
            message: e.to_string(),
        })
    }
}

/// A fully validated user-defined index: one variant per operation, each
/// carrying exactly the parameters that operation needs.
#[derive(Debug, Clone, PartialEq)]
pub enum UserIndex {
    Reduce {
        op: ReduceOp,
        filter: Option<(LogicalOperation, Threshold)>,
        coef: Option<f64>,
    },
    NbEvents {
        operation: LogicalOperation,
        thresholds: Vec<Threshold>,
        link: Option<LinkOperation>,
        date_event: bool,
    },
    MaxConsecutiveEvents {
        operation: LogicalOperation,
        threshold: Threshold,
        date_event: bool,
    },
    RollingExtreme {
        agg: RollingAgg,
        mode: ExtremeMode,
        window_width: usize,
        coef: Option<f64>,
    },
    Anomaly {
        reference_period: Option<(i32, i32)>,
        percent: bool,
    },
}

fn missing(operation: &str, parameter: &str) -> ClimError {
    ClimError::MissingParameter {
        operation: operation.to_string(),
        parameter: parameter.to_string(),
    }
}

impl UserIndex {
    /// Validate a raw configuration against its operation's requirements.
    ///
    /// `n_variables` is the number of climate variables the caller will
    /// supply; arity rules that depend on it are checked here rather than at
    /// compute time.
    pub fn build(config: &UserIndexConfig, n_variables: usize) -> ClimResult<Self> {
        let op = config.calc_operation.as_str();
        match op {
            "max" | "min" | "sum" | "mean" => {
                if n_variables != 1 {
                    return Err(ClimError::WrongVariableCount {
                        operation: op.to_string(),
                        expected: "1".to_string(),
                        got: n_variables,
                    });
                }
                let reduce_op = match op {
                    "max" => ReduceOp::Max,
                    "min" => ReduceOp::Min,
                    "sum" => ReduceOp::Sum,
                    _ => ReduceOp::Mean,
                };
                let filter = match (&config.logical_operation, &config.thresh) {
                    (Some(token), Some(thresh)) => Some((
                        LogicalOperation::parse(token)?,
                        thresh.clone().into_threshold(),
                    )),
                    (Some(_), None) => return Err(missing(op, "thresh")),
                    (None, Some(_)) => return Err(missing(op, "logical_operation")),
                    (None, None) => None,
                };
                Ok(UserIndex::Reduce {
                    op: reduce_op,
                    filter,
                    coef: config.coef,
                })
            }
            "nb_events" => {
                let operation = config
                    .logical_operation
                    .as_deref()
                    .ok_or_else(|| missing(op, "logical_operation"))
                    .and_then(LogicalOperation::parse)?;
                let thresh = config
                    .thresh
                    .clone()
                    .ok_or_else(|| missing(op, "thresh"))?;
                // A list of threshold values becomes one event pair per value
                // on the same variable, combined with the link operator.
                let thresholds: Vec<Threshold> = match thresh {
                    ThresholdInput::Single(value) => {
                        vec![Threshold::Scalar { value, unit: None }]
                    }
                    ThresholdInput::Multi(values) => values
                        .into_iter()
                        .map(|value| Threshold::Scalar { value, unit: None })
                        .collect(),
                };
                let link = config
                    .link_logical_operations
                    .as_deref()
                    .map(LinkOperation::parse)
                    .transpose()?;
                if thresholds.len().max(n_variables) > 1 && link.is_none() {
                    return Err(missing(op, "link_logical_operations"));
                }
                Ok(UserIndex::NbEvents {
                    operation,
                    thresholds,
                    link,
                    date_event: config.date_event.unwrap_or(false),
                })
            }
            "max_nb_consecutive_events" => {
                let operation = config
                    .logical_operation
                    .as_deref()
                    .ok_or_else(|| missing(op, "logical_operation"))
                    .and_then(LogicalOperation::parse)?;
                let threshold = match config.thresh.clone() {
                    Some(ThresholdInput::Single(value)) => Threshold::Scalar { value, unit: None },
                    Some(ThresholdInput::Multi(_)) => {
                        return Err(ClimError::InvalidThresholdForOperation {
                            operation: op.to_string(),
                            reason: "a list of threshold values is not supported, supply one value"
                                .to_string(),
                        })
                    }
                    None => return Err(missing(op, "thresh")),
                };
                Ok(UserIndex::MaxConsecutiveEvents {
                    operation,
                    threshold,
                    date_event: config.date_event.unwrap_or(false),
                })
            }
            "run_mean" | "run_sum" => {
                let mode = config
                    .extreme_mode
                    .as_deref()
                    .ok_or_else(|| missing(op, "extreme_mode"))
                    .and_then(ExtremeMode::parse)?;
                let window_width = config
                    .window_width
                    .ok_or_else(|| missing(op, "window_width"))?;
                let agg = if op == "run_mean" {
                    RollingAgg::Mean
                } else {
                    RollingAgg::Sum
                };
                Ok(UserIndex::RollingExtreme {
                    agg,
                    mode,
                    window_width,
                    coef: config.coef,
                })
            }
            "anomaly" => {
                // A second variable can stand in for the reference series, so
                // the period is only required when a single variable is given.
                if n_variables < 2 && config.reference_period.is_none() {
                    return Err(missing(op, "reference_period"));
                }
                Ok(UserIndex::Anomaly {
                    reference_period: config.reference_period,
                    percent: config.percent.unwrap_or(false),
                })
            }
            unknown => Err(ClimError::UnknownOperation {
                name: unknown.to_string(),
                accepted: CALC_OPERATIONS.join(", "),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use climind_core::errors::ErrorKind;

    fn config(op: &str) -> UserIndexConfig {
        UserIndexConfig {
            index_name: "my_index".to_string(),
            calc_operation: op.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn every_registered_operation_builds() {
        for &op in CALC_OPERATIONS {
            let mut cfg = config(op);
            cfg.logical_operation = Some(">".to_string());
            cfg.thresh = Some(ThresholdInput::Single(25.0));
            cfg.extreme_mode = Some("max".to_string());
            cfg.window_width = Some(5);
            cfg.reference_period = Some((1991, 2000));
            assert!(UserIndex::build(&cfg, 1).is_ok(), "operation {op}");
        }
    }

    #[test]
    fn unknown_operation_is_invalid_argument() {
        let err = UserIndex::build(&config("p99"), 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("nb_events"));
    }

    #[test]
    fn missing_parameters_are_missing_input() {
        let err = UserIndex::build(&config("run_mean"), 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingInput);

        let mut cfg = config("run_sum");
        cfg.extreme_mode = Some("min".to_string());
        let err = UserIndex::build(&cfg, 1).unwrap_err();
        assert!(matches!(
            err,
            ClimError::MissingParameter { ref parameter, .. } if parameter == "window_width"
        ));

        let err = UserIndex::build(&config("nb_events"), 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingInput);

        let err = UserIndex::build(&config("anomaly"), 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingInput);
    }

    #[test]
    fn anomaly_accepts_a_second_variable_instead_of_a_period() {
        assert!(UserIndex::build(&config("anomaly"), 2).is_ok());
    }

    #[test]
    fn reducers_require_exactly_one_variable() {
        let err = UserIndex::build(&config("mean"), 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(matches!(err, ClimError::WrongVariableCount { got: 2, .. }));
    }

    #[test]
    fn consecutive_events_reject_threshold_lists() {
        let mut cfg = config("max_nb_consecutive_events");
        cfg.logical_operation = Some(">".to_string());
        cfg.thresh = Some(ThresholdInput::Multi(vec![20.0, 25.0]));
        let err = UserIndex::build(&cfg, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn multi_threshold_events_need_a_link() {
        let mut cfg = config("nb_events");
        cfg.logical_operation = Some(">".to_string());
        cfg.thresh = Some(ThresholdInput::Multi(vec![20.0, 25.0]));
        let err = UserIndex::build(&cfg, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingInput);

        cfg.link_logical_operations = Some("or".to_string());
        let built = UserIndex::build(&cfg, 1).unwrap();
        assert!(matches!(
            built,
            UserIndex::NbEvents { ref thresholds, link: Some(LinkOperation::Or), .. }
                if thresholds.len() == 2
        ));
    }

    #[test]
    fn partial_filter_on_a_reducer_is_missing_input() {
        let mut cfg = config("mean");
        cfg.logical_operation = Some(">".to_string());
        let err = UserIndex::build(&cfg, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingInput);
    }

    #[test]
    fn config_survives_serialization() {
        let mut cfg = config("nb_events");
        cfg.logical_operation = Some(">".to_string());
        cfg.thresh = Some(ThresholdInput::Multi(vec![20.0, 25.0]));
        cfg.link_logical_operations = Some("or".to_string());
        let json = serde_json::to_string(&cfg).unwrap();
        let back: UserIndexConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn toml_round_trip() {
        let cfg = UserIndexConfig::from_toml(
            r#"
            index_name = "warm_days"
            calc_operation = "nb_events"
            logical_operation = ">"
            thresh = 25.0
            date_event = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.index_name, "warm_days");
        assert_eq!(cfg.thresh, Some(ThresholdInput::Single(25.0)));
        assert!(UserIndex::build(&cfg, 1).is_ok());

        let err = UserIndexConfig::from_toml("calc_operation = 3").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
