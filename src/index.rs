//! Index orchestration: assemble variables, resolve thresholds and dispatch
//! to one indicator operator.
//!
//! [`compute`] is a pure function of its inputs; running it twice on
//! identical inputs yields bit-identical output. All configuration errors
//! (arity, missing thresholds, mismatched event setups) surface before any
//! per-period reduction starts.

use climind_core::errors::{ClimError, ClimResult};
use climind_core::frequency::Frequency;
use climind_core::indicators::{
    count_occurrences, deficit, difference_of_extremes, difference_of_means, excess,
    expect_variable_count, fraction_of_total, max_consecutive_occurrence,
    mean_of_absolute_one_timestep_difference, mean_of_difference, reduce, rolling_extreme,
    sum_of_spell_lengths, EventPair, ExtremeMode, IndicatorOutput, LinkOperation, NbEventConfig,
    ReduceOp, RollingAgg, ThresholdFilter,
};
use climind_core::percentile::Interpolation;
use climind_core::threshold::{LogicalOperation, Resolution, ResolvedThreshold};
use climind_core::timeseries::ClimateVariable;
use log::debug;

use crate::user_index::{UserIndex, UserIndexConfig};

/// The operator to dispatch to, with its operator-specific parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    CountOccurrences {
        /// One comparison per event pair; a single entry is reused for all.
        operations: Vec<LogicalOperation>,
        link: Option<LinkOperation>,
        date_event: bool,
    },
    MaxConsecutiveOccurrence {
        operation: LogicalOperation,
        date_event: bool,
    },
    SumOfSpellLengths {
        operation: LogicalOperation,
        min_length: usize,
    },
    Reduce {
        op: ReduceOp,
        filter: Option<LogicalOperation>,
    },
    Excess,
    Deficit,
    FractionOfTotal {
        operation: LogicalOperation,
    },
    RollingExtreme {
        agg: RollingAgg,
        mode: ExtremeMode,
        window_width: usize,
    },
    MeanOfDifference,
    DifferenceOfExtremes,
    MeanOfAbsoluteOneTimestepDifference,
    Anomaly {
        percent: bool,
    },
}

impl Operator {
    fn name(&self) -> &'static str {
        match self {
            Operator::CountOccurrences { .. } => "nb_events",
            Operator::MaxConsecutiveOccurrence { .. } => "max_nb_consecutive_events",
            Operator::SumOfSpellLengths { .. } => "sum_of_spell_lengths",
            Operator::Reduce { op, .. } => op.as_str(),
            Operator::Excess => "excess",
            Operator::Deficit => "deficit",
            Operator::FractionOfTotal { .. } => "fraction_of_total",
            Operator::RollingExtreme { .. } => "rolling_extreme",
            Operator::MeanOfDifference => "mean_of_difference",
            Operator::DifferenceOfExtremes => "difference_of_extremes",
            Operator::MeanOfAbsoluteOneTimestepDifference => {
                "mean_of_absolute_one_timestep_difference"
            }
            Operator::Anomaly { .. } => "anomaly",
        }
    }
}

/// A complete index computation request.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    pub index_name: String,
    pub operator: Operator,
    pub frequency: Frequency,
    pub interpolation: Interpolation,
    /// Multiplier applied to every variable before computation.
    pub coef: Option<f64>,
}

/// The reproducibility record attached to every result, consumed by the
/// external CF-metadata collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMetadata {
    pub index_name: String,
    pub interpolation: Interpolation,
    /// Whether the leave-one-year-out bootstrap ran for any threshold.
    pub bootstrapped: bool,
    /// Reference period of the percentile calibration, when one was used.
    pub reference_period: Option<(i32, i32)>,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexResult {
    pub output: IndicatorOutput,
    pub metadata: IndexMetadata,
}

fn missing(operation: &str, parameter: &str) -> ClimError {
    ClimError::MissingParameter {
        operation: operation.to_string(),
        parameter: parameter.to_string(),
    }
}

/// Resolve the threshold attached to a variable, or fail naming the gap.
fn resolve_required(
    operation: &str,
    variable: &ClimateVariable,
    interpolation: Interpolation,
) -> ClimResult<Resolution> {
    variable
        .threshold()
        .ok_or_else(|| missing(operation, "thresh"))?
        .resolve(variable, interpolation)
}

/// Track the bootstrap flag and reference period across resolutions.
#[derive(Default)]
struct ResolutionRecord {
    bootstrapped: bool,
    reference_period: Option<(i32, i32)>,
}

impl ResolutionRecord {
    fn absorb(&mut self, resolution: &Resolution) {
        self.bootstrapped |= resolution.bootstrapped;
        if self.reference_period.is_none() {
            self.reference_period = resolution.reference_period;
        }
    }
}

/// Compute an index over the supplied climate variables.
pub fn compute(config: &IndexConfig, variables: &[ClimateVariable]) -> ClimResult<IndexResult> {
    let scaled: Vec<ClimateVariable>;
    let variables: &[ClimateVariable] = match config.coef {
        Some(coef) => {
            scaled = variables.iter().map(|v| v.scaled(coef)).collect();
            &scaled
        }
        None => variables,
    };
    debug!(
        "computing index '{}' with operator '{}' over {} variable(s)",
        config.index_name,
        config.operator.name(),
        variables.len()
    );

    let mut record = ResolutionRecord::default();
    let output = dispatch(config, variables, &mut record)?;

    let metadata = IndexMetadata {
        index_name: config.index_name.clone(),
        interpolation: config.interpolation,
        bootstrapped: record.bootstrapped,
        reference_period: record.reference_period,
        unit: output.unit.clone(),
    };
    Ok(IndexResult { output, metadata })
}

fn dispatch(
    config: &IndexConfig,
    variables: &[ClimateVariable],
    record: &mut ResolutionRecord,
) -> ClimResult<IndicatorOutput> {
    let name = config.operator.name();
    let interpolation = config.interpolation;
    match &config.operator {
        Operator::CountOccurrences {
            operations,
            link,
            date_event,
        } => {
            if variables.is_empty() {
                return Err(ClimError::WrongVariableCount {
                    operation: name.to_string(),
                    expected: "at least 1".to_string(),
                    got: 0,
                });
            }
            // Each variable contributes one event pair. A variable whose
            // threshold resolves to a value list contributes one pair per
            // value instead, all sharing that variable's comparison.
            let mut resolutions = Vec::new();
            for variable in variables {
                resolutions.push(resolve_required(name, variable, interpolation)?);
            }
            let mut expanded: Vec<(usize, ResolvedThreshold)> = Vec::new();
            for (vi, resolution) in resolutions.iter().enumerate() {
                record.absorb(resolution);
                match &resolution.threshold {
                    ResolvedThreshold::PerValue(values) => {
                        for &value in values {
                            expanded.push((vi, ResolvedThreshold::Scalar(value)));
                        }
                    }
                    other => expanded.push((vi, other.clone())),
                }
            }
            if operations.len() != 1 && operations.len() != expanded.len() {
                return Err(ClimError::MismatchedEventConfig {
                    operations: operations.len(),
                    thresholds: expanded.len(),
                    variables: variables.len(),
                });
            }
            let pairs = expanded
                .iter()
                .enumerate()
                .map(|(i, (vi, threshold))| EventPair {
                    variable: &variables[*vi],
                    operation: if operations.len() == 1 {
                        operations[0]
                    } else {
                        operations[i]
                    },
                    threshold,
                })
                .collect();
            let event_config = NbEventConfig { pairs, link: *link };
            count_occurrences(&event_config, &config.frequency, *date_event)
        }
        Operator::MaxConsecutiveOccurrence {
            operation,
            date_event,
        } => {
            expect_variable_count(name, 1, variables.len())?;
            let resolution = resolve_required(name, &variables[0], interpolation)?;
            record.absorb(&resolution);
            max_consecutive_occurrence(
                &variables[0],
                *operation,
                &resolution.threshold,
                &config.frequency,
                *date_event,
            )
        }
        Operator::SumOfSpellLengths {
            operation,
            min_length,
        } => {
            expect_variable_count(name, 1, variables.len())?;
            let resolution = resolve_required(name, &variables[0], interpolation)?;
            record.absorb(&resolution);
            sum_of_spell_lengths(
                &variables[0],
                *operation,
                &resolution.threshold,
                &config.frequency,
                *min_length,
            )
        }
        Operator::Reduce { op, filter } => {
            expect_variable_count(name, 1, variables.len())?;
            match filter {
                Some(operation) => {
                    let resolution = resolve_required(name, &variables[0], interpolation)?;
                    record.absorb(&resolution);
                    let filter = ThresholdFilter {
                        operation: *operation,
                        threshold: &resolution.threshold,
                    };
                    reduce(&variables[0], *op, &config.frequency, Some(filter))
                }
                None => reduce(&variables[0], *op, &config.frequency, None),
            }
        }
        Operator::Excess => {
            expect_variable_count(name, 1, variables.len())?;
            let resolution = resolve_required(name, &variables[0], interpolation)?;
            record.absorb(&resolution);
            excess(&variables[0], &resolution.threshold, &config.frequency)
        }
        Operator::Deficit => {
            expect_variable_count(name, 1, variables.len())?;
            let resolution = resolve_required(name, &variables[0], interpolation)?;
            record.absorb(&resolution);
            deficit(&variables[0], &resolution.threshold, &config.frequency)
        }
        Operator::FractionOfTotal { operation } => {
            expect_variable_count(name, 1, variables.len())?;
            let resolution = resolve_required(name, &variables[0], interpolation)?;
            record.absorb(&resolution);
            fraction_of_total(
                &variables[0],
                *operation,
                &resolution.threshold,
                &config.frequency,
            )
        }
        Operator::RollingExtreme {
            agg,
            mode,
            window_width,
        } => {
            expect_variable_count(name, 1, variables.len())?;
            rolling_extreme(&variables[0], *agg, *mode, *window_width, &config.frequency)
        }
        Operator::MeanOfDifference => {
            expect_variable_count(name, 2, variables.len())?;
            mean_of_difference(&variables[0], &variables[1], &config.frequency)
        }
        Operator::DifferenceOfExtremes => {
            expect_variable_count(name, 2, variables.len())?;
            difference_of_extremes(&variables[0], &variables[1], &config.frequency)
        }
        Operator::MeanOfAbsoluteOneTimestepDifference => {
            expect_variable_count(name, 2, variables.len())?;
            mean_of_absolute_one_timestep_difference(
                &variables[0],
                &variables[1],
                &config.frequency,
            )
        }
        Operator::Anomaly { percent } => match variables {
            // A reference period configured on the second variable restricts
            // which of its years enter the reference mean.
            [study, reference] if reference.has_explicit_reference() => {
                let clipped = ClimateVariable::new(
                    reference.name.clone(),
                    reference.standard_name.clone(),
                    reference.in_base().clone(),
                );
                record.reference_period = Some(reference.reference_period());
                difference_of_means(study, &clipped, *percent)
            }
            [study, reference] => difference_of_means(study, reference, *percent),
            [study] if study.has_explicit_reference() => {
                let reference = ClimateVariable::new(
                    study.name.clone(),
                    study.standard_name.clone(),
                    study.in_base().clone(),
                );
                record.reference_period = Some(study.reference_period());
                difference_of_means(study, &reference, *percent)
            }
            [_] => Err(missing(name, "reference_period")),
            other => Err(ClimError::WrongVariableCount {
                operation: name.to_string(),
                expected: "1 or 2".to_string(),
                got: other.len(),
            }),
        },
    }
}

/// Build and run a user-defined index in one step.
///
/// Validates the declarative configuration, attaches its thresholds to the
/// supplied variables and dispatches through [`compute`].
pub fn compute_user_index(
    config: &UserIndexConfig,
    frequency: Frequency,
    interpolation: Interpolation,
    variables: Vec<ClimateVariable>,
) -> ClimResult<IndexResult> {
    let index = UserIndex::build(config, variables.len())?;
    let (operator, coef, variables) = match index {
        UserIndex::Reduce { op, filter, coef } => {
            let (filter_op, variables) = match filter {
                Some((operation, threshold)) => {
                    let variables = variables
                        .into_iter()
                        .map(|v| v.with_threshold(threshold.clone()))
                        .collect();
                    (Some(operation), variables)
                }
                None => (None, variables),
            };
            (
                Operator::Reduce {
                    op,
                    filter: filter_op,
                },
                coef,
                variables,
            )
        }
        UserIndex::NbEvents {
            operation,
            thresholds,
            link,
            date_event,
        } => {
            // One threshold is attached per variable; a threshold list over a
            // single variable replicates that variable per value.
            let variables: Vec<ClimateVariable> = if variables.len() == 1 {
                thresholds
                    .iter()
                    .map(|t| variables[0].clone().with_threshold(t.clone()))
                    .collect()
            } else {
                if thresholds.len() != variables.len() {
                    return Err(ClimError::MismatchedEventConfig {
                        operations: 1,
                        thresholds: thresholds.len(),
                        variables: variables.len(),
                    });
                }
                variables
                    .into_iter()
                    .zip(thresholds)
                    .map(|(v, t)| v.with_threshold(t))
                    .collect()
            };
            (
                Operator::CountOccurrences {
                    operations: vec![operation],
                    link,
                    date_event,
                },
                None,
                variables,
            )
        }
        UserIndex::MaxConsecutiveEvents {
            operation,
            threshold,
            date_event,
        } => {
            let variables = variables
                .into_iter()
                .map(|v| v.with_threshold(threshold.clone()))
                .collect();
            (
                Operator::MaxConsecutiveOccurrence {
                    operation,
                    date_event,
                },
                None,
                variables,
            )
        }
        UserIndex::RollingExtreme {
            agg,
            mode,
            window_width,
            coef,
        } => (
            Operator::RollingExtreme {
                agg,
                mode,
                window_width,
            },
            coef,
            variables,
        ),
        UserIndex::Anomaly {
            reference_period,
            percent,
        } => {
            // The last variable carries the reference data: the second of
            // two, or the single variable compared against its own past.
            let variables = match reference_period {
                Some((start, end)) => {
                    let mut variables = variables;
                    if let Some(last) = variables.pop() {
                        variables.push(last.with_reference_period(start, end)?);
                    }
                    variables
                }
                None => variables,
            };
            (Operator::Anomaly { percent }, None, variables)
        }
    };
    let config = IndexConfig {
        index_name: config.index_name.clone(),
        operator,
        frequency,
        interpolation,
        coef,
    };
    compute(&config, &variables)
}
