//! End-to-end tests of the user-defined index dispatcher: declarative
//! configuration in, computed index out, with the error taxonomy preserved.

use climind::{compute_user_index, UserIndexConfig};
use climind_core::calendar::{CalDate, Calendar, TimeAxis};
use climind_core::errors::{ClimError, ErrorKind};
use climind_core::frequency::Frequency;
use climind_core::percentile::Interpolation;
use climind_core::timeseries::{ClimateVariable, Timeseries};
use is_close::is_close;
use std::sync::Arc;

fn daily_variable(start: (i32, u8, u8), values: Vec<f64>, unit: &str) -> ClimateVariable {
    let cal = Calendar::ProlepticGregorian;
    let start = CalDate::new(start.0, start.1, start.2, cal).unwrap();
    let axis = Arc::new(TimeAxis::daily(cal, start, values.len()).unwrap());
    ClimateVariable::new(
        "tas",
        "air_temperature",
        Timeseries::from_values(values, axis, unit).unwrap(),
    )
}

#[test]
fn nb_events_from_a_toml_document() {
    let cfg = UserIndexConfig::from_toml(
        r#"
        index_name = "warm_days"
        calc_operation = "nb_events"
        logical_operation = ">="
        thresh = 22.0
        date_event = true
        "#,
    )
    .unwrap();

    let mut values = vec![10.0; 31];
    values[10] = 25.0;
    let var = daily_variable((2042, 1, 1), values, "degC");
    let result =
        compute_user_index(&cfg, Frequency::Month, Interpolation::MedianUnbiased, vec![var])
            .unwrap();
    assert_eq!(result.output.values[[0, 0]], 1.0);
    assert_eq!(result.metadata.index_name, "warm_days");
    let events = result.output.event_dates.unwrap();
    assert_eq!(events.start[0][0].unwrap().to_string(), "2042-01-11");
}

#[test]
fn threshold_list_expands_into_linked_pairs() {
    let cfg = UserIndexConfig::from_toml(
        r#"
        index_name = "moderate_days"
        calc_operation = "nb_events"
        logical_operation = ">"
        thresh = [5.0, 15.0]
        link_logical_operations = "and"
        "#,
    )
    .unwrap();

    // Values above both thresholds on 3 days, above only the lower on 2.
    let values = vec![0.0, 10.0, 20.0, 20.0, 20.0, 10.0, 0.0];
    let var = daily_variable((2001, 1, 1), values, "degC");
    let result =
        compute_user_index(&cfg, Frequency::Month, Interpolation::MedianUnbiased, vec![var])
            .unwrap();
    assert_eq!(result.output.values[[0, 0]], 3.0);
}

#[test]
fn run_mean_through_the_dispatcher() {
    let cfg = UserIndexConfig::from_toml(
        r#"
        index_name = "driest_pentad"
        calc_operation = "run_mean"
        extreme_mode = "min"
        window_width = 5
        "#,
    )
    .unwrap();

    let mut values = vec![10.0; 59];
    for v in values.iter_mut().skip(10).take(5) {
        *v = 0.0;
    }
    let var = daily_variable((2001, 1, 1), values, "mm/day");
    let result =
        compute_user_index(&cfg, Frequency::Month, Interpolation::MedianUnbiased, vec![var])
            .unwrap();
    assert!(is_close!(result.output.values[[0, 0]], 0.0));
    assert!(is_close!(result.output.values[[1, 0]], 10.0));
}

#[test]
fn anomaly_with_an_explicit_reference_period() {
    let cfg = UserIndexConfig::from_toml(
        r#"
        index_name = "warming"
        calc_operation = "anomaly"
        percent = true
        reference_period = [2001, 2001]
        "#,
    )
    .unwrap();

    let mut values = vec![10.0; 365];
    values.extend(vec![12.0; 365]);
    let var = daily_variable((2001, 1, 1), values, "degC");
    let result =
        compute_user_index(&cfg, Frequency::Whole, Interpolation::MedianUnbiased, vec![var])
            .unwrap();
    // Study mean 11 against reference mean 10.
    assert!(is_close!(result.output.values[[0, 0]], 10.0));
    assert_eq!(result.metadata.unit, "%");
    assert_eq!(result.metadata.reference_period, Some((2001, 2001)));
}

#[test]
fn anomaly_reference_period_applies_to_the_second_variable() {
    let cfg = UserIndexConfig::from_toml(
        r#"
        index_name = "warming"
        calc_operation = "anomaly"
        reference_period = [2001, 2001]
        "#,
    )
    .unwrap();

    let study = daily_variable((2001, 1, 1), vec![20.0; 730], "degC");
    let mut ref_values = vec![10.0; 365];
    ref_values.extend(vec![50.0; 365]);
    let reference = daily_variable((2001, 1, 1), ref_values, "degC");
    let result = compute_user_index(
        &cfg,
        Frequency::Whole,
        Interpolation::MedianUnbiased,
        vec![study, reference],
    )
    .unwrap();
    // Only the reference's 2001 values enter the reference mean.
    assert!(is_close!(result.output.values[[0, 0]], 10.0));
    assert_eq!(result.metadata.reference_period, Some((2001, 2001)));
}

#[test]
fn coef_scales_values_before_reduction() {
    let cfg = UserIndexConfig::from_toml(
        r#"
        index_name = "total_precip_mm"
        calc_operation = "sum"
        coef = 86400.0
        "#,
    )
    .unwrap();

    // Flux in kg m-2 s-1 scaled to a daily amount by the caller's coef.
    let var = daily_variable((2001, 1, 1), vec![1.0e-5; 31], "kg m-2 s-1");
    let result =
        compute_user_index(&cfg, Frequency::Month, Interpolation::MedianUnbiased, vec![var])
            .unwrap();
    assert!(is_close!(result.output.values[[0, 0]], 31.0 * 0.864));
}

mod error_taxonomy {
    use super::*;

    fn one_variable() -> Vec<ClimateVariable> {
        vec![daily_variable((2001, 1, 1), vec![1.0; 31], "degC")]
    }

    #[test]
    fn missing_parameter_is_missing_input() {
        let cfg = UserIndexConfig::from_toml(
            r#"
            index_name = "broken"
            calc_operation = "run_sum"
            extreme_mode = "max"
            "#,
        )
        .unwrap();
        let err = compute_user_index(
            &cfg,
            Frequency::Month,
            Interpolation::MedianUnbiased,
            one_variable(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingInput);
        assert!(matches!(
            err,
            ClimError::MissingParameter { ref parameter, .. } if parameter == "window_width"
        ));
    }

    #[test]
    fn unknown_operation_is_invalid_argument() {
        let cfg = UserIndexConfig::from_toml(
            r#"
            index_name = "broken"
            calc_operation = "p99"
            "#,
        )
        .unwrap();
        let err = compute_user_index(
            &cfg,
            Frequency::Month,
            Interpolation::MedianUnbiased,
            one_variable(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn consecutive_events_reject_a_threshold_list() {
        let cfg = UserIndexConfig::from_toml(
            r#"
            index_name = "broken"
            calc_operation = "max_nb_consecutive_events"
            logical_operation = ">"
            thresh = [20.0, 25.0]
            "#,
        )
        .unwrap();
        let err = compute_user_index(
            &cfg,
            Frequency::Month,
            Interpolation::MedianUnbiased,
            one_variable(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
