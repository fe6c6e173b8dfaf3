use super::common::*;
use crate::analytics::definitions::baseline_metrics;
use crate::analytics::domain::{ChargeType, StopType};
use crate::analytics::formula::{
    evaluate_formula, validate_formula, EvaluationScope, Formula, FormulaError, MetricValue,
};

fn baseline(code: &str) -> Formula {
    baseline_metrics()
        .into_iter()
        .find(|metric| metric.metric_code == code)
        .map(|metric| metric.formula)
        .unwrap_or_else(|| panic!("baseline {code} exists"))
}

#[test]
fn on_time_pickup_scenario_is_half() {
    let loads = otp_scenario_loads();
    let scope = EvaluationScope::new(&loads);

    // Two pickups, one on time; the delivery without an actual arrival is
    // not a pickup and never enters the computation.
    assert_eq!(
        evaluate_formula(&baseline("OTP_EXACT"), &scope),
        MetricValue::Defined(50.0)
    );
}

#[test]
fn grace_period_counts_slightly_late_stops() {
    let mut loads = otp_scenario_loads();
    // Make the late pickup only 10 minutes late.
    let scheduled = loads[0].stops[1].appointment.scheduled_earliest;
    if let Some(actual) = loads[0].stops[1].actual.as_mut() {
        actual.arrival = Some(scheduled + chrono::Duration::minutes(10));
    }
    let scope = EvaluationScope::new(&loads);

    assert_eq!(
        evaluate_formula(&baseline("OTP_15MIN"), &scope),
        MetricValue::Defined(100.0)
    );
    assert_eq!(
        evaluate_formula(&baseline("OTP_EXACT"), &scope),
        MetricValue::Defined(50.0)
    );
}

#[test]
fn stop_without_actual_arrival_is_not_late() {
    let loads = otp_scenario_loads();
    let scope = EvaluationScope::new(&loads);

    // The only delivery has no actual arrival: the numerator counts zero
    // on-time deliveries, the denominator still counts the stop.
    assert_eq!(
        evaluate_formula(&baseline("OTD_EXACT"), &scope),
        MetricValue::Defined(0.0)
    );
}

#[test]
fn percentage_with_zero_denominator_is_undefined() {
    let loads = vec![load(
        "load_no_pickups",
        "swft",
        100.0,
        &[(ChargeType::LineHaul, 500.0)],
        accepted_tender(1.0),
        vec![stop(
            "stop_d",
            1,
            StopType::Delivery,
            base_day(9, 0),
            Some(0),
            None,
        )],
    )];
    let scope = EvaluationScope::new(&loads);

    assert_eq!(
        evaluate_formula(&baseline("OTP_EXACT"), &scope),
        MetricValue::Undefined
    );
}

#[test]
fn cost_per_mile_over_zero_miles_is_undefined() {
    let loads = vec![load(
        "load_zero_miles",
        "swft",
        0.0,
        &[(ChargeType::LineHaul, 500.0)],
        accepted_tender(1.0),
        vec![stop("stop_p", 1, StopType::Pickup, base_day(8, 0), Some(0), None)],
    )];
    let scope = EvaluationScope::new(&loads);

    assert_eq!(
        evaluate_formula(&baseline("CPM_ALL_IN"), &scope),
        MetricValue::Undefined
    );
}

#[test]
fn cost_per_mile_divides_total_spend_by_total_miles() {
    let loads = otp_scenario_loads();
    let scope = EvaluationScope::new(&loads);

    // 1500 + 180 over 600 miles.
    assert_eq!(
        evaluate_formula(&baseline("CPM_ALL_IN"), &scope),
        MetricValue::Defined(2.8)
    );
}

#[test]
fn linehaul_cpm_filters_charge_items() {
    let loads = otp_scenario_loads();
    let scope = EvaluationScope::new(&loads);

    assert_eq!(
        evaluate_formula(&baseline("CPM_LINEHAUL"), &scope),
        MetricValue::Defined(2.5)
    );
}

#[test]
fn tender_acceptance_ignores_pending_tenders() {
    let loads = vec![
        load(
            "load_a",
            "swft",
            100.0,
            &[(ChargeType::LineHaul, 400.0)],
            accepted_tender(0.5),
            vec![stop("a1", 1, StopType::Pickup, base_day(8, 0), Some(0), None)],
        ),
        load(
            "load_r",
            "swft",
            100.0,
            &[(ChargeType::LineHaul, 400.0)],
            rejected_tender(2.0),
            vec![stop("r1", 1, StopType::Pickup, base_day(8, 0), Some(0), None)],
        ),
        load(
            "load_p",
            "swft",
            100.0,
            &[(ChargeType::LineHaul, 400.0)],
            pending_tender(),
            vec![stop("p1", 1, StopType::Pickup, base_day(8, 0), Some(0), None)],
        ),
    ];
    let scope = EvaluationScope::new(&loads);

    // One accepted out of two responded; the pending tender is in neither
    // the numerator nor the denominator.
    assert_eq!(
        evaluate_formula(&baseline("TENDER_ACCEPTANCE_RATE"), &scope),
        MetricValue::Defined(50.0)
    );

    // Average response skips the pending tender's absent value.
    assert_eq!(
        evaluate_formula(&baseline("TENDER_RESPONSE_TIME"), &scope),
        MetricValue::Defined(1.25)
    );
}

#[test]
fn average_over_zero_contributions_is_undefined() {
    let loads = vec![load(
        "load_pending_only",
        "swft",
        100.0,
        &[(ChargeType::LineHaul, 400.0)],
        pending_tender(),
        vec![stop("p1", 1, StopType::Pickup, base_day(8, 0), Some(0), None)],
    )];
    let scope = EvaluationScope::new(&loads);

    assert_eq!(
        evaluate_formula(&baseline("TENDER_RESPONSE_TIME"), &scope),
        MetricValue::Undefined
    );
}

#[test]
fn count_of_an_empty_set_is_zero_not_undefined() {
    let loads: Vec<crate::analytics::domain::Load> = Vec::new();
    let scope = EvaluationScope::new(&loads);

    assert_eq!(
        evaluate_formula(&Formula::Count { filter: None }, &scope),
        MetricValue::Defined(0.0)
    );
}

#[test]
fn evaluation_is_idempotent() {
    let loads = otp_scenario_loads();
    let scope = EvaluationScope::new(&loads);
    let formula = baseline("OTP_EXACT");

    let first = evaluate_formula(&formula, &scope);
    let second = evaluate_formula(&formula, &scope);
    assert_eq!(first, second);
}

#[test]
fn aggregation_block_with_explicit_collection_counts_it() {
    let loads = otp_scenario_loads();
    let scope = EvaluationScope::new(&loads);

    let formula: Formula = serde_json::from_value(serde_json::json!({
        "type": "aggregation",
        "function": "COUNT",
        "field": "stops"
    }))
    .expect("parses");

    assert_eq!(evaluate_formula(&formula, &scope), MetricValue::Defined(3.0));
}

#[test]
fn baseline_formula_round_trips_through_wire_json() {
    let formula = baseline("OTP_15MIN");
    let wire = serde_json::to_value(&formula).expect("serializes");

    assert_eq!(wire.get("type"), Some(&serde_json::json!("percentage")));
    let reparsed: Formula = serde_json::from_value(wire).expect("reparses");
    assert_eq!(reparsed, formula);
}

#[test]
fn source_shaped_formula_json_deserializes() {
    // Verbatim shape of the stored OTP_15MIN definition.
    let formula: Formula = serde_json::from_value(serde_json::json!({
        "type": "percentage",
        "numerator": {
            "type": "count",
            "filter": {
                "type": "and",
                "conditions": [
                    { "field": "stop_type", "operator": "=", "value": "PICKUP" },
                    { "field": "actual.arrival", "operator": "<=",
                      "value": { "field": "appointment.scheduled_earliest", "offset": 15, "unit": "minutes" } }
                ]
            }
        },
        "denominator": {
            "type": "count",
            "filter": { "field": "stop_type", "operator": "=", "value": "PICKUP" }
        }
    }))
    .expect("source JSON parses");

    let loads = otp_scenario_loads();
    let scope = EvaluationScope::new(&loads);
    assert_eq!(evaluate_formula(&formula, &scope), MetricValue::Defined(50.0));
}

#[test]
fn validation_rejects_nested_ratios_and_bare_collections() {
    let nested: Formula = serde_json::from_value(serde_json::json!({
        "type": "percentage",
        "numerator": {
            "type": "division",
            "numerator": { "type": "count" },
            "denominator": { "type": "count" }
        },
        "denominator": { "type": "count" }
    }))
    .expect("parses");
    assert!(matches!(
        validate_formula(&nested),
        Err(FormulaError::RatioOperand { side: "numerator" })
    ));

    let bare_collection: Formula = serde_json::from_value(serde_json::json!({
        "type": "aggregation",
        "function": "SUM",
        "field": "stops"
    }))
    .expect("parses");
    assert!(matches!(
        validate_formula(&bare_collection),
        Err(FormulaError::MissingAggregateField { .. })
    ));

    assert!(validate_formula(&baseline("CPM_ALL_IN")).is_ok());
}
