use crate::analytics::assistant::{suggest, AssistantSuggestion};
use crate::analytics::definitions::SegmentType;
use crate::analytics::expression::validate_condition;
use crate::analytics::formula::{validate_formula, Formula};

fn expect_metric(prompt: &str) -> crate::analytics::assistant::MetricDraft {
    match suggest(prompt) {
        Some(AssistantSuggestion::Metric(draft)) => draft,
        other => panic!("expected a metric draft for '{prompt}', got {other:?}"),
    }
}

fn expect_segment(prompt: &str) -> crate::analytics::assistant::SegmentDraft {
    match suggest(prompt) {
        Some(AssistantSuggestion::Segment(draft)) => draft,
        other => panic!("expected a segment draft for '{prompt}', got {other:?}"),
    }
}

#[test]
fn on_time_pickup_prompt_builds_a_percentage() {
    let draft = expect_metric("Create a metric for on-time pickup percentage");

    assert_eq!(draft.metric_code, "OTP");
    assert!(matches!(draft.formula, Formula::Percentage { .. }));
    assert!(validate_formula(&draft.formula).is_ok());
}

#[test]
fn original_appointment_variant_references_the_original_window() {
    let draft =
        expect_metric("Create a metric for on-time pickup percentage to original appointment");

    assert_eq!(draft.metric_code, "OTP_ORIG");
    let wire = serde_json::to_value(&draft.formula).expect("serializes");
    let serialized = wire.to_string();
    assert!(serialized.contains("appointment.original_earliest"));
    assert!(serialized.contains("value_field"));
}

#[test]
fn excluding_shipper_variant_filters_both_sides() {
    let draft = expect_metric("on-time pickup percentage excluding shipper delays");

    assert_eq!(draft.metric_code, "OTP_NO_SHIPPER");
    let wire = serde_json::to_value(&draft.formula)
        .expect("serializes")
        .to_string();
    assert_eq!(wire.matches("late_reason.responsible_party").count(), 2);
}

#[test]
fn tender_prompt_builds_acceptance_rate() {
    let draft =
        expect_metric("I need a metric to track tender acceptance rate for primary contracts only");

    assert_eq!(draft.metric_code, "TAR_PRIMARY");
    assert!(validate_formula(&draft.formula).is_ok());
}

#[test]
fn dwell_prompt_scopes_to_delivery_locations() {
    let draft = expect_metric("Calculate average dwell time at delivery locations");

    assert_eq!(draft.metric_code, "AVG_DWELL_DEL");
    match &draft.formula {
        Formula::Average { field, filter } => {
            assert_eq!(field.as_deref(), Some("dwell_time_minutes"));
            assert!(filter.is_some());
        }
        other => panic!("expected average formula, got {other:?}"),
    }
}

#[test]
fn cost_per_mile_prompt_can_exclude_fuel() {
    let draft = expect_metric("Track cost per mile excluding fuel surcharges");

    assert_eq!(draft.metric_code, "CPM_NO_FUEL");
    assert!(validate_formula(&draft.formula).is_ok());
    let wire = serde_json::to_value(&draft.formula)
        .expect("serializes")
        .to_string();
    assert!(wire.contains("FUEL_SURCHARGE"));
}

#[test]
fn shipper_fault_prompt_builds_an_exclusion_segment() {
    let draft = expect_segment("exclude stops where the shipper caused the delay");

    assert_eq!(draft.segment_code, "NO_SHIPPER_FAULT");
    assert_eq!(draft.segment_type, SegmentType::Exclusion);
    assert!(draft.auto_apply);
    assert!(validate_condition(&draft.rules).is_ok());
}

#[test]
fn contract_prompts_pick_inclusion_or_exclusion() {
    let inclusion = expect_segment("only include primary contract loads");
    assert_eq!(inclusion.segment_code, "PRIMARY_ONLY");
    assert_eq!(inclusion.segment_type, SegmentType::Inclusion);

    let exclusion = expect_segment("create a segment without primary contract loads");
    assert_eq!(exclusion.segment_code, "NO_PRIMARY");
    assert_eq!(exclusion.segment_type, SegmentType::Exclusion);
}

#[test]
fn test_load_prompt_builds_the_standard_exclusion() {
    let draft = expect_segment("exclude test loads from the dashboard");

    assert_eq!(draft.segment_code, "NO_TEST_LOADS");
    assert_eq!(draft.affected_metrics, vec!["ALL".to_string()]);
}

#[test]
fn unmatched_prompts_yield_none() {
    assert!(suggest("what is the meaning of freight").is_none());
    assert!(suggest("").is_none());
}

#[test]
fn every_draft_passes_definition_validation() {
    let prompts = [
        "on-time pickup percentage",
        "on-time delivery percentage excluding customer delays",
        "tender acceptance rate",
        "average dwell time at pickup",
        "cost per mile",
    ];
    for prompt in prompts {
        let draft = expect_metric(prompt);
        assert!(
            validate_formula(&draft.formula).is_ok(),
            "draft for '{prompt}' must validate"
        );
    }
}
