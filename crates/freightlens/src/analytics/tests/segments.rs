use super::common::*;
use crate::analytics::definitions::{
    baseline_segments, OverrideAction, Segment, SegmentEntity, TransactionOverride,
};
use crate::analytics::domain::{ChargeType, ResponsibleParty, StopType};
use crate::analytics::field::{EntityKind, Record};
use crate::analytics::segments::{apply_segments, evaluate_segment};

fn segment(code: &str) -> Segment {
    baseline_segments()
        .into_iter()
        .find(|segment| segment.segment_code == code)
        .unwrap_or_else(|| panic!("baseline segment {code} exists"))
}

/// Three stops: shipper-fault late, carrier-fault late, on time with no
/// late reason.
fn fault_scenario() -> Vec<crate::analytics::domain::Load> {
    let stops = vec![
        stop(
            "stop_shipper",
            1,
            StopType::Pickup,
            base_day(8, 0),
            Some(45),
            Some(ResponsibleParty::Shipper),
        ),
        stop(
            "stop_carrier",
            2,
            StopType::Pickup,
            base_day(10, 0),
            Some(30),
            Some(ResponsibleParty::Carrier),
        ),
        stop("stop_clean", 3, StopType::Pickup, base_day(12, 0), Some(-2), None),
    ];
    vec![load(
        "load_faults",
        "swft",
        500.0,
        &[(ChargeType::LineHaul, 1200.0)],
        accepted_tender(1.0),
        stops,
    )]
}

fn stop_ids(records: &[Record<'_>]) -> Vec<String> {
    records
        .iter()
        .map(|record| record.entity_id().to_string())
        .collect()
}

#[test]
fn shipper_fault_exclusion_drops_only_shipper_fault_stops() {
    let loads = fault_scenario();
    let records = EntityKind::Stops.flatten(&loads);

    let filtered = evaluate_segment(&segment("NO_SHIPPER_FAULT"), records, &[], as_of());

    assert_eq!(stop_ids(&filtered), vec!["stop_carrier", "stop_clean"]);
}

#[test]
fn override_exclude_wins_over_a_keeping_rule() {
    let loads = fault_scenario();
    let records = EntityKind::Stops.flatten(&loads);
    let segment = segment("NO_SHIPPER_FAULT");

    // The rule would keep stop_carrier; the override forces it out.
    let overrides = vec![TransactionOverride {
        override_id: "override_test_01".to_string(),
        entity_id: "stop_carrier".to_string(),
        entity_type: SegmentEntity::Stop,
        segment_id: segment.segment_id.clone(),
        override_action: OverrideAction::Exclude,
        reason: "carrier could have communicated the delay".to_string(),
        applied_by: "user_ops_01".to_string(),
        applied_at: base_day(9, 0),
        effective_from: base_day(0, 0),
        effective_to: None,
    }];

    let filtered = evaluate_segment(&segment, records, &overrides, as_of());
    assert_eq!(stop_ids(&filtered), vec!["stop_clean"]);
}

#[test]
fn override_include_wins_over_a_dropping_rule() {
    let loads = fault_scenario();
    let records = EntityKind::Stops.flatten(&loads);
    let segment = segment("NO_SHIPPER_FAULT");

    let overrides = vec![TransactionOverride {
        override_id: "override_test_02".to_string(),
        entity_id: "stop_shipper".to_string(),
        entity_type: SegmentEntity::Stop,
        segment_id: segment.segment_id.clone(),
        override_action: OverrideAction::Include,
        reason: "fault attribution disputed".to_string(),
        applied_by: "user_ops_01".to_string(),
        applied_at: base_day(9, 0),
        effective_from: base_day(0, 0),
        effective_to: None,
    }];

    let filtered = evaluate_segment(&segment, records, &overrides, as_of());
    assert_eq!(
        stop_ids(&filtered),
        vec!["stop_shipper", "stop_carrier", "stop_clean"]
    );
}

#[test]
fn expired_override_is_ignored() {
    let loads = fault_scenario();
    let records = EntityKind::Stops.flatten(&loads);
    let segment = segment("NO_SHIPPER_FAULT");

    let overrides = vec![TransactionOverride {
        override_id: "override_test_03".to_string(),
        entity_id: "stop_shipper".to_string(),
        entity_type: SegmentEntity::Stop,
        segment_id: segment.segment_id.clone(),
        override_action: OverrideAction::Include,
        reason: "temporary inclusion".to_string(),
        applied_by: "user_ops_01".to_string(),
        applied_at: base_day(9, 0),
        effective_from: base_day(0, 0),
        effective_to: Some(base_day(10, 0)),
    }];

    // as_of is past the effective window, so the rule decides again.
    let filtered = evaluate_segment(&segment, records, &overrides, as_of());
    assert_eq!(stop_ids(&filtered), vec!["stop_carrier", "stop_clean"]);
}

#[test]
fn sequential_segments_compose_as_intersection() {
    let loads = fault_scenario();
    let shipper = segment("NO_SHIPPER_FAULT");
    let weather = segment("WEATHER_EXCLUSION");

    let sequential = evaluate_segment(
        &weather,
        evaluate_segment(&shipper, EntityKind::Stops.flatten(&loads), &[], as_of()),
        &[],
        as_of(),
    );
    let reversed = evaluate_segment(
        &shipper,
        evaluate_segment(&weather, EntityKind::Stops.flatten(&loads), &[], as_of()),
        &[],
        as_of(),
    );

    assert_eq!(stop_ids(&sequential), stop_ids(&reversed));

    // Combined via apply_segments: the record must survive every segment.
    let combined = apply_segments(
        "OTP_EXACT",
        &[&shipper, &weather],
        EntityKind::Stops.flatten(&loads),
        &[],
        as_of(),
    );
    assert_eq!(stop_ids(&combined), stop_ids(&sequential));
}

#[test]
fn load_scoped_segment_suppresses_nested_stops() {
    let mut loads = fault_scenario();
    loads[0].metadata.is_test = true;

    let filtered = evaluate_segment(
        &segment("NO_TEST_LOADS"),
        EntityKind::Stops.flatten(&loads),
        &[],
        as_of(),
    );

    assert!(filtered.is_empty());
}

#[test]
fn load_override_reaches_nested_stops() {
    let mut loads = fault_scenario();
    loads[0].metadata.is_test = true;
    let segment = segment("NO_TEST_LOADS");

    let overrides = vec![TransactionOverride {
        override_id: "override_test_04".to_string(),
        entity_id: "load_faults".to_string(),
        entity_type: SegmentEntity::Load,
        segment_id: segment.segment_id.clone(),
        override_action: OverrideAction::Include,
        reason: "trial load counts this month".to_string(),
        applied_by: "user_ops_01".to_string(),
        applied_at: base_day(9, 0),
        effective_from: base_day(0, 0),
        effective_to: None,
    }];

    let filtered = evaluate_segment(
        &segment,
        EntityKind::Stops.flatten(&loads),
        &overrides,
        as_of(),
    );
    assert_eq!(filtered.len(), 3);
}

#[test]
fn apply_segments_skips_inactive_and_unaffected() {
    let loads = fault_scenario();
    let mut shipper = segment("NO_SHIPPER_FAULT");
    shipper.is_active = false;

    // Inactive: nothing is dropped.
    let filtered = apply_segments(
        "OTP_EXACT",
        &[&shipper],
        EntityKind::Stops.flatten(&loads),
        &[],
        as_of(),
    );
    assert_eq!(filtered.len(), 3);

    // Active but scoped to other metrics: would drop stop_shipper for OTP,
    // does nothing when computing OTD.
    let shipper = segment("NO_SHIPPER_FAULT");
    let filtered = apply_segments(
        "OTD_EXACT",
        &[&shipper],
        EntityKind::Stops.flatten(&loads),
        &[],
        as_of(),
    );
    assert_eq!(filtered.len(), 3);
}
