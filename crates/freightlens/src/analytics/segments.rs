//! Suppression of records by segments before formula evaluation.
//!
//! A segment's rule is the retention predicate: records matching it stay in
//! the working set. Transaction overrides win outright for their entity, and
//! multiple segments compose by intersection: a record must survive every
//! applicable segment to remain in scope.

use chrono::{DateTime, Utc};

use super::definitions::{OverrideAction, Segment, SegmentEntity, TransactionOverride};
use super::expression::evaluate_condition;
use super::field::{EntityKind, Record};

/// Filter a record collection through one segment.
pub fn evaluate_segment<'a>(
    segment: &Segment,
    records: Vec<Record<'a>>,
    overrides: &[TransactionOverride],
    as_of: DateTime<Utc>,
) -> Vec<Record<'a>> {
    records
        .into_iter()
        .filter(|record| segment_keeps(segment, record, overrides, as_of))
        .collect()
}

/// Filter a record collection through every segment relevant to a metric.
pub fn apply_segments<'a>(
    metric_code: &str,
    segments: &[&Segment],
    records: Vec<Record<'a>>,
    overrides: &[TransactionOverride],
    as_of: DateTime<Utc>,
) -> Vec<Record<'a>> {
    let mut working = records;
    for segment in segments {
        if !segment.is_active || !segment.affects_metric(metric_code) {
            continue;
        }
        working = evaluate_segment(segment, working, overrides, as_of);
    }
    working
}

fn segment_keeps(
    segment: &Segment,
    record: &Record<'_>,
    overrides: &[TransactionOverride],
    as_of: DateTime<Utc>,
) -> bool {
    let Some(subject) = subject_record(segment, record) else {
        // The segment has no path to this record; it does not apply.
        return true;
    };

    if let Some(action) = override_action_for(segment, &subject, overrides, as_of) {
        return action == OverrideAction::Include;
    }

    evaluate_condition(&segment.rules, &subject)
}

/// The record the segment's rule is judged against: the record itself when
/// its kind is named in `applies_to`, otherwise the owning load for
/// load-scoped segments.
fn subject_record<'a>(segment: &Segment, record: &Record<'a>) -> Option<Record<'a>> {
    let kind = record.kind();
    if segment
        .applies_to
        .iter()
        .any(|entity| entity.collection() == kind)
    {
        return Some(*record);
    }
    if kind != EntityKind::Loads && segment.applies_to.contains(&SegmentEntity::Load) {
        return Some(Record::Load(record.owning_load()));
    }
    None
}

fn override_action_for(
    segment: &Segment,
    subject: &Record<'_>,
    overrides: &[TransactionOverride],
    as_of: DateTime<Utc>,
) -> Option<OverrideAction> {
    overrides
        .iter()
        .find(|entry| {
            entry.segment_id == segment.segment_id
                && entry.entity_type.collection() == subject.kind()
                && entry.entity_id == subject.entity_id()
                && entry.in_effect(as_of)
        })
        .map(|entry| entry.override_action)
}
