//! Metric and segment definitions: the named, versioned artifacts users
//! manage, plus the system-provided baseline catalogs seeded at startup.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::expression::{
    all_of, any_of, at_or_before, eq_text, is_not_null, is_null, ne_flag, ne_text,
    validate_condition, Condition, ExpressionError,
};
use super::field::EntityKind;
use super::formula::{validate_formula, Formula, FormulaError};

/// A named, versioned KPI formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub metric_id: String,
    pub metric_code: String,
    pub metric_name: String,
    pub description: String,
    pub formula: Formula,
    pub return_type: ReturnType,
    pub unit: String,
    pub precision: u8,
    pub is_baseline: bool,
    pub category: MetricCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnType {
    Percentage,
    Decimal,
    Integer,
    Currency,
    Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricCategory {
    Performance,
    Cost,
    Tender,
    Dwell,
    Service,
}

/// The entity kinds a segment can suppress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegmentEntity {
    Load,
    Stop,
    Tender,
}

impl SegmentEntity {
    pub const fn collection(self) -> EntityKind {
        match self {
            SegmentEntity::Load => EntityKind::Loads,
            SegmentEntity::Stop => EntityKind::Stops,
            SegmentEntity::Tender => EntityKind::Tenders,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegmentType {
    Inclusion,
    Exclusion,
}

/// Sentinel in `affected_metrics` meaning "every metric".
pub const ALL_METRICS: &str = "ALL";

/// A named inclusion/exclusion filter applied to records before metric
/// aggregation. The rule is the retention predicate: records matching it
/// survive, regardless of segment type (see DESIGN.md).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub segment_id: String,
    pub segment_code: String,
    pub segment_name: String,
    pub description: String,
    pub segment_type: SegmentType,
    pub applies_to: Vec<SegmentEntity>,
    pub affected_metrics: Vec<String>,
    pub rules: Condition,
    pub auto_apply: bool,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Segment {
    pub fn affects_metric(&self, metric_code: &str) -> bool {
        self.affected_metrics
            .iter()
            .any(|code| code == ALL_METRICS || code == metric_code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverrideAction {
    Include,
    Exclude,
}

/// A manual exception pinning one entity's fate for one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionOverride {
    pub override_id: String,
    pub entity_id: String,
    pub entity_type: SegmentEntity,
    pub segment_id: String,
    pub override_action: OverrideAction,
    pub reason: String,
    pub applied_by: String,
    pub applied_at: DateTime<Utc>,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
}

impl TransactionOverride {
    pub fn in_effect(&self, at: DateTime<Utc>) -> bool {
        if at < self.effective_from {
            return false;
        }
        match self.effective_to {
            Some(until) => at <= until,
            None => true,
        }
    }
}

/// Defects in a definition caught at save time.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("metric_code must not be empty")]
    EmptyMetricCode,
    #[error("metric_name must not be empty")]
    EmptyMetricName,
    #[error("segment_code must not be empty")]
    EmptySegmentCode,
    #[error("segment_name must not be empty")]
    EmptySegmentName,
    #[error("applies_to must name at least one entity kind")]
    EmptyAppliesTo,
    #[error("affected_metrics must name at least one metric code or ALL")]
    EmptyAffectedMetrics,
    #[error("formula: {0}")]
    Formula(#[from] FormulaError),
    #[error("rules: {0}")]
    Rule(#[from] ExpressionError),
}

pub fn validate_metric_definition(definition: &MetricDefinition) -> Result<(), DefinitionError> {
    if definition.metric_code.trim().is_empty() {
        return Err(DefinitionError::EmptyMetricCode);
    }
    if definition.metric_name.trim().is_empty() {
        return Err(DefinitionError::EmptyMetricName);
    }
    validate_formula(&definition.formula)?;
    Ok(())
}

pub fn validate_segment(segment: &Segment) -> Result<(), DefinitionError> {
    if segment.segment_code.trim().is_empty() {
        return Err(DefinitionError::EmptySegmentCode);
    }
    if segment.segment_name.trim().is_empty() {
        return Err(DefinitionError::EmptySegmentName);
    }
    if segment.applies_to.is_empty() {
        return Err(DefinitionError::EmptyAppliesTo);
    }
    if segment.affected_metrics.is_empty() {
        return Err(DefinitionError::EmptyAffectedMetrics);
    }
    validate_condition(&segment.rules)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Baseline catalogs
// ---------------------------------------------------------------------------

fn seed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default()
}

pub(crate) fn count_where(filter: Condition) -> Formula {
    Formula::Count {
        filter: Some(filter),
    }
}

/// `percentage { COUNT(<stop_type> stops on time vs <reference>) / COUNT(<stop_type> stops) }`
pub(crate) fn on_time_percentage(
    stop_type: &str,
    reference: &str,
    offset_minutes: Option<f64>,
) -> Formula {
    Formula::Percentage {
        numerator: Box::new(count_where(all_of(vec![
            eq_text("stop_type", stop_type),
            at_or_before("actual.arrival", reference, offset_minutes),
        ]))),
        denominator: Box::new(count_where(eq_text("stop_type", stop_type))),
    }
}

struct MetricSeed {
    id: &'static str,
    code: &'static str,
    name: &'static str,
    description: &'static str,
    formula: Formula,
    return_type: ReturnType,
    unit: &'static str,
    precision: u8,
    category: MetricCategory,
}

fn metric_from_seed(seed: MetricSeed) -> MetricDefinition {
    MetricDefinition {
        metric_id: seed.id.to_string(),
        metric_code: seed.code.to_string(),
        metric_name: seed.name.to_string(),
        description: seed.description.to_string(),
        formula: seed.formula,
        return_type: seed.return_type,
        unit: seed.unit.to_string(),
        precision: seed.precision,
        is_baseline: true,
        is_active: Some(true),
        category: seed.category,
        created_by: Some("system".to_string()),
        created_at: Some(seed_time()),
    }
}

/// System-provided metric definitions, seeded at process start and never
/// mutated.
pub fn baseline_metrics() -> Vec<MetricDefinition> {
    vec![
        metric_from_seed(MetricSeed {
            id: "metric_otp_exact",
            code: "OTP_EXACT",
            name: "On-Time Pickup - Exact",
            description:
                "Percentage of pickups where actual arrival was exactly on or before scheduled time",
            formula: on_time_percentage("PICKUP", "appointment.scheduled_earliest", None),
            return_type: ReturnType::Percentage,
            unit: "%",
            precision: 1,
            category: MetricCategory::Performance,
        }),
        metric_from_seed(MetricSeed {
            id: "metric_otp_15min",
            code: "OTP_15MIN",
            name: "On-Time Pickup - 15 Min Grace",
            description:
                "Percentage of pickups where actual arrival was within 15 minutes of scheduled time",
            formula: on_time_percentage("PICKUP", "appointment.scheduled_earliest", Some(15.0)),
            return_type: ReturnType::Percentage,
            unit: "%",
            precision: 1,
            category: MetricCategory::Performance,
        }),
        metric_from_seed(MetricSeed {
            id: "metric_otp_60min",
            code: "OTP_60MIN",
            name: "On-Time Pickup - 60 Min Grace",
            description:
                "Percentage of pickups where actual arrival was within 60 minutes of scheduled time",
            formula: on_time_percentage("PICKUP", "appointment.scheduled_earliest", Some(60.0)),
            return_type: ReturnType::Percentage,
            unit: "%",
            precision: 1,
            category: MetricCategory::Performance,
        }),
        metric_from_seed(MetricSeed {
            id: "metric_otd_exact",
            code: "OTD_EXACT",
            name: "On-Time Delivery - Exact",
            description:
                "Percentage of deliveries where actual arrival was exactly on or before scheduled time",
            formula: on_time_percentage("DELIVERY", "appointment.scheduled_earliest", None),
            return_type: ReturnType::Percentage,
            unit: "%",
            precision: 1,
            category: MetricCategory::Performance,
        }),
        metric_from_seed(MetricSeed {
            id: "metric_otd_15min",
            code: "OTD_15MIN",
            name: "On-Time Delivery - 15 Min Grace",
            description:
                "Percentage of deliveries where actual arrival was within 15 minutes of scheduled time",
            formula: on_time_percentage("DELIVERY", "appointment.scheduled_earliest", Some(15.0)),
            return_type: ReturnType::Percentage,
            unit: "%",
            precision: 1,
            category: MetricCategory::Performance,
        }),
        metric_from_seed(MetricSeed {
            id: "metric_cpm_all_in",
            code: "CPM_ALL_IN",
            name: "Cost Per Mile - All-In",
            description: "Total cost divided by length of haul",
            formula: Formula::Division {
                numerator: Box::new(Formula::Sum {
                    field: Some("charges.line_items.amount.value".to_string()),
                    filter: None,
                }),
                denominator: Box::new(Formula::Field {
                    path: "length_of_haul.value".to_string(),
                }),
                multiplier: None,
            },
            return_type: ReturnType::Currency,
            unit: "USD/MILE",
            precision: 2,
            category: MetricCategory::Cost,
        }),
        metric_from_seed(MetricSeed {
            id: "metric_cpm_linehaul",
            code: "CPM_LINEHAUL",
            name: "Cost Per Mile - Linehaul Only",
            description: "Linehaul cost divided by length of haul",
            formula: Formula::Division {
                numerator: Box::new(Formula::Sum {
                    field: Some("charges.line_items.amount.value".to_string()),
                    filter: Some(eq_text("charge_type", "LINE_HAUL")),
                }),
                denominator: Box::new(Formula::Field {
                    path: "length_of_haul.value".to_string(),
                }),
                multiplier: None,
            },
            return_type: ReturnType::Currency,
            unit: "USD/MILE",
            precision: 2,
            category: MetricCategory::Cost,
        }),
        metric_from_seed(MetricSeed {
            id: "metric_tender_acceptance",
            code: "TENDER_ACCEPTANCE_RATE",
            name: "Tender Acceptance Rate",
            description: "Percentage of tenders accepted by carriers",
            formula: Formula::Percentage {
                numerator: Box::new(count_where(eq_text("tender.status", "ACCEPTED"))),
                denominator: Box::new(count_where(any_of(vec![
                    eq_text("tender.status", "ACCEPTED"),
                    eq_text("tender.status", "REJECTED"),
                ]))),
            },
            return_type: ReturnType::Percentage,
            unit: "%",
            precision: 1,
            category: MetricCategory::Tender,
        }),
        metric_from_seed(MetricSeed {
            id: "metric_tender_response_time",
            code: "TENDER_RESPONSE_TIME",
            name: "Average Tender Response Time",
            description: "Average time taken by carriers to respond to tender offers",
            formula: Formula::Average {
                field: Some("tender_response_hours".to_string()),
                filter: None,
            },
            return_type: ReturnType::Duration,
            unit: "HOURS",
            precision: 2,
            category: MetricCategory::Tender,
        }),
        metric_from_seed(MetricSeed {
            id: "metric_ftar",
            code: "FTAR",
            name: "First Tender Acceptance Rate",
            description: "Percentage of loads awarded on the first tender attempt",
            formula: Formula::Percentage {
                numerator: Box::new(count_where(eq_text("first_tender_status", "ACCEPTED"))),
                denominator: Box::new(count_where(is_not_null("tender.status"))),
            },
            return_type: ReturnType::Percentage,
            unit: "%",
            precision: 1,
            category: MetricCategory::Tender,
        }),
        metric_from_seed(MetricSeed {
            id: "metric_avg_dwell_time",
            code: "AVG_DWELL_TIME",
            name: "Average Dwell Time",
            description: "Average time spent at stops from arrival to departure",
            formula: Formula::Average {
                field: Some("dwell_time_minutes".to_string()),
                filter: None,
            },
            return_type: ReturnType::Duration,
            unit: "MINUTES",
            precision: 0,
            category: MetricCategory::Dwell,
        }),
        metric_from_seed(MetricSeed {
            id: "metric_cost_index",
            code: "COST_INDEX",
            name: "Cost Index",
            description: "Carrier's average cost compared to lane average",
            formula: Formula::Division {
                numerator: Box::new(Formula::Field {
                    path: "carrier_avg_cpm".to_string(),
                }),
                denominator: Box::new(Formula::Field {
                    path: "lane_avg_cpm".to_string(),
                }),
                multiplier: Some(100.0),
            },
            return_type: ReturnType::Decimal,
            unit: "INDEX",
            precision: 1,
            category: MetricCategory::Cost,
        }),
    ]
}

struct SegmentSeed {
    id: &'static str,
    code: &'static str,
    name: &'static str,
    description: &'static str,
    segment_type: SegmentType,
    applies_to: Vec<SegmentEntity>,
    affected_metrics: &'static [&'static str],
    rules: Condition,
    auto_apply: bool,
}

fn segment_from_seed(seed: SegmentSeed) -> Segment {
    Segment {
        segment_id: seed.id.to_string(),
        segment_code: seed.code.to_string(),
        segment_name: seed.name.to_string(),
        description: seed.description.to_string(),
        segment_type: seed.segment_type,
        applies_to: seed.applies_to,
        affected_metrics: seed
            .affected_metrics
            .iter()
            .map(|code| code.to_string())
            .collect(),
        rules: seed.rules,
        auto_apply: seed.auto_apply,
        is_active: true,
        created_by: Some("system".to_string()),
        created_at: Some(seed_time()),
    }
}

/// System-provided segments, seeded at process start and never mutated.
pub fn baseline_segments() -> Vec<Segment> {
    vec![
        segment_from_seed(SegmentSeed {
            id: "seg_no_shipper_fault",
            code: "NO_SHIPPER_FAULT",
            name: "Exclude Shipper Fault",
            description: "Excludes stops where delays were the shipper's responsibility",
            segment_type: SegmentType::Exclusion,
            applies_to: vec![SegmentEntity::Stop],
            affected_metrics: &["OTP_EXACT", "OTP_15MIN", "OTP_60MIN"],
            rules: any_of(vec![
                ne_text("late_reason.responsible_party", "SHIPPER"),
                is_null("late_reason"),
            ]),
            auto_apply: true,
        }),
        segment_from_seed(SegmentSeed {
            id: "seg_no_customer_fault",
            code: "NO_CUSTOMER_FAULT",
            name: "Exclude Customer Fault",
            description: "Excludes stops where delays were the customer's responsibility",
            segment_type: SegmentType::Exclusion,
            applies_to: vec![SegmentEntity::Stop],
            affected_metrics: &["OTD_EXACT", "OTD_15MIN"],
            rules: any_of(vec![
                ne_text("late_reason.responsible_party", "CUSTOMER"),
                is_null("late_reason"),
            ]),
            auto_apply: true,
        }),
        segment_from_seed(SegmentSeed {
            id: "seg_no_test_loads",
            code: "NO_TEST_LOADS",
            name: "Exclude Test Loads",
            description: "Excludes test/trial loads from operational metrics",
            segment_type: SegmentType::Exclusion,
            applies_to: vec![SegmentEntity::Load],
            affected_metrics: &[ALL_METRICS],
            rules: any_of(vec![
                ne_flag("metadata.is_test", true),
                is_null("metadata.is_test"),
            ]),
            auto_apply: true,
        }),
        segment_from_seed(SegmentSeed {
            id: "seg_no_contract_backup",
            code: "NO_CONTRACT_BACKUP",
            name: "Exclude Contract Backup",
            description: "Excludes backup tenders from acceptance rate calculations",
            segment_type: SegmentType::Exclusion,
            applies_to: vec![SegmentEntity::Load],
            affected_metrics: &["TENDER_ACCEPTANCE_RATE"],
            rules: ne_text("contract_type", "CONTRACT_BACKUP"),
            auto_apply: true,
        }),
        segment_from_seed(SegmentSeed {
            id: "seg_weather_exclusion",
            code: "WEATHER_EXCLUSION",
            name: "Exclude Weather Delays",
            description: "Excludes weather-related delays from on-time metrics",
            segment_type: SegmentType::Exclusion,
            applies_to: vec![SegmentEntity::Stop],
            affected_metrics: &["OTP_EXACT", "OTP_15MIN", "OTP_60MIN", "OTD_EXACT", "OTD_15MIN"],
            rules: ne_text("late_reason.code", "WEATHER_DELAY"),
            auto_apply: false,
        }),
        segment_from_seed(SegmentSeed {
            id: "seg_force_majeure",
            code: "FORCE_MAJEURE_EXCLUSION",
            name: "Exclude Force Majeure",
            description: "Excludes delays due to force majeure events",
            segment_type: SegmentType::Exclusion,
            applies_to: vec![SegmentEntity::Stop],
            affected_metrics: &["OTP_EXACT", "OTP_15MIN", "OTP_60MIN", "OTD_EXACT", "OTD_15MIN"],
            rules: ne_text("late_reason.code", "FORCE_MAJEURE"),
            auto_apply: false,
        }),
        segment_from_seed(SegmentSeed {
            id: "seg_primary_contract_only",
            code: "PRIMARY_CONTRACT_ONLY",
            name: "Primary Contract Only",
            description: "Includes only primary contract loads for contract compliance metrics",
            segment_type: SegmentType::Inclusion,
            applies_to: vec![SegmentEntity::Load],
            affected_metrics: &["TENDER_ACCEPTANCE_RATE", "CPM_ALL_IN"],
            rules: eq_text("contract_type", "CONTRACT_PRIMARY"),
            auto_apply: false,
        }),
    ]
}
