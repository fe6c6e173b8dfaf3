//! Metric formulas and their evaluation over a record scope.
//!
//! A formula is a closed tagged union mirroring the stored JSON: ratio shapes
//! (`percentage`, `division`) over aggregation blocks, and the aggregation
//! blocks themselves (`count`, `sum`, `average`, `aggregation`, `field`).
//! Evaluation produces a [`MetricValue`] whose `Undefined` sentinel is
//! distinct from a legitimate zero and propagates through ratios.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::definitions::{Segment, TransactionOverride};
use super::domain::Load;
use super::expression::{
    collect_paths, evaluate_condition, validate_condition, Condition, ExpressionError,
};
use super::field::{EntityKind, Record};
use super::segments::evaluate_segment;

/// One metric formula as stored and evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Formula {
    Percentage {
        numerator: Box<Formula>,
        denominator: Box<Formula>,
    },
    Division {
        numerator: Box<Formula>,
        denominator: Box<Formula>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        multiplier: Option<f64>,
    },
    Average {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<Condition>,
    },
    Sum {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<Condition>,
    },
    Count {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<Condition>,
    },
    Aggregation {
        function: AggregateFn,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<Condition>,
    },
    Field {
        path: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFn {
    pub const fn label(self) -> &'static str {
        match self {
            AggregateFn::Count => "COUNT",
            AggregateFn::Sum => "SUM",
            AggregateFn::Avg => "AVG",
            AggregateFn::Min => "MIN",
            AggregateFn::Max => "MAX",
        }
    }
}

/// Result of evaluating a formula: a number, or explicitly undefined
/// (zero denominator, empty aggregate, unresolvable operand).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Defined(f64),
    Undefined,
}

impl MetricValue {
    pub fn is_defined(self) -> bool {
        matches!(self, MetricValue::Defined(_))
    }

    pub fn to_option(self) -> Option<f64> {
        match self {
            MetricValue::Defined(value) => Some(value),
            MetricValue::Undefined => None,
        }
    }

    pub fn round_to(self, precision: u8) -> MetricValue {
        match self {
            MetricValue::Defined(value) => {
                let factor = 10f64.powi(precision as i32);
                MetricValue::Defined((value * factor).round() / factor)
            }
            MetricValue::Undefined => MetricValue::Undefined,
        }
    }
}

impl From<Option<f64>> for MetricValue {
    fn from(value: Option<f64>) -> Self {
        value.map(MetricValue::Defined).unwrap_or(MetricValue::Undefined)
    }
}

/// The record snapshot a formula is evaluated against: the loads, the
/// segments already selected for the metric being computed (with their
/// overrides), and scalar context values the reporting layer can inject
/// (e.g. `carrier_avg_cpm`).
#[derive(Debug, Clone)]
pub struct EvaluationScope<'a> {
    pub loads: &'a [Load],
    pub segments: Vec<&'a Segment>,
    pub overrides: &'a [TransactionOverride],
    pub as_of: DateTime<Utc>,
    pub context: BTreeMap<String, f64>,
}

impl<'a> EvaluationScope<'a> {
    pub fn new(loads: &'a [Load]) -> Self {
        Self {
            loads,
            segments: Vec::new(),
            overrides: &[],
            as_of: Utc::now(),
            context: BTreeMap::new(),
        }
    }

    pub fn with_segments(
        mut self,
        segments: Vec<&'a Segment>,
        overrides: &'a [TransactionOverride],
        as_of: DateTime<Utc>,
    ) -> Self {
        self.segments = segments;
        self.overrides = overrides;
        self.as_of = as_of;
        self
    }

    pub fn with_context(mut self, context: BTreeMap<String, f64>) -> Self {
        self.context = context;
        self
    }
}

/// Evaluate a formula over a scope. Pure and total.
pub fn evaluate_formula(formula: &Formula, scope: &EvaluationScope<'_>) -> MetricValue {
    match formula {
        Formula::Percentage {
            numerator,
            denominator,
        } => evaluate_ratio(numerator, denominator, scope, Some(100.0)),
        Formula::Division {
            numerator,
            denominator,
            multiplier,
        } => evaluate_ratio(numerator, denominator, scope, *multiplier),
        node => {
            let fallback = infer_node_entity(node).unwrap_or(EntityKind::Loads);
            evaluate_aggregation_node(node, scope, fallback)
        }
    }
}

fn evaluate_ratio(
    numerator: &Formula,
    denominator: &Formula,
    scope: &EvaluationScope<'_>,
    multiplier: Option<f64>,
) -> MetricValue {
    // A ratio compares like with like: an operand without entity signals of
    // its own inherits the other side's.
    let shared = infer_node_entity(numerator)
        .or_else(|| infer_node_entity(denominator))
        .unwrap_or(EntityKind::Loads);

    let numerator = evaluate_aggregation_node(numerator, scope, shared);
    let denominator = evaluate_aggregation_node(denominator, scope, shared);

    match (numerator, denominator) {
        (MetricValue::Defined(num), MetricValue::Defined(den)) if den != 0.0 => {
            MetricValue::Defined(num / den * multiplier.unwrap_or(1.0))
        }
        _ => MetricValue::Undefined,
    }
}

fn evaluate_aggregation_node(
    node: &Formula,
    scope: &EvaluationScope<'_>,
    fallback: EntityKind,
) -> MetricValue {
    match node {
        Formula::Count { filter } => {
            let entity = infer_node_entity(node).unwrap_or(fallback);
            MetricValue::Defined(matching_records(entity, scope, filter.as_ref()).len() as f64)
        }
        Formula::Sum { field, filter } => {
            aggregate(AggregateFn::Sum, field.as_deref(), filter.as_ref(), scope, fallback)
        }
        Formula::Average { field, filter } => {
            aggregate(AggregateFn::Avg, field.as_deref(), filter.as_ref(), scope, fallback)
        }
        Formula::Aggregation {
            function,
            field,
            filter,
        } => match field.as_deref().and_then(EntityKind::parse) {
            // `field` names a collection: COUNT over it, no value path.
            Some(entity) => match function {
                AggregateFn::Count => MetricValue::Defined(
                    matching_records(entity, scope, filter.as_ref()).len() as f64,
                ),
                _ => MetricValue::Undefined,
            },
            None => aggregate(*function, field.as_deref(), filter.as_ref(), scope, fallback),
        },
        Formula::Field { path } => {
            if let Some(value) = scope.context.get(path) {
                return MetricValue::Defined(*value);
            }
            // A bare scalar reference is a load path unless its namespace
            // says otherwise; it never inherits a sibling's collection.
            let entity = EntityKind::for_path(path).unwrap_or(EntityKind::Loads);
            sum_values(&matching_records(entity, scope, None), path, AggregateFn::Sum)
        }
        // Nested ratios are rejected at validation time.
        Formula::Percentage { .. } | Formula::Division { .. } => MetricValue::Undefined,
    }
}

fn aggregate(
    function: AggregateFn,
    value_field: Option<&str>,
    filter: Option<&Condition>,
    scope: &EvaluationScope<'_>,
    fallback: EntityKind,
) -> MetricValue {
    let entity = entity_for(value_field, filter).unwrap_or(fallback);
    let records = matching_records(entity, scope, filter);

    if function == AggregateFn::Count {
        return MetricValue::Defined(records.len() as f64);
    }

    let Some(path) = value_field else {
        return MetricValue::Undefined;
    };
    sum_values(&records, path, function)
}

fn sum_values(records: &[Record<'_>], path: &str, function: AggregateFn) -> MetricValue {
    let numbers: Vec<f64> = records
        .iter()
        .flat_map(|record| record.resolve_many(path))
        .filter_map(|value| value.as_number())
        .collect();

    if numbers.is_empty() {
        return MetricValue::Undefined;
    }

    let value = match function {
        AggregateFn::Count => numbers.len() as f64,
        AggregateFn::Sum => numbers.iter().sum(),
        AggregateFn::Avg => numbers.iter().sum::<f64>() / numbers.len() as f64,
        AggregateFn::Min => numbers.iter().copied().fold(f64::INFINITY, f64::min),
        AggregateFn::Max => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    };
    MetricValue::Defined(value)
}

fn matching_records<'a>(
    entity: EntityKind,
    scope: &EvaluationScope<'a>,
    filter: Option<&Condition>,
) -> Vec<Record<'a>> {
    let mut records = entity.flatten(scope.loads);
    for segment in &scope.segments {
        records = evaluate_segment(segment, records, scope.overrides, scope.as_of);
    }
    records
        .into_iter()
        .filter(|record| {
            filter
                .map(|condition| evaluate_condition(condition, record))
                .unwrap_or(true)
        })
        .collect()
}

fn entity_for(value_field: Option<&str>, filter: Option<&Condition>) -> Option<EntityKind> {
    if let Some(entity) = value_field.and_then(EntityKind::for_path) {
        return Some(entity);
    }
    let mut paths = Vec::new();
    if let Some(condition) = filter {
        collect_paths(condition, &mut paths);
    }
    paths.iter().find_map(|path| EntityKind::for_path(path))
}

/// Entity signals carried by a single aggregation node.
fn infer_node_entity(node: &Formula) -> Option<EntityKind> {
    match node {
        Formula::Count { filter } => entity_for(None, filter.as_ref()),
        Formula::Sum { field, filter } | Formula::Average { field, filter } => {
            entity_for(field.as_deref(), filter.as_ref())
        }
        Formula::Aggregation { field, filter, .. } => field
            .as_deref()
            .and_then(EntityKind::parse)
            .or_else(|| entity_for(field.as_deref(), filter.as_ref())),
        Formula::Field { path } => EntityKind::for_path(path),
        Formula::Percentage { .. } | Formula::Division { .. } => None,
    }
}

/// Structural defects detected when a metric definition is saved.
#[derive(Debug, thiserror::Error)]
pub enum FormulaError {
    #[error("the {side} of a ratio must be an aggregation block")]
    RatioOperand { side: &'static str },
    #[error("'{function}' aggregation requires a value field path")]
    MissingAggregateField { function: &'static str },
    #[error("field formula requires a non-empty path")]
    EmptyPath,
    #[error(transparent)]
    Filter(#[from] ExpressionError),
}

/// Reject malformed formulas before they reach the evaluator.
pub fn validate_formula(formula: &Formula) -> Result<(), FormulaError> {
    match formula {
        Formula::Percentage {
            numerator,
            denominator,
        }
        | Formula::Division {
            numerator,
            denominator,
            ..
        } => {
            validate_operand(numerator, "numerator")?;
            validate_operand(denominator, "denominator")
        }
        node => validate_aggregation_node(node),
    }
}

fn validate_operand(node: &Formula, side: &'static str) -> Result<(), FormulaError> {
    if matches!(node, Formula::Percentage { .. } | Formula::Division { .. }) {
        return Err(FormulaError::RatioOperand { side });
    }
    validate_aggregation_node(node)
}

fn validate_aggregation_node(node: &Formula) -> Result<(), FormulaError> {
    match node {
        Formula::Count { filter } => validate_filter(filter.as_ref()),
        Formula::Sum { field, filter } => {
            require_value_field(field.as_deref(), "sum")?;
            validate_filter(filter.as_ref())
        }
        Formula::Average { field, filter } => {
            require_value_field(field.as_deref(), "average")?;
            validate_filter(filter.as_ref())
        }
        Formula::Aggregation {
            function,
            field,
            filter,
        } => {
            if *function != AggregateFn::Count {
                let path = field.as_deref().filter(|path| !path.trim().is_empty());
                match path {
                    // A bare collection name gives SUM/AVG/MIN/MAX nothing
                    // to aggregate.
                    Some(path) if EntityKind::parse(path).is_some() => {
                        return Err(FormulaError::MissingAggregateField {
                            function: function.label(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        return Err(FormulaError::MissingAggregateField {
                            function: function.label(),
                        });
                    }
                }
            }
            validate_filter(filter.as_ref())
        }
        Formula::Field { path } => {
            if path.trim().is_empty() {
                Err(FormulaError::EmptyPath)
            } else {
                Ok(())
            }
        }
        Formula::Percentage { .. } | Formula::Division { .. } => Ok(()),
    }
}

fn require_value_field(field: Option<&str>, function: &'static str) -> Result<(), FormulaError> {
    match field {
        Some(path) if !path.trim().is_empty() => Ok(()),
        _ => Err(FormulaError::MissingAggregateField { function }),
    }
}

fn validate_filter(filter: Option<&Condition>) -> Result<(), FormulaError> {
    if let Some(condition) = filter {
        validate_condition(condition)?;
    }
    Ok(())
}
