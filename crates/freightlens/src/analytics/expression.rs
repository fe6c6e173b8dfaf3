//! The filter condition language shared by metric formulas and segments.
//!
//! The serde shapes mirror the stored JSON exactly: leaves are
//! `{field, operator, value}` (with the builder-UI variant carrying
//! `value_type`/`value_field`), nullary leaves drop `value`, and groups are
//! `{type: "and"|"or", conditions: [...]}`. Evaluation is total over any
//! record; malformed definitions are caught by [`validate_condition`] at
//! save time instead.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::field::{compare_order, values_equal, FieldValue, Record};

/// Comparison operator of a leaf condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "IS_NULL")]
    IsNull,
    #[serde(rename = "IS_NOT_NULL")]
    IsNotNull,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "NOT_IN")]
    NotIn,
}

impl CompareOp {
    pub const fn label(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::IsNull => "IS_NULL",
            CompareOp::IsNotNull => "IS_NOT_NULL",
            CompareOp::In => "IN",
            CompareOp::NotIn => "NOT_IN",
        }
    }

    const fn is_nullary(self) -> bool {
        matches!(self, CompareOp::IsNull | CompareOp::IsNotNull)
    }

    const fn takes_list(self) -> bool {
        matches!(self, CompareOp::In | CompareOp::NotIn)
    }
}

/// Boolean combinator of a compound condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Combinator {
    #[serde(rename = "and", alias = "AND")]
    And,
    #[serde(rename = "or", alias = "OR")]
    Or,
}

/// A filter condition: either a single comparison or a nested boolean group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Group(ConditionGroup),
    Leaf(Comparison),
}

/// AND/OR over two or more child conditions.
///
/// Stored definitions carry the combinator under `type`, some legacy rows
/// additionally (or only) under `operator`; both keys round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<Combinator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<Combinator>,
    pub conditions: Vec<Condition>,
}

impl ConditionGroup {
    pub fn combinator(&self) -> Option<Combinator> {
        self.kind.or(self.operator)
    }
}

/// Leaf comparison of a field path against a static literal, a literal set,
/// or a reference to another field on the same record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub field: String,
    pub operator: CompareOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ConditionValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_field: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueSource {
    #[serde(rename = "static")]
    Static,
    #[serde(rename = "field")]
    Field,
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Reference(FieldRef),
    List(Vec<Literal>),
    Scalar(Literal),
}

/// Reference to another field on the record, optionally shifted in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRef {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<TimeUnit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    #[serde(rename = "minutes")]
    Minutes,
    #[serde(rename = "hours")]
    Hours,
    #[serde(rename = "days")]
    Days,
}

impl TimeUnit {
    fn duration(self, magnitude: f64) -> Duration {
        let seconds = match self {
            TimeUnit::Minutes => magnitude * 60.0,
            TimeUnit::Hours => magnitude * 3600.0,
            TimeUnit::Days => magnitude * 86_400.0,
        };
        Duration::seconds(seconds as i64)
    }
}

/// A literal leaf value as stored: string, number, or boolean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl Literal {
    pub(crate) fn to_field_value(&self) -> FieldValue {
        match self {
            Literal::Flag(value) => FieldValue::Flag(*value),
            Literal::Number(value) => FieldValue::Number(*value),
            Literal::Text(value) => FieldValue::Text(value.clone()),
        }
    }
}

/// Evaluate a condition against a record. Total: never panics, absent or
/// incomparable values follow the filter-language rules.
pub fn evaluate_condition(condition: &Condition, record: &Record<'_>) -> bool {
    match condition {
        Condition::Group(group) => match group.combinator().unwrap_or(Combinator::And) {
            Combinator::And => group
                .conditions
                .iter()
                .all(|child| evaluate_condition(child, record)),
            Combinator::Or => group
                .conditions
                .iter()
                .any(|child| evaluate_condition(child, record)),
        },
        Condition::Leaf(comparison) => evaluate_comparison(comparison, record),
    }
}

fn evaluate_comparison(comparison: &Comparison, record: &Record<'_>) -> bool {
    let lhs = record.resolve(&comparison.field);

    match comparison.operator {
        CompareOp::IsNull => lhs.is_absent(),
        CompareOp::IsNotNull => !lhs.is_absent(),
        CompareOp::In | CompareOp::NotIn => {
            let contained = match &comparison.value {
                Some(ConditionValue::List(items)) => items
                    .iter()
                    .any(|item| values_equal(&lhs, &item.to_field_value())),
                Some(ConditionValue::Scalar(item)) => values_equal(&lhs, &item.to_field_value()),
                _ => false,
            };
            if comparison.operator == CompareOp::In {
                contained
            } else {
                !contained
            }
        }
        CompareOp::Eq => values_equal(&lhs, &resolve_comparand(comparison, record)),
        CompareOp::Ne => !values_equal(&lhs, &resolve_comparand(comparison, record)),
        CompareOp::Gt | CompareOp::Ge | CompareOp::Lt | CompareOp::Le => {
            let rhs = resolve_comparand(comparison, record);
            match compare_order(&lhs, &rhs) {
                Some(ordering) => match comparison.operator {
                    CompareOp::Gt => ordering.is_gt(),
                    CompareOp::Ge => ordering.is_ge(),
                    CompareOp::Lt => ordering.is_lt(),
                    CompareOp::Le => ordering.is_le(),
                    _ => false,
                },
                None => false,
            }
        }
    }
}

fn resolve_comparand(comparison: &Comparison, record: &Record<'_>) -> FieldValue {
    if comparison.value_type == Some(ValueSource::Field) {
        if let Some(path) = &comparison.value_field {
            return record.resolve(path);
        }
    }

    match &comparison.value {
        Some(ConditionValue::Reference(reference)) => {
            let resolved = record.resolve(&reference.field);
            match (resolved, reference.offset) {
                (FieldValue::Instant(at), Some(offset)) => {
                    let unit = reference.unit.unwrap_or(TimeUnit::Minutes);
                    FieldValue::Instant(at + unit.duration(offset))
                }
                (value, _) => value,
            }
        }
        Some(ConditionValue::Scalar(literal)) => literal.to_field_value(),
        Some(ConditionValue::List(_)) | None => FieldValue::Absent,
    }
}

/// Structural defects detected when a definition is saved.
#[derive(Debug, thiserror::Error)]
pub enum ExpressionError {
    #[error("condition is missing a field path")]
    EmptyFieldPath,
    #[error("operator '{operator}' requires a comparison value")]
    MissingValue { operator: &'static str },
    #[error("value_type 'field' requires a value_field path")]
    MissingReferenceField,
    #[error("operator '{operator}' requires a list of literal values")]
    ExpectedValueList { operator: &'static str },
    #[error("compound condition is missing its and/or combinator")]
    MissingCombinator,
    #[error("compound condition requires at least two children, found {found}")]
    TooFewConditions { found: usize },
    #[error("field reference is missing its field path")]
    EmptyReferencePath,
}

/// Reject malformed conditions before they reach the evaluator.
pub fn validate_condition(condition: &Condition) -> Result<(), ExpressionError> {
    match condition {
        Condition::Group(group) => {
            if group.combinator().is_none() {
                return Err(ExpressionError::MissingCombinator);
            }
            if group.conditions.len() < 2 {
                return Err(ExpressionError::TooFewConditions {
                    found: group.conditions.len(),
                });
            }
            for child in &group.conditions {
                validate_condition(child)?;
            }
            Ok(())
        }
        Condition::Leaf(comparison) => validate_comparison(comparison),
    }
}

fn validate_comparison(comparison: &Comparison) -> Result<(), ExpressionError> {
    if comparison.field.trim().is_empty() {
        return Err(ExpressionError::EmptyFieldPath);
    }

    let operator = comparison.operator;
    if operator.is_nullary() {
        return Ok(());
    }

    if operator.takes_list() {
        return match &comparison.value {
            Some(ConditionValue::List(items)) if !items.is_empty() => Ok(()),
            _ => Err(ExpressionError::ExpectedValueList {
                operator: operator.label(),
            }),
        };
    }

    if comparison.value_type == Some(ValueSource::Field) {
        let has_reference = comparison.value_field.is_some()
            || matches!(comparison.value, Some(ConditionValue::Reference(_)));
        if !has_reference {
            return Err(ExpressionError::MissingReferenceField);
        }
        return Ok(());
    }

    match &comparison.value {
        Some(ConditionValue::Reference(reference)) if reference.field.trim().is_empty() => {
            Err(ExpressionError::EmptyReferencePath)
        }
        Some(_) => Ok(()),
        None => Err(ExpressionError::MissingValue {
            operator: operator.label(),
        }),
    }
}

// Builders used by the baseline catalogs, the reporting layer, and the
// prompt assistant.

pub(crate) fn leaf(field: &str, operator: CompareOp, value: Option<ConditionValue>) -> Condition {
    Condition::Leaf(Comparison {
        field: field.to_string(),
        operator,
        value,
        value_type: None,
        value_field: None,
    })
}

pub(crate) fn eq_text(field: &str, value: &str) -> Condition {
    leaf(
        field,
        CompareOp::Eq,
        Some(ConditionValue::Scalar(Literal::Text(value.to_string()))),
    )
}

pub(crate) fn ne_text(field: &str, value: &str) -> Condition {
    leaf(
        field,
        CompareOp::Ne,
        Some(ConditionValue::Scalar(Literal::Text(value.to_string()))),
    )
}

pub(crate) fn ne_flag(field: &str, value: bool) -> Condition {
    leaf(
        field,
        CompareOp::Ne,
        Some(ConditionValue::Scalar(Literal::Flag(value))),
    )
}

pub(crate) fn is_null(field: &str) -> Condition {
    leaf(field, CompareOp::IsNull, None)
}

pub(crate) fn is_not_null(field: &str) -> Condition {
    leaf(field, CompareOp::IsNotNull, None)
}

/// `<field> <= <reference> (+ offset minutes)`, the on-time comparison shape.
pub(crate) fn at_or_before(field: &str, reference: &str, offset_minutes: Option<f64>) -> Condition {
    Condition::Leaf(Comparison {
        field: field.to_string(),
        operator: CompareOp::Le,
        value: Some(ConditionValue::Reference(FieldRef {
            field: reference.to_string(),
            offset: offset_minutes,
            unit: offset_minutes.map(|_| TimeUnit::Minutes),
        })),
        value_type: None,
        value_field: None,
    })
}

pub(crate) fn all_of(conditions: Vec<Condition>) -> Condition {
    Condition::Group(ConditionGroup {
        kind: Some(Combinator::And),
        operator: None,
        conditions,
    })
}

pub(crate) fn any_of(conditions: Vec<Condition>) -> Condition {
    Condition::Group(ConditionGroup {
        kind: Some(Combinator::Or),
        operator: None,
        conditions,
    })
}

/// Collect every field path a condition touches (left-hand sides and
/// references); used for entity inference and fault-segment classification.
pub(crate) fn collect_paths<'a>(condition: &'a Condition, into: &mut Vec<&'a str>) {
    match condition {
        Condition::Group(group) => {
            for child in &group.conditions {
                collect_paths(child, into);
            }
        }
        Condition::Leaf(comparison) => {
            into.push(comparison.field.as_str());
            if let Some(path) = &comparison.value_field {
                into.push(path.as_str());
            }
            if let Some(ConditionValue::Reference(reference)) = &comparison.value {
                into.push(reference.field.as_str());
            }
        }
    }
}
