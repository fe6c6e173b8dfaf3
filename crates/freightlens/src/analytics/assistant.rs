//! Keyword-driven prompt assistant.
//!
//! Not a model: an ordered table of `(predicate over the prompt, template
//! builder)` pairs. The first matching rule produces a partial metric or
//! segment draft in the same wire shapes as stored definitions, for the
//! form UI to pre-fill. Unknown prompts produce `None`.

use serde::Serialize;

use super::definitions::{MetricCategory, ReturnType, SegmentEntity, SegmentType, ALL_METRICS};
use super::expression::{
    all_of, any_of, eq_text, is_null, leaf, ne_text, CompareOp, Comparison, Condition,
    ConditionValue, Literal, ValueSource,
};
use super::formula::{AggregateFn, Formula};

/// A pre-filled definition produced from a free-text prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AssistantSuggestion {
    Metric(MetricDraft),
    Segment(SegmentDraft),
}

/// Partial metric definition: everything but identity and lifecycle fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDraft {
    pub metric_name: String,
    pub metric_code: String,
    pub description: String,
    pub formula: Formula,
    pub return_type: ReturnType,
    pub unit: String,
    pub precision: u8,
    pub category: MetricCategory,
    pub is_baseline: bool,
}

/// Partial segment definition in the stored wire shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentDraft {
    pub segment_name: String,
    pub segment_code: String,
    pub description: String,
    pub segment_type: SegmentType,
    pub applies_to: Vec<SegmentEntity>,
    pub affected_metrics: Vec<String>,
    pub rules: Condition,
    pub auto_apply: bool,
    pub is_active: bool,
}

struct Prompt {
    lower: String,
}

impl Prompt {
    fn new(text: &str) -> Self {
        Self {
            lower: text.to_lowercase(),
        }
    }

    fn has(&self, needle: &str) -> bool {
        self.lower.contains(needle)
    }

    fn has_any(&self, needles: &[&str]) -> bool {
        needles.iter().any(|needle| self.has(needle))
    }
}

struct AssistantRule {
    applies: fn(&Prompt) -> bool,
    build: fn(&Prompt) -> AssistantSuggestion,
}

/// Ordered dispatch table: metric templates first, then segment templates.
const RULES: &[AssistantRule] = &[
    AssistantRule {
        applies: |p| p.has_any(&["on-time", "on time", "otp"]) && p.has("pickup"),
        build: on_time_pickup_metric,
    },
    AssistantRule {
        applies: |p| p.has_any(&["on-time", "on time", "otd"]) && p.has("deliver"),
        build: on_time_delivery_metric,
    },
    AssistantRule {
        applies: |p| p.has("tender") && p.has_any(&["accept", "rate"]),
        build: tender_acceptance_metric,
    },
    AssistantRule {
        applies: |p| p.has("dwell"),
        build: dwell_metric,
    },
    AssistantRule {
        applies: |p| p.has("cost") && p.has("mile"),
        build: cost_per_mile_metric,
    },
    AssistantRule {
        applies: |p| p.has("shipper") && p.has_any(&["exclude", "fault", "delay"]),
        build: |_| fault_segment("SHIPPER", true),
    },
    AssistantRule {
        applies: |p| p.has("customer") && p.has_any(&["exclude", "fault", "delay"]),
        build: |_| fault_segment("CUSTOMER", true),
    },
    AssistantRule {
        applies: |p| p.has("carrier") && p.has_any(&["exclude", "fault", "delay"]),
        build: |_| fault_segment("CARRIER", false),
    },
    AssistantRule {
        applies: |p| p.has("primary") && p.has("contract"),
        build: primary_contract_segment,
    },
    AssistantRule {
        applies: |p| p.has("backup") && p.has("contract"),
        build: backup_contract_segment,
    },
    AssistantRule {
        applies: |p| p.has("test") && p.has_any(&["load", "exclude"]),
        build: test_loads_segment,
    },
    AssistantRule {
        applies: |p| p.has("weather"),
        build: weather_segment,
    },
    AssistantRule {
        applies: |p| p.has("force") && p.has("majeure"),
        build: force_majeure_segment,
    },
    AssistantRule {
        applies: |p| p.has("pickup") && p.has_any(&["only", "include"]),
        build: |_| stop_type_segment("PICKUP"),
    },
    AssistantRule {
        applies: |p| p.has("delivery") && p.has_any(&["only", "include"]),
        build: |_| stop_type_segment("DELIVERY"),
    },
];

/// Map a free-text prompt to a pre-filled definition, if any rule matches.
pub fn suggest(prompt: &str) -> Option<AssistantSuggestion> {
    let prompt = Prompt::new(prompt);
    RULES
        .iter()
        .find(|rule| (rule.applies)(&prompt))
        .map(|rule| (rule.build)(&prompt))
}

/// `<field> <= field reference` in the builder-UI shape
/// (`value_type: "field"` + `value_field`).
fn le_field_ref(field: &str, reference: &str) -> Condition {
    Condition::Leaf(Comparison {
        field: field.to_string(),
        operator: CompareOp::Le,
        value: None,
        value_type: Some(ValueSource::Field),
        value_field: Some(reference.to_string()),
    })
}

fn count_over(entity: &str, filter: Condition) -> Formula {
    Formula::Aggregation {
        function: AggregateFn::Count,
        field: Some(entity.to_string()),
        filter: Some(filter),
    }
}

fn count_over_all(entity: &str) -> Formula {
    Formula::Aggregation {
        function: AggregateFn::Count,
        field: Some(entity.to_string()),
        filter: None,
    }
}

fn on_time_pickup_metric(prompt: &Prompt) -> AssistantSuggestion {
    let original = prompt.has("original");
    let exclude_shipper = prompt.has("exclud") && prompt.has("shipper");

    let reference = if original {
        "appointment.original_earliest"
    } else {
        "appointment.scheduled_earliest"
    };

    let mut numerator_conditions = vec![
        le_field_ref("actual.arrival", reference),
        eq_text("stop_type", "PICKUP"),
    ];
    let mut denominator_conditions = vec![eq_text("stop_type", "PICKUP")];
    if exclude_shipper {
        numerator_conditions.push(ne_text("late_reason.responsible_party", "SHIPPER"));
        denominator_conditions.push(ne_text("late_reason.responsible_party", "SHIPPER"));
    }

    let denominator = if denominator_conditions.len() == 1 {
        count_over(
            "stops",
            denominator_conditions.pop().unwrap_or(eq_text("stop_type", "PICKUP")),
        )
    } else {
        count_over("stops", all_of(denominator_conditions))
    };

    let mut name = "On-Time Pickup".to_string();
    let mut code = "OTP".to_string();
    if original {
        name.push_str(" (Original Appt)");
        code.push_str("_ORIG");
    }
    if exclude_shipper {
        name.push_str(" Excl. Shipper");
        code.push_str("_NO_SHIPPER");
    }

    AssistantSuggestion::Metric(MetricDraft {
        metric_name: name,
        metric_code: code,
        description: format!(
            "Percentage of pickups arriving on time compared to the {} appointment{}",
            if original { "original" } else { "scheduled" },
            if exclude_shipper {
                ", excluding shipper-caused delays"
            } else {
                ""
            }
        ),
        formula: Formula::Percentage {
            numerator: Box::new(count_over("stops", all_of(numerator_conditions))),
            denominator: Box::new(denominator),
        },
        return_type: ReturnType::Percentage,
        unit: "%".to_string(),
        precision: 1,
        category: MetricCategory::Performance,
        is_baseline: false,
    })
}

fn on_time_delivery_metric(prompt: &Prompt) -> AssistantSuggestion {
    let exclude_customer = prompt.has("exclud") && prompt.has("customer");

    let mut numerator_conditions = vec![
        le_field_ref("actual.arrival", "appointment.scheduled_latest"),
        eq_text("stop_type", "DELIVERY"),
    ];
    let mut denominator_conditions = vec![eq_text("stop_type", "DELIVERY")];
    if exclude_customer {
        numerator_conditions.push(ne_text("late_reason.responsible_party", "CUSTOMER"));
        denominator_conditions.push(ne_text("late_reason.responsible_party", "CUSTOMER"));
    }

    let denominator = if denominator_conditions.len() == 1 {
        count_over(
            "stops",
            denominator_conditions.pop().unwrap_or(eq_text("stop_type", "DELIVERY")),
        )
    } else {
        count_over("stops", all_of(denominator_conditions))
    };

    AssistantSuggestion::Metric(MetricDraft {
        metric_name: if exclude_customer {
            "On-Time Delivery Excl. Customer".to_string()
        } else {
            "On-Time Delivery".to_string()
        },
        metric_code: if exclude_customer {
            "OTD_NO_CUSTOMER".to_string()
        } else {
            "OTD".to_string()
        },
        description: format!(
            "Percentage of deliveries arriving on time{}",
            if exclude_customer {
                ", excluding customer-caused delays"
            } else {
                ""
            }
        ),
        formula: Formula::Percentage {
            numerator: Box::new(count_over("stops", all_of(numerator_conditions))),
            denominator: Box::new(denominator),
        },
        return_type: ReturnType::Percentage,
        unit: "%".to_string(),
        precision: 1,
        category: MetricCategory::Performance,
        is_baseline: false,
    })
}

fn tender_acceptance_metric(prompt: &Prompt) -> AssistantSuggestion {
    let primary_only = prompt.has("primary");

    let numerator = if primary_only {
        count_over(
            "tenders",
            all_of(vec![
                eq_text("status", "ACCEPTED"),
                eq_text("contract_type", "CONTRACT_PRIMARY"),
            ]),
        )
    } else {
        count_over("tenders", eq_text("status", "ACCEPTED"))
    };
    let denominator = if primary_only {
        count_over("tenders", eq_text("contract_type", "CONTRACT_PRIMARY"))
    } else {
        count_over_all("tenders")
    };

    AssistantSuggestion::Metric(MetricDraft {
        metric_name: if primary_only {
            "Tender Acceptance Rate (Primary Only)".to_string()
        } else {
            "Tender Acceptance Rate".to_string()
        },
        metric_code: if primary_only {
            "TAR_PRIMARY".to_string()
        } else {
            "TAR".to_string()
        },
        description: format!(
            "Percentage of tenders accepted{}",
            if primary_only {
                " for primary contracts only"
            } else {
                ""
            }
        ),
        formula: Formula::Percentage {
            numerator: Box::new(numerator),
            denominator: Box::new(denominator),
        },
        return_type: ReturnType::Percentage,
        unit: "%".to_string(),
        precision: 1,
        category: MetricCategory::Tender,
        is_baseline: false,
    })
}

fn dwell_metric(prompt: &Prompt) -> AssistantSuggestion {
    let delivery = prompt.has("deliver");
    let pickup = !delivery && prompt.has("pickup");

    let filter = if delivery {
        Some(eq_text("stop_type", "DELIVERY"))
    } else if pickup {
        Some(eq_text("stop_type", "PICKUP"))
    } else {
        None
    };

    let (suffix, code_suffix) = if delivery {
        (" (Delivery)", "_DEL")
    } else if pickup {
        (" (Pickup)", "_PU")
    } else {
        ("", "")
    };

    AssistantSuggestion::Metric(MetricDraft {
        metric_name: format!("Average Dwell Time{suffix}"),
        metric_code: format!("AVG_DWELL{code_suffix}"),
        description: format!(
            "Average dwell time in minutes{}",
            if delivery {
                " at delivery locations"
            } else if pickup {
                " at pickup locations"
            } else {
                ""
            }
        ),
        formula: Formula::Average {
            field: Some("dwell_time_minutes".to_string()),
            filter,
        },
        return_type: ReturnType::Duration,
        unit: "min".to_string(),
        precision: 0,
        category: MetricCategory::Dwell,
        is_baseline: false,
    })
}

fn cost_per_mile_metric(prompt: &Prompt) -> AssistantSuggestion {
    let exclude_fuel = prompt.has("exclud") && prompt.has("fuel");

    let numerator = Formula::Aggregation {
        function: AggregateFn::Sum,
        field: Some("charges.line_items.amount.value".to_string()),
        filter: exclude_fuel.then(|| ne_text("charge_type", "FUEL_SURCHARGE")),
    };
    let denominator = Formula::Sum {
        field: Some("length_of_haul.value".to_string()),
        filter: Some(leaf(
            "length_of_haul.value",
            CompareOp::Gt,
            Some(ConditionValue::Scalar(Literal::Number(0.0))),
        )),
    };

    AssistantSuggestion::Metric(MetricDraft {
        metric_name: if exclude_fuel {
            "Cost Per Mile (Excl. Fuel)".to_string()
        } else {
            "Cost Per Mile".to_string()
        },
        metric_code: if exclude_fuel {
            "CPM_NO_FUEL".to_string()
        } else {
            "CPM".to_string()
        },
        description: format!(
            "Average cost per mile{}",
            if exclude_fuel {
                " excluding fuel surcharges"
            } else {
                ""
            }
        ),
        formula: Formula::Division {
            numerator: Box::new(numerator),
            denominator: Box::new(denominator),
            multiplier: None,
        },
        return_type: ReturnType::Currency,
        unit: "USD".to_string(),
        precision: 2,
        category: MetricCategory::Cost,
        is_baseline: false,
    })
}

fn fault_segment(party: &str, auto_apply: bool) -> AssistantSuggestion {
    let (name, code, affected): (&str, &str, &[&str]) = match party {
        "SHIPPER" => (
            "Exclude Shipper Fault",
            "NO_SHIPPER_FAULT",
            &["OTP_EXACT", "OTP_15MIN", "OTP_60MIN"],
        ),
        "CUSTOMER" => (
            "Exclude Customer Fault",
            "NO_CUSTOMER_FAULT",
            &["OTD_EXACT", "OTD_15MIN"],
        ),
        _ => (
            "Exclude Carrier Fault",
            "NO_CARRIER_FAULT",
            &["OTP_EXACT", "OTP_15MIN", "OTD_EXACT", "OTD_15MIN"],
        ),
    };

    AssistantSuggestion::Segment(SegmentDraft {
        segment_name: name.to_string(),
        segment_code: code.to_string(),
        description: format!(
            "Excludes stops where delays were the {}'s responsibility",
            party.to_lowercase()
        ),
        segment_type: SegmentType::Exclusion,
        applies_to: vec![SegmentEntity::Stop],
        affected_metrics: affected.iter().map(|c| c.to_string()).collect(),
        rules: any_of(vec![
            ne_text("late_reason.responsible_party", party),
            is_null("late_reason"),
        ]),
        auto_apply,
        is_active: true,
    })
}

fn primary_contract_segment(prompt: &Prompt) -> AssistantSuggestion {
    let inclusion = prompt.has_any(&["only", "include"]);

    AssistantSuggestion::Segment(SegmentDraft {
        segment_name: if inclusion {
            "Primary Contract Only".to_string()
        } else {
            "Exclude Primary Contract".to_string()
        },
        segment_code: if inclusion {
            "PRIMARY_ONLY".to_string()
        } else {
            "NO_PRIMARY".to_string()
        },
        description: if inclusion {
            "Includes only primary contract loads".to_string()
        } else {
            "Excludes primary contract loads".to_string()
        },
        segment_type: if inclusion {
            SegmentType::Inclusion
        } else {
            SegmentType::Exclusion
        },
        applies_to: vec![SegmentEntity::Load],
        affected_metrics: vec![
            "TENDER_ACCEPTANCE_RATE".to_string(),
            "CPM_ALL_IN".to_string(),
        ],
        rules: if inclusion {
            eq_text("contract_type", "CONTRACT_PRIMARY")
        } else {
            ne_text("contract_type", "CONTRACT_PRIMARY")
        },
        auto_apply: false,
        is_active: true,
    })
}

fn backup_contract_segment(_prompt: &Prompt) -> AssistantSuggestion {
    AssistantSuggestion::Segment(SegmentDraft {
        segment_name: "Exclude Backup Contract".to_string(),
        segment_code: "NO_BACKUP".to_string(),
        description: "Excludes backup contract loads from calculations".to_string(),
        segment_type: SegmentType::Exclusion,
        applies_to: vec![SegmentEntity::Load],
        affected_metrics: vec!["TENDER_ACCEPTANCE_RATE".to_string()],
        rules: ne_text("contract_type", "CONTRACT_BACKUP"),
        auto_apply: true,
        is_active: true,
    })
}

fn test_loads_segment(_prompt: &Prompt) -> AssistantSuggestion {
    AssistantSuggestion::Segment(SegmentDraft {
        segment_name: "Exclude Test Loads".to_string(),
        segment_code: "NO_TEST_LOADS".to_string(),
        description: "Excludes test/trial loads from operational metrics".to_string(),
        segment_type: SegmentType::Exclusion,
        applies_to: vec![SegmentEntity::Load],
        affected_metrics: vec![ALL_METRICS.to_string()],
        rules: any_of(vec![
            leaf(
                "metadata.is_test",
                CompareOp::Ne,
                Some(ConditionValue::Scalar(Literal::Flag(true))),
            ),
            is_null("metadata.is_test"),
        ]),
        auto_apply: true,
        is_active: true,
    })
}

fn weather_segment(_prompt: &Prompt) -> AssistantSuggestion {
    AssistantSuggestion::Segment(SegmentDraft {
        segment_name: "Exclude Weather Delays".to_string(),
        segment_code: "NO_WEATHER".to_string(),
        description: "Excludes weather-related delays from on-time metrics".to_string(),
        segment_type: SegmentType::Exclusion,
        applies_to: vec![SegmentEntity::Stop],
        affected_metrics: ["OTP_EXACT", "OTP_15MIN", "OTP_60MIN", "OTD_EXACT", "OTD_15MIN"]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        rules: ne_text("late_reason.code", "WEATHER_DELAY"),
        auto_apply: false,
        is_active: true,
    })
}

fn force_majeure_segment(_prompt: &Prompt) -> AssistantSuggestion {
    AssistantSuggestion::Segment(SegmentDraft {
        segment_name: "Exclude Force Majeure".to_string(),
        segment_code: "NO_FORCE_MAJEURE".to_string(),
        description: "Excludes delays caused by force majeure events".to_string(),
        segment_type: SegmentType::Exclusion,
        applies_to: vec![SegmentEntity::Stop],
        affected_metrics: ["OTP_EXACT", "OTP_15MIN", "OTD_EXACT", "OTD_15MIN"]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        rules: ne_text("late_reason.responsible_party", "FORCE_MAJEURE"),
        auto_apply: false,
        is_active: true,
    })
}

fn stop_type_segment(stop_type: &str) -> AssistantSuggestion {
    let pickup = stop_type == "PICKUP";
    AssistantSuggestion::Segment(SegmentDraft {
        segment_name: if pickup {
            "Pickups Only".to_string()
        } else {
            "Deliveries Only".to_string()
        },
        segment_code: if pickup {
            "PICKUP_ONLY".to_string()
        } else {
            "DELIVERY_ONLY".to_string()
        },
        description: format!(
            "Includes only {} stops in calculations",
            if pickup { "pickup" } else { "delivery" }
        ),
        segment_type: SegmentType::Inclusion,
        applies_to: vec![SegmentEntity::Stop],
        affected_metrics: if pickup {
            vec!["OTP_EXACT".to_string(), "OTP_15MIN".to_string()]
        } else {
            vec!["OTD_EXACT".to_string(), "OTD_15MIN".to_string()]
        },
        rules: eq_text("stop_type", stop_type),
        auto_apply: false,
        is_active: true,
    })
}
