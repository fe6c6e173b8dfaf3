//! Dotted-path field access over transactional records.
//!
//! Every lookup is total: a missing link anywhere along the path yields
//! [`FieldValue::Absent`] rather than an error, and the comparison helpers
//! treat `Absent` per the filter-language rules (`=` never matches it,
//! `!=` always does).

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ActualTimes, Appointment, CarrierRef, ChargeLineItem, LateReason, LengthOfHaul, Load, Location,
    Stop, Tender,
};

/// Resolved value of a dotted path on a record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// The path, or an intermediate link, does not exist on this record.
    Absent,
    /// The path lands on a present container rather than a scalar.
    Composite,
    Text(String),
    Number(f64),
    Flag(bool),
    Instant(DateTime<Utc>),
}

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Instant view of the value; textual timestamps are coerced so that
    /// time-typed comparisons resolve both sides to an absolute instant.
    pub fn as_instant(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Instant(at) => Some(*at),
            FieldValue::Text(raw) => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|at| at.with_timezone(&Utc)),
            _ => None,
        }
    }

    fn of_text(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }

    fn of_opt_instant(value: Option<DateTime<Utc>>) -> Self {
        value.map(FieldValue::Instant).unwrap_or(FieldValue::Absent)
    }
}

/// Equality per the filter language: `Absent` and `Composite` equal nothing.
pub(crate) fn values_equal(lhs: &FieldValue, rhs: &FieldValue) -> bool {
    match (lhs, rhs) {
        (FieldValue::Absent | FieldValue::Composite, _)
        | (_, FieldValue::Absent | FieldValue::Composite) => false,
        (FieldValue::Number(a), FieldValue::Number(b)) => a == b,
        (FieldValue::Flag(a), FieldValue::Flag(b)) => a == b,
        (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
        (FieldValue::Instant(_), _) | (_, FieldValue::Instant(_)) => {
            match (lhs.as_instant(), rhs.as_instant()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        _ => false,
    }
}

/// Ordering per the filter language; `None` for absent or incomparable pairs.
pub(crate) fn compare_order(lhs: &FieldValue, rhs: &FieldValue) -> Option<Ordering> {
    match (lhs, rhs) {
        (FieldValue::Absent | FieldValue::Composite, _)
        | (_, FieldValue::Absent | FieldValue::Composite) => None,
        (FieldValue::Number(a), FieldValue::Number(b)) => a.partial_cmp(b),
        (FieldValue::Instant(_), _) | (_, FieldValue::Instant(_)) => {
            match (lhs.as_instant(), rhs.as_instant()) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => None,
            }
        }
        (FieldValue::Text(a), FieldValue::Text(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// The entity collections a formula or segment can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    #[serde(rename = "loads")]
    Loads,
    #[serde(rename = "stops")]
    Stops,
    #[serde(rename = "tenders")]
    Tenders,
    #[serde(rename = "charges.line_items")]
    ChargeItems,
}

impl EntityKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "loads" => Some(EntityKind::Loads),
            "stops" => Some(EntityKind::Stops),
            "tenders" => Some(EntityKind::Tenders),
            "charges.line_items" => Some(EntityKind::ChargeItems),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            EntityKind::Loads => "loads",
            EntityKind::Stops => "stops",
            EntityKind::Tenders => "tenders",
            EntityKind::ChargeItems => "charges.line_items",
        }
    }

    /// Flatten the collection out of a set of loads.
    pub fn flatten<'a>(self, loads: &'a [Load]) -> Vec<Record<'a>> {
        match self {
            EntityKind::Loads => loads.iter().map(Record::Load).collect(),
            EntityKind::Stops => loads
                .iter()
                .flat_map(|load| load.stops.iter().map(move |stop| Record::Stop { load, stop }))
                .collect(),
            EntityKind::Tenders => loads
                .iter()
                .map(|load| Record::Tender {
                    load,
                    tender: &load.tender,
                })
                .collect(),
            EntityKind::ChargeItems => loads
                .iter()
                .flat_map(|load| {
                    load.charges
                        .iter()
                        .flat_map(|charges| charges.line_items.iter())
                        .map(move |item| Record::Charge { load, item })
                })
                .collect(),
        }
    }

    /// Infer the collection a field path belongs to from its namespace.
    ///
    /// Stop, tender, charge, and load namespaces are each unambiguous;
    /// `tender.`-prefixed paths address the tender through its load. Paths
    /// outside every known namespace return `None` and the caller decides.
    pub fn for_path(path: &str) -> Option<Self> {
        if path.starts_with("charges.line_items") {
            return Some(EntityKind::ChargeItems);
        }
        let head = path.split('.').next().unwrap_or(path);
        match head {
            "charge_type" | "amount" => Some(EntityKind::ChargeItems),
            "stop_id" | "stop_type" | "loading_type" | "sequence" | "appointment" | "actual"
            | "late_reason" | "dwell_time_minutes" | "location" | "stops" => {
                Some(EntityKind::Stops)
            }
            "tendered_at" | "accepted_at" | "rejected_at" | "rejection_reason"
            | "response_hours" | "status" | "tenders" => Some(EntityKind::Tenders),
            "load_id" | "load_type" | "load_status" | "mode" | "equipment_type" | "carrier"
            | "contract_type" | "length_of_haul" | "charges" | "tender" | "metadata"
            | "tender_response_hours" | "first_tender_status" | "lane_code" | "loads" => {
                Some(EntityKind::Loads)
            }
            _ => None,
        }
    }
}

/// A single evaluable entity, always anchored to its owning load.
#[derive(Debug, Clone, Copy)]
pub enum Record<'a> {
    Load(&'a Load),
    Stop { load: &'a Load, stop: &'a Stop },
    Tender { load: &'a Load, tender: &'a Tender },
    Charge { load: &'a Load, item: &'a ChargeLineItem },
}

impl<'a> Record<'a> {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::Load(_) => EntityKind::Loads,
            Record::Stop { .. } => EntityKind::Stops,
            Record::Tender { .. } => EntityKind::Tenders,
            Record::Charge { .. } => EntityKind::ChargeItems,
        }
    }

    pub fn owning_load(&self) -> &'a Load {
        match self {
            Record::Load(load)
            | Record::Stop { load, .. }
            | Record::Tender { load, .. }
            | Record::Charge { load, .. } => load,
        }
    }

    /// Identity used for override matching. Tenders and charge line items
    /// carry no id of their own and answer to their owning load.
    pub fn entity_id(&self) -> &'a str {
        match self {
            Record::Load(load) => &load.load_id,
            Record::Stop { stop, .. } => &stop.stop_id,
            Record::Tender { load, .. } | Record::Charge { load, .. } => &load.load_id,
        }
    }

    /// Resolve a dotted path to a scalar, `Absent` when any link is missing.
    pub fn resolve(&self, path: &str) -> FieldValue {
        match self {
            Record::Load(load) => resolve_on_load(load, path),
            Record::Stop { load, stop } => {
                let path = path.strip_prefix("stops.").unwrap_or(path);
                match resolve_on_stop(stop, path) {
                    Some(value) => value,
                    None => resolve_on_load(load, path),
                }
            }
            Record::Tender { load, tender } => {
                let path = path
                    .strip_prefix("tenders.")
                    .or_else(|| path.strip_prefix("tender."))
                    .unwrap_or(path);
                match resolve_on_tender(tender, path) {
                    Some(value) => value,
                    None => resolve_on_load(load, path),
                }
            }
            Record::Charge { load, item } => {
                let path = path.strip_prefix("charges.line_items.").unwrap_or(path);
                match resolve_on_charge(item, path) {
                    Some(value) => value,
                    None => resolve_on_load(load, path),
                }
            }
        }
    }

    /// Resolve a path that may traverse a nested collection, yielding one
    /// value per element (used by SUM/AVG/MIN/MAX over flattening paths).
    pub fn resolve_many(&self, path: &str) -> Vec<FieldValue> {
        if let Record::Load(load) = self {
            if let Some(rest) = path.strip_prefix("charges.line_items.") {
                return load
                    .charges
                    .iter()
                    .flat_map(|charges| charges.line_items.iter())
                    .map(|item| resolve_on_charge(item, rest).unwrap_or(FieldValue::Absent))
                    .collect();
            }
            if let Some(rest) = path.strip_prefix("stops.") {
                return load
                    .stops
                    .iter()
                    .map(|stop| resolve_on_stop(stop, rest).unwrap_or(FieldValue::Absent))
                    .collect();
            }
        }
        vec![self.resolve(path)]
    }
}

fn resolve_on_load(load: &Load, path: &str) -> FieldValue {
    let (head, rest) = split_path(path);
    match head {
        "load_id" => FieldValue::of_text(&load.load_id),
        "load_type" => FieldValue::of_text(load.load_type.label()),
        "load_status" => FieldValue::of_text(load.load_status.label()),
        "mode" => FieldValue::of_text(load.mode.label()),
        "equipment_type" => FieldValue::of_text(&load.equipment_type),
        "carrier" => resolve_carrier_ref(&load.carrier, rest),
        "contract_type" => FieldValue::of_text(load.contract_type.label()),
        "length_of_haul" => resolve_length_of_haul(&load.length_of_haul, rest),
        "charges" => match (&load.charges, rest) {
            (None, _) => FieldValue::Absent,
            (Some(_), _) => FieldValue::Composite,
        },
        "tender" => match rest {
            "" => FieldValue::Composite,
            sub => resolve_on_tender(&load.tender, sub).unwrap_or(FieldValue::Absent),
        },
        "stops" => FieldValue::Composite,
        "metadata" => match rest {
            "" => FieldValue::Composite,
            "created_at" => FieldValue::Instant(load.metadata.created_at),
            "is_test" => FieldValue::Flag(load.metadata.is_test),
            _ => FieldValue::Absent,
        },
        "tender_response_hours" => load
            .tender
            .response_hours()
            .map(FieldValue::Number)
            .unwrap_or(FieldValue::Absent),
        "first_tender_status" => FieldValue::of_text(load.tender.status.label()),
        "lane_code" => load
            .lane_code()
            .map(FieldValue::Text)
            .unwrap_or(FieldValue::Absent),
        _ => FieldValue::Absent,
    }
}

fn resolve_on_stop(stop: &Stop, path: &str) -> Option<FieldValue> {
    let (head, rest) = split_path(path);
    let value = match head {
        "stop_id" => FieldValue::of_text(&stop.stop_id),
        "sequence" => FieldValue::Number(stop.sequence as f64),
        "stop_type" => FieldValue::of_text(stop.stop_type.label()),
        "loading_type" => FieldValue::of_text(stop.loading_type.label()),
        "location" => resolve_location(&stop.location, rest),
        "appointment" => resolve_appointment(&stop.appointment, rest),
        "actual" => resolve_actual(stop.actual.as_ref(), rest),
        "late_reason" => resolve_late_reason(stop.late_reason.as_ref(), rest),
        "dwell_time_minutes" => stop
            .dwell_minutes()
            .map(FieldValue::Number)
            .unwrap_or(FieldValue::Absent),
        _ => return None,
    };
    Some(value)
}

fn resolve_on_tender(tender: &Tender, path: &str) -> Option<FieldValue> {
    let (head, rest) = split_path(path);
    let value = match head {
        "tendered_at" => FieldValue::Instant(tender.tendered_at),
        "accepted_at" => FieldValue::of_opt_instant(tender.accepted_at),
        "rejected_at" => FieldValue::of_opt_instant(tender.rejected_at),
        "status" => FieldValue::of_text(tender.status.label()),
        "rejection_reason" => tender
            .rejection_reason
            .as_deref()
            .map(FieldValue::of_text)
            .unwrap_or(FieldValue::Absent),
        "response_hours" => tender
            .response_hours()
            .map(FieldValue::Number)
            .unwrap_or(FieldValue::Absent),
        _ => return None,
    };
    // Tender fields are scalars; a dotted tail under one resolves nowhere.
    if rest.is_empty() {
        Some(value)
    } else {
        Some(FieldValue::Absent)
    }
}

fn resolve_on_charge(item: &ChargeLineItem, path: &str) -> Option<FieldValue> {
    let (head, rest) = split_path(path);
    let value = match head {
        "charge_type" => FieldValue::of_text(item.charge_type.label()),
        "amount" => match rest {
            "" => FieldValue::Composite,
            "value" => FieldValue::Number(item.amount.value),
            "currency" => FieldValue::of_text(&item.amount.currency),
            _ => FieldValue::Absent,
        },
        _ => return None,
    };
    Some(value)
}

fn resolve_carrier_ref(carrier: &CarrierRef, rest: &str) -> FieldValue {
    match rest {
        "" => FieldValue::Composite,
        "carrier_id" => FieldValue::of_text(&carrier.carrier_id),
        "scac" => FieldValue::of_text(&carrier.scac),
        "name" => FieldValue::of_text(&carrier.name),
        _ => FieldValue::Absent,
    }
}

fn resolve_length_of_haul(haul: &LengthOfHaul, rest: &str) -> FieldValue {
    match rest {
        "" => FieldValue::Composite,
        "value" => FieldValue::Number(haul.value),
        "unit" => FieldValue::of_text(&haul.unit),
        _ => FieldValue::Absent,
    }
}

fn resolve_location(location: &Location, rest: &str) -> FieldValue {
    match rest {
        "" => FieldValue::Composite,
        "location_id" => FieldValue::of_text(&location.location_id),
        "location_code" => FieldValue::of_text(&location.location_code),
        "name" => FieldValue::of_text(&location.name),
        "city" => FieldValue::of_text(&location.city),
        "state" => FieldValue::of_text(&location.state),
        "postal_code" => location
            .postal_code
            .as_deref()
            .map(FieldValue::of_text)
            .unwrap_or(FieldValue::Absent),
        "country_code" => location
            .country_code
            .as_deref()
            .map(FieldValue::of_text)
            .unwrap_or(FieldValue::Absent),
        "type" => FieldValue::of_text(location.location_type.label()),
        _ => FieldValue::Absent,
    }
}

fn resolve_appointment(appointment: &Appointment, rest: &str) -> FieldValue {
    match rest {
        "" => FieldValue::Composite,
        "type" => match appointment.appointment_type {
            super::domain::AppointmentType::Appointment => FieldValue::of_text("APPOINTMENT"),
            super::domain::AppointmentType::Window => FieldValue::of_text("WINDOW"),
        },
        "scheduled_earliest" => FieldValue::Instant(appointment.scheduled_earliest),
        "scheduled_latest" => FieldValue::Instant(appointment.scheduled_latest),
        "original_earliest" => FieldValue::of_opt_instant(appointment.original_earliest),
        "original_latest" => FieldValue::of_opt_instant(appointment.original_latest),
        _ => FieldValue::Absent,
    }
}

fn resolve_actual(actual: Option<&ActualTimes>, rest: &str) -> FieldValue {
    let Some(actual) = actual else {
        return FieldValue::Absent;
    };
    match rest {
        "" => FieldValue::Composite,
        "arrival" => FieldValue::of_opt_instant(actual.arrival),
        "departure" => FieldValue::of_opt_instant(actual.departure),
        _ => FieldValue::Absent,
    }
}

fn resolve_late_reason(late_reason: Option<&LateReason>, rest: &str) -> FieldValue {
    let Some(reason) = late_reason else {
        return FieldValue::Absent;
    };
    match rest {
        "" => FieldValue::Composite,
        "code" => FieldValue::of_text(&reason.code),
        "description" => FieldValue::of_text(&reason.description),
        "responsible_party" => FieldValue::of_text(reason.responsible_party.label()),
        "reported_at" => FieldValue::of_opt_instant(reason.reported_at),
        _ => FieldValue::Absent,
    }
}

fn split_path(path: &str) -> (&str, &str) {
    match path.split_once('.') {
        Some((head, rest)) => (head, rest),
        None => (path, ""),
    }
}
