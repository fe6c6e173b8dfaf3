use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::analytics::domain::{
    ActualTimes, Appointment, AppointmentType, CarrierRef, ChargeLineItem, ChargeType, Charges,
    ContractType, LateReason, LengthOfHaul, Load, LoadKind, LoadMetadata, LoadStatus, LoadingType,
    Location, LocationType, Money, ResponsibleParty, Stop, StopType, Tender, TenderStatus,
    TransportMode,
};
use crate::analytics::repository::{CustomDefinitions, DefinitionRepository, RepositoryError};
use crate::analytics::service::CatalogService;

/// Fixed reference instant all fixtures hang off.
pub(super) fn base_day(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 12, 10, hour, minute, 0)
        .single()
        .expect("valid fixture timestamp")
}

pub(super) fn as_of() -> DateTime<Utc> {
    base_day(23, 0)
}

pub(super) fn location(code: &str) -> Location {
    Location {
        location_id: format!("loc_{code}"),
        location_code: code.to_string(),
        name: format!("{code} Warehouse"),
        city: code.to_string(),
        state: "TX".to_string(),
        postal_code: None,
        country_code: Some("US".to_string()),
        location_type: LocationType::Warehouse,
    }
}

fn appointment(scheduled: DateTime<Utc>) -> Appointment {
    Appointment {
        appointment_type: AppointmentType::Appointment,
        scheduled_earliest: scheduled,
        scheduled_latest: scheduled + chrono::Duration::hours(2),
        original_earliest: None,
        original_latest: None,
    }
}

/// A stop whose arrival, when present, is offset from the scheduled time by
/// the given number of minutes (negative = early). Departure follows an hour
/// after arrival so dwell time resolves.
pub(super) fn stop(
    stop_id: &str,
    sequence: u32,
    stop_type: StopType,
    scheduled: DateTime<Utc>,
    arrival_offset_minutes: Option<i64>,
    late_party: Option<ResponsibleParty>,
) -> Stop {
    let actual = arrival_offset_minutes.map(|offset| {
        let arrival = scheduled + chrono::Duration::minutes(offset);
        ActualTimes {
            arrival: Some(arrival),
            departure: Some(arrival + chrono::Duration::minutes(60)),
        }
    });

    Stop {
        stop_id: stop_id.to_string(),
        sequence,
        stop_type,
        loading_type: LoadingType::Live,
        location: location(if stop_type == StopType::Pickup { "DAL" } else { "ATL" }),
        appointment: appointment(scheduled),
        actual,
        late_reason: late_party.map(|responsible_party| LateReason {
            code: "DELAY".to_string(),
            description: "Reported delay".to_string(),
            responsible_party,
            reported_at: Some(scheduled + chrono::Duration::hours(1)),
        }),
    }
}

pub(super) fn accepted_tender(response_hours: f64) -> Tender {
    let tendered_at = base_day(6, 0);
    Tender {
        tendered_at,
        accepted_at: Some(tendered_at + chrono::Duration::minutes((response_hours * 60.0) as i64)),
        rejected_at: None,
        status: TenderStatus::Accepted,
        rejection_reason: None,
    }
}

pub(super) fn rejected_tender(response_hours: f64) -> Tender {
    let tendered_at = base_day(6, 0);
    Tender {
        tendered_at,
        accepted_at: None,
        rejected_at: Some(tendered_at + chrono::Duration::minutes((response_hours * 60.0) as i64)),
        status: TenderStatus::Rejected,
        rejection_reason: Some("capacity".to_string()),
    }
}

pub(super) fn pending_tender() -> Tender {
    Tender {
        tendered_at: base_day(6, 0),
        accepted_at: None,
        rejected_at: None,
        status: TenderStatus::Pending,
        rejection_reason: None,
    }
}

pub(super) fn load(
    load_id: &str,
    carrier_id: &str,
    miles: f64,
    charges: &[(ChargeType, f64)],
    tender: Tender,
    stops: Vec<Stop>,
) -> Load {
    Load {
        load_id: load_id.to_string(),
        load_type: LoadKind::Shipment,
        load_status: LoadStatus::Delivered,
        mode: TransportMode::Truckload,
        equipment_type: "53_DRY_VAN".to_string(),
        carrier: CarrierRef {
            carrier_id: carrier_id.to_string(),
            scac: carrier_id.to_uppercase(),
            name: format!("{carrier_id} Trucking"),
        },
        contract_type: ContractType::ContractPrimary,
        length_of_haul: LengthOfHaul {
            value: miles,
            unit: "MILES".to_string(),
        },
        charges: Some(Charges {
            line_items: charges
                .iter()
                .map(|(charge_type, value)| ChargeLineItem {
                    charge_type: *charge_type,
                    amount: Money {
                        currency: "USD".to_string(),
                        value: *value,
                    },
                })
                .collect(),
        }),
        tender,
        stops,
        metadata: LoadMetadata {
            created_at: base_day(0, 0),
            is_test: false,
        },
    }
}

/// The on-time pickup scenario: two pickups (one on time, one 40 minutes
/// late) and a delivery with no actual arrival yet.
pub(super) fn otp_scenario_loads() -> Vec<Load> {
    let stops = vec![
        stop("stop_01", 1, StopType::Pickup, base_day(8, 0), Some(-5), None),
        stop(
            "stop_02",
            2,
            StopType::Pickup,
            base_day(10, 0),
            Some(40),
            Some(ResponsibleParty::Carrier),
        ),
        stop("stop_03", 3, StopType::Delivery, base_day(16, 0), None, None),
    ];
    vec![load(
        "load_001",
        "swft",
        600.0,
        &[(ChargeType::LineHaul, 1500.0), (ChargeType::FuelSurcharge, 180.0)],
        accepted_tender(1.5),
        stops,
    )]
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    definitions: Arc<Mutex<CustomDefinitions>>,
}

impl DefinitionRepository for MemoryRepository {
    fn load(&self) -> Result<CustomDefinitions, RepositoryError> {
        Ok(self
            .definitions
            .lock()
            .expect("repository mutex poisoned")
            .clone())
    }

    fn save(&self, definitions: &CustomDefinitions) -> Result<(), RepositoryError> {
        *self.definitions.lock().expect("repository mutex poisoned") = definitions.clone();
        Ok(())
    }
}

pub(super) fn build_service() -> (CatalogService<MemoryRepository>, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::default());
    let service = CatalogService::new(repository.clone(), Duration::from_secs(300));
    (service, repository)
}
