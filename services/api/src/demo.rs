use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::Args;
use freightlens::analytics::domain::{
    ActualTimes, Appointment, AppointmentType, CarrierRef, ChargeLineItem, ChargeType, Charges,
    ContractType, LateReason, LengthOfHaul, Load, LoadKind, LoadMetadata, LoadStatus, LoadingType,
    Location, LocationType, Money, ResponsibleParty, Stop, StopType, Tender, TenderStatus,
    TransportMode,
};
use freightlens::analytics::{
    suggest, AssistantSuggestion, CatalogService, OverrideAction, SegmentEntity,
    TransactionOverride,
};
use freightlens::error::AppError;

use crate::infra::{build_catalog_service, InMemoryDefinitionRepository};
use freightlens::config::AppConfig;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Evaluation date for override windows (YYYY-MM-DD, defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
    /// Skip the assistant portion of the demo output
    #[arg(long)]
    pub(crate) skip_assistant: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ReportArgs {
    /// Evaluation date for override windows (YYYY-MM-DD, defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
    /// Emit the full report as JSON instead of the text summary
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

fn resolve_as_of(date: Option<NaiveDate>) -> DateTime<Utc> {
    date.and_then(|date| date.and_hms_opt(23, 59, 59))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or_else(Utc::now)
}

fn demo_service() -> Result<Arc<CatalogService<InMemoryDefinitionRepository>>, AppError> {
    let config = AppConfig::load()?;
    let service = build_catalog_service(&config);
    for entry in sample_overrides() {
        service.add_override(entry).map_err(AppError::from)?;
    }
    Ok(service)
}

fn fmt_value(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(value) => format!("{value} {unit}"),
        None => "n/a".to_string(),
    }
}

pub(crate) fn run_carrier_report(args: ReportArgs) -> Result<(), AppError> {
    let service = demo_service()?;
    let loads = sample_loads();
    let as_of = resolve_as_of(args.as_of);

    let reports = service.carrier_reports(&loads, as_of)?;
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).unwrap_or_else(|_| "[]".to_string())
        );
        return Ok(());
    }

    println!("Carrier scorecard ({} carriers, December 2024 sample)", reports.len());
    for report in &reports {
        println!(
            "\n{} ({}) - {} loads",
            report.carrier.name, report.carrier.scac, report.volume.total_loads
        );
        println!(
            "  OTP exact {:>10}   excl. fault {:>10}  ({} eligible pickups)",
            fmt_value(report.performance.otp_exact, "%"),
            fmt_value(report.performance_excluding_fault.otp_exact, "%"),
            report.performance_excluding_fault.eligible_pickups
        );
        println!(
            "  OTD exact {:>10}   tender acceptance {}",
            fmt_value(report.performance.otd_exact, "%"),
            fmt_value(report.tender.acceptance_rate, "%")
        );
        println!(
            "  Avg CPM {:>12}   cost index {}   spend {:.2} {}",
            fmt_value(report.cost.avg_cost_per_mile, "USD/mi"),
            fmt_value(report.cost.cost_index, ""),
            report.cost.total_spend,
            report.cost.currency
        );
        for lane in &report.lanes {
            println!(
                "    lane {}: {} loads, OTP {} (excl. fault {}), CPM {}",
                lane.lane_code,
                lane.load_count,
                fmt_value(lane.otp_exact, "%"),
                fmt_value(lane.otp_exact_excluding_fault, "%"),
                fmt_value(lane.avg_cost_per_mile, "USD/mi")
            );
        }
    }
    Ok(())
}

pub(crate) fn run_lane_report(args: ReportArgs) -> Result<(), AppError> {
    let service = demo_service()?;
    let loads = sample_loads();
    let as_of = resolve_as_of(args.as_of);

    let reports = service.lane_reports(&loads, as_of)?;
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).unwrap_or_else(|_| "[]".to_string())
        );
        return Ok(());
    }

    println!("Lane scorecard ({} lanes, December 2024 sample)", reports.len());
    for report in &reports {
        println!(
            "\n{} ({} loads, {} shipments)",
            report.lane_code, report.volume.total_loads, report.volume.shipments
        );
        println!(
            "  OTP exact {:>10}   excl. fault {}",
            fmt_value(report.performance.otp_exact, "%"),
            fmt_value(report.performance_excluding_fault.otp_exact, "%")
        );
        println!(
            "  Avg CPM {:>12}   range {} .. {}   cv {}",
            fmt_value(report.cost.avg_cost_per_mile, "USD/mi"),
            fmt_value(report.cost.min_cost_per_mile, ""),
            fmt_value(report.cost.max_cost_per_mile, ""),
            fmt_value(report.cost.cost_consistency_cv, "")
        );
        println!(
            "  Tender acceptance {}   avg response {}",
            fmt_value(report.tender.acceptance_rate, "%"),
            fmt_value(report.tender.avg_response_time_hours, "h")
        );
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let service = demo_service()?;
    let loads = sample_loads();
    let as_of = resolve_as_of(args.as_of);

    println!("Freight KPI studio demo");
    println!("=======================");

    let metrics = service.metrics()?;
    let segments = service.segments()?;
    println!(
        "\nCatalog: {} baseline metrics, {} segments ({} auto-apply)",
        metrics.iter().filter(|metric| metric.is_baseline).count(),
        segments.len(),
        segments.iter().filter(|segment| segment.auto_apply).count()
    );

    println!("\nHeadline KPIs over {} sample loads:", loads.len());
    for code in [
        "OTP_EXACT",
        "OTP_15MIN",
        "OTP_60MIN",
        "OTD_EXACT",
        "TENDER_ACCEPTANCE_RATE",
        "TENDER_RESPONSE_TIME",
        "AVG_DWELL_TIME",
        "CPM_ALL_IN",
    ] {
        let definition = metrics
            .iter()
            .find(|metric| metric.metric_code == code);
        let value = service.compute_metric(code, &loads, 1, as_of)?;
        let unit = definition.map(|metric| metric.unit.as_str()).unwrap_or("");
        println!("  {code:<24} {}", fmt_value(value.to_option(), unit));
    }

    println!("\nPer-carrier on-time, raw vs excluding fault attribution:");
    for report in service.carrier_reports(&loads, as_of)? {
        println!(
            "  {:<22} OTP {:>8}  excl. fault {:>8}",
            report.carrier.name,
            fmt_value(report.performance.otp_exact, "%"),
            fmt_value(report.performance_excluding_fault.otp_exact, "%")
        );
    }

    println!("\nDefinition lifecycle:");
    let copy = service.duplicate_metric("OTP_EXACT", "OTP_EXACT_TRIAL")?;
    println!(
        "  duplicated OTP_EXACT into {} (custom: {})",
        copy.metric_code, !copy.is_baseline
    );
    service.delete_metric("OTP_EXACT_TRIAL")?;
    println!("  deleted {} again", copy.metric_code);

    if !args.skip_assistant {
        println!("\nAssistant suggestions:");
        for prompt in [
            "Create a metric for on-time pickup percentage to original appointment",
            "Track cost per mile excluding fuel surcharges",
            "Exclude stops where the shipper caused the delay",
        ] {
            match suggest(prompt) {
                Some(AssistantSuggestion::Metric(draft)) => {
                    println!("  '{prompt}'\n    -> metric {} ({})", draft.metric_code, draft.metric_name);
                }
                Some(AssistantSuggestion::Segment(draft)) => {
                    println!("  '{prompt}'\n    -> segment {} ({})", draft.segment_code, draft.segment_name);
                }
                None => println!("  '{prompt}'\n    -> no template matched"),
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Sample dataset (December 2024)
// ---------------------------------------------------------------------------

fn instant(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 12, day, hour, minute, 0)
        .single()
        .unwrap_or_default()
}

fn location(code: &str, name: &str, city: &str, state: &str) -> Location {
    Location {
        location_id: format!("loc_{}", code.to_lowercase()),
        location_code: code.to_string(),
        name: name.to_string(),
        city: city.to_string(),
        state: state.to_string(),
        postal_code: None,
        country_code: Some("US".to_string()),
        location_type: LocationType::DistributionCenter,
    }
}

fn dallas() -> Location {
    location("DAL", "Dallas DC", "Dallas", "TX")
}

fn atlanta() -> Location {
    location("ATL", "Atlanta DC", "Atlanta", "GA")
}

fn los_angeles() -> Location {
    location("LAX", "Los Angeles FC", "Los Angeles", "CA")
}

fn phoenix() -> Location {
    location("PHX", "Phoenix DC", "Phoenix", "AZ")
}

fn chicago() -> Location {
    location("CHI", "Chicago DC", "Chicago", "IL")
}

fn newark() -> Location {
    location("NWK", "Newark DC", "Newark", "NJ")
}

struct StopSpec {
    stop_id: &'static str,
    sequence: u32,
    stop_type: StopType,
    location: Location,
    scheduled: DateTime<Utc>,
    arrival_offset_minutes: Option<i64>,
    dwell_minutes: i64,
    late_reason: Option<(&'static str, ResponsibleParty)>,
}

fn build_stop(spec: StopSpec) -> Stop {
    let actual = spec.arrival_offset_minutes.map(|offset| {
        let arrival = spec.scheduled + chrono::Duration::minutes(offset);
        ActualTimes {
            arrival: Some(arrival),
            departure: Some(arrival + chrono::Duration::minutes(spec.dwell_minutes)),
        }
    });

    Stop {
        stop_id: spec.stop_id.to_string(),
        sequence: spec.sequence,
        stop_type: spec.stop_type,
        loading_type: LoadingType::Live,
        location: spec.location,
        appointment: Appointment {
            appointment_type: AppointmentType::Appointment,
            scheduled_earliest: spec.scheduled,
            scheduled_latest: spec.scheduled + chrono::Duration::hours(2),
            original_earliest: None,
            original_latest: None,
        },
        actual,
        late_reason: spec.late_reason.map(|(code, responsible_party)| LateReason {
            code: code.to_string(),
            description: format!("{code} reported by driver"),
            responsible_party,
            reported_at: Some(spec.scheduled + chrono::Duration::hours(1)),
        }),
    }
}

struct LoadSpec {
    load_id: &'static str,
    carrier: (&'static str, &'static str, &'static str),
    contract_type: ContractType,
    load_status: LoadStatus,
    miles: f64,
    charges: Vec<(ChargeType, f64)>,
    tender: Tender,
    stops: Vec<Stop>,
    created: DateTime<Utc>,
    is_test: bool,
}

fn build_load(spec: LoadSpec) -> Load {
    let (carrier_id, scac, name) = spec.carrier;
    Load {
        load_id: spec.load_id.to_string(),
        load_type: LoadKind::Shipment,
        load_status: spec.load_status,
        mode: TransportMode::Truckload,
        equipment_type: "53_DRY_VAN".to_string(),
        carrier: CarrierRef {
            carrier_id: carrier_id.to_string(),
            scac: scac.to_string(),
            name: name.to_string(),
        },
        contract_type: spec.contract_type,
        length_of_haul: LengthOfHaul {
            value: spec.miles,
            unit: "MILES".to_string(),
        },
        charges: Some(Charges {
            line_items: spec
                .charges
                .into_iter()
                .map(|(charge_type, value)| ChargeLineItem {
                    charge_type,
                    amount: Money {
                        currency: "USD".to_string(),
                        value,
                    },
                })
                .collect(),
        }),
        tender: spec.tender,
        stops: spec.stops,
        metadata: LoadMetadata {
            created_at: spec.created,
            is_test: spec.is_test,
        },
    }
}

fn accepted(day: u32, response_minutes: i64) -> Tender {
    let tendered_at = instant(day, 6, 0);
    Tender {
        tendered_at,
        accepted_at: Some(tendered_at + chrono::Duration::minutes(response_minutes)),
        rejected_at: None,
        status: TenderStatus::Accepted,
        rejection_reason: None,
    }
}

fn rejected(day: u32, response_minutes: i64, reason: &str) -> Tender {
    let tendered_at = instant(day, 6, 0);
    Tender {
        tendered_at,
        accepted_at: None,
        rejected_at: Some(tendered_at + chrono::Duration::minutes(response_minutes)),
        status: TenderStatus::Rejected,
        rejection_reason: Some(reason.to_string()),
    }
}

/// The static December 2024 sample snapshot driving the demo and report
/// commands: a mix of on-time, fault-attributed-late, rejected, backup, and
/// test loads across three lanes.
pub(crate) fn sample_loads() -> Vec<Load> {
    vec![
        build_load(LoadSpec {
            load_id: "load_001",
            carrier: ("carrier_swift", "SWFT", "Swift Transportation"),
            contract_type: ContractType::ContractPrimary,
            load_status: LoadStatus::Delivered,
            miles: 600.0,
            charges: vec![(ChargeType::LineHaul, 1500.0), (ChargeType::FuelSurcharge, 180.0)],
            tender: accepted(2, 48),
            stops: vec![
                build_stop(StopSpec {
                    stop_id: "stop_001_01",
                    sequence: 1,
                    stop_type: StopType::Pickup,
                    location: dallas(),
                    scheduled: instant(3, 8, 0),
                    arrival_offset_minutes: Some(-10),
                    dwell_minutes: 75,
                    late_reason: None,
                }),
                build_stop(StopSpec {
                    stop_id: "stop_001_02",
                    sequence: 2,
                    stop_type: StopType::Delivery,
                    location: atlanta(),
                    scheduled: instant(4, 14, 0),
                    arrival_offset_minutes: Some(-20),
                    dwell_minutes: 50,
                    late_reason: None,
                }),
            ],
            created: instant(2, 5, 30),
            is_test: false,
        }),
        build_load(LoadSpec {
            load_id: "load_002",
            carrier: ("carrier_swift", "SWFT", "Swift Transportation"),
            contract_type: ContractType::ContractPrimary,
            load_status: LoadStatus::Delivered,
            miles: 600.0,
            charges: vec![
                (ChargeType::LineHaul, 1550.0),
                (ChargeType::FuelSurcharge, 175.0),
                (ChargeType::Detention, 150.0),
            ],
            tender: accepted(9, 72),
            stops: vec![
                build_stop(StopSpec {
                    stop_id: "stop_002_01",
                    sequence: 1,
                    stop_type: StopType::Pickup,
                    location: dallas(),
                    scheduled: instant(10, 9, 0),
                    arrival_offset_minutes: Some(45),
                    dwell_minutes: 140,
                    late_reason: Some(("DOCK_NOT_READY", ResponsibleParty::Shipper)),
                }),
                build_stop(StopSpec {
                    stop_id: "stop_002_02",
                    sequence: 2,
                    stop_type: StopType::Delivery,
                    location: atlanta(),
                    scheduled: instant(11, 15, 0),
                    arrival_offset_minutes: Some(-5),
                    dwell_minutes: 55,
                    late_reason: None,
                }),
            ],
            created: instant(9, 4, 45),
            is_test: false,
        }),
        build_load(LoadSpec {
            load_id: "load_003",
            carrier: ("carrier_jbhunt", "JBHT", "J.B. Hunt Transport"),
            contract_type: ContractType::ContractPrimary,
            load_status: LoadStatus::Delivered,
            miles: 598.0,
            charges: vec![(ChargeType::LineHaul, 1620.0), (ChargeType::FuelSurcharge, 190.0)],
            tender: accepted(12, 30),
            stops: vec![
                build_stop(StopSpec {
                    stop_id: "stop_003_01",
                    sequence: 1,
                    stop_type: StopType::Pickup,
                    location: dallas(),
                    scheduled: instant(13, 7, 30),
                    arrival_offset_minutes: Some(30),
                    dwell_minutes: 90,
                    late_reason: Some(("EQUIPMENT_ISSUE", ResponsibleParty::Carrier)),
                }),
                build_stop(StopSpec {
                    stop_id: "stop_003_02",
                    sequence: 2,
                    stop_type: StopType::Delivery,
                    location: atlanta(),
                    scheduled: instant(14, 13, 0),
                    arrival_offset_minutes: Some(25),
                    dwell_minutes: 65,
                    late_reason: Some(("RECEIVER_BACKLOG", ResponsibleParty::Customer)),
                }),
            ],
            created: instant(12, 6, 10),
            is_test: false,
        }),
        build_load(LoadSpec {
            load_id: "load_004",
            carrier: ("carrier_schneider", "SNDR", "Schneider National"),
            contract_type: ContractType::ContractPrimary,
            load_status: LoadStatus::Delivered,
            miles: 372.0,
            charges: vec![(ChargeType::LineHaul, 980.0), (ChargeType::FuelSurcharge, 120.0)],
            tender: accepted(16, 95),
            stops: vec![
                build_stop(StopSpec {
                    stop_id: "stop_004_01",
                    sequence: 1,
                    stop_type: StopType::Pickup,
                    location: los_angeles(),
                    scheduled: instant(17, 6, 0),
                    arrival_offset_minutes: Some(0),
                    dwell_minutes: 80,
                    late_reason: None,
                }),
                build_stop(StopSpec {
                    stop_id: "stop_004_02",
                    sequence: 2,
                    stop_type: StopType::Delivery,
                    location: phoenix(),
                    scheduled: instant(17, 16, 0),
                    arrival_offset_minutes: Some(-15),
                    dwell_minutes: 45,
                    late_reason: None,
                }),
            ],
            created: instant(16, 5, 0),
            is_test: false,
        }),
        build_load(LoadSpec {
            load_id: "load_005",
            carrier: ("carrier_werner", "WERN", "Werner Enterprises"),
            contract_type: ContractType::ContractPrimary,
            load_status: LoadStatus::Rejected,
            miles: 372.0,
            charges: vec![],
            tender: rejected(18, 132, "no capacity in the region"),
            stops: vec![
                build_stop(StopSpec {
                    stop_id: "stop_005_01",
                    sequence: 1,
                    stop_type: StopType::Pickup,
                    location: los_angeles(),
                    scheduled: instant(19, 8, 0),
                    arrival_offset_minutes: None,
                    dwell_minutes: 0,
                    late_reason: None,
                }),
                build_stop(StopSpec {
                    stop_id: "stop_005_02",
                    sequence: 2,
                    stop_type: StopType::Delivery,
                    location: phoenix(),
                    scheduled: instant(19, 18, 0),
                    arrival_offset_minutes: None,
                    dwell_minutes: 0,
                    late_reason: None,
                }),
            ],
            created: instant(18, 7, 20),
            is_test: false,
        }),
        build_load(LoadSpec {
            load_id: "load_006",
            carrier: ("carrier_knight", "KNX", "Knight Transportation"),
            contract_type: ContractType::ContractBackup,
            load_status: LoadStatus::Delivered,
            miles: 790.0,
            charges: vec![
                (ChargeType::LineHaul, 2100.0),
                (ChargeType::FuelSurcharge, 260.0),
                (ChargeType::Accessorial, 150.0),
            ],
            tender: accepted(20, 180),
            stops: vec![
                build_stop(StopSpec {
                    stop_id: "stop_006_01",
                    sequence: 1,
                    stop_type: StopType::Pickup,
                    location: chicago(),
                    scheduled: instant(21, 7, 0),
                    arrival_offset_minutes: Some(70),
                    dwell_minutes: 95,
                    late_reason: Some(("WEATHER_DELAY", ResponsibleParty::ForceMajeure)),
                }),
                build_stop(StopSpec {
                    stop_id: "stop_006_02",
                    sequence: 2,
                    stop_type: StopType::Delivery,
                    location: newark(),
                    scheduled: instant(22, 15, 30),
                    arrival_offset_minutes: Some(20),
                    dwell_minutes: 70,
                    late_reason: Some(("RECEIVER_BACKLOG", ResponsibleParty::Customer)),
                }),
            ],
            created: instant(20, 6, 40),
            is_test: false,
        }),
        build_load(LoadSpec {
            load_id: "load_008",
            carrier: ("carrier_swift", "SWFT", "Swift Transportation"),
            contract_type: ContractType::ContractPrimary,
            load_status: LoadStatus::Delivered,
            miles: 600.0,
            charges: vec![(ChargeType::LineHaul, 1480.0), (ChargeType::FuelSurcharge, 170.0)],
            tender: accepted(21, 25),
            stops: vec![
                build_stop(StopSpec {
                    stop_id: "stop_008_01",
                    sequence: 1,
                    stop_type: StopType::Pickup,
                    location: dallas(),
                    scheduled: instant(22, 8, 0),
                    arrival_offset_minutes: Some(5),
                    dwell_minutes: 60,
                    late_reason: None,
                }),
                build_stop(StopSpec {
                    stop_id: "stop_008_02",
                    sequence: 2,
                    stop_type: StopType::Delivery,
                    location: atlanta(),
                    scheduled: instant(23, 14, 0),
                    arrival_offset_minutes: Some(0),
                    dwell_minutes: 40,
                    late_reason: None,
                }),
            ],
            created: instant(21, 16, 0),
            is_test: true,
        }),
    ]
}

/// The seeded manual exceptions: a disputed shipper-fault stop and a TMS
/// integration test load.
pub(crate) fn sample_overrides() -> Vec<TransactionOverride> {
    vec![
        TransactionOverride {
            override_id: "override_001".to_string(),
            entity_id: "stop_002_01".to_string(),
            entity_type: SegmentEntity::Stop,
            segment_id: "seg_no_shipper_fault".to_string(),
            override_action: OverrideAction::Exclude,
            reason: "Although marked as shipper fault, carrier could have communicated better about the delay".to_string(),
            applied_by: "user_kyle_001".to_string(),
            applied_at: instant(14, 10, 30),
            effective_from: instant(13, 0, 0),
            effective_to: None,
        },
        TransactionOverride {
            override_id: "override_002".to_string(),
            entity_id: "load_008".to_string(),
            entity_type: SegmentEntity::Load,
            segment_id: "seg_no_test_loads".to_string(),
            override_action: OverrideAction::Exclude,
            reason: "This was a test load for new TMS integration".to_string(),
            applied_by: "user_kyle_001".to_string(),
            applied_at: instant(21, 15, 0),
            effective_from: instant(21, 0, 0),
            effective_to: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_snapshot_covers_the_demo_scenarios() {
        let loads = sample_loads();
        assert_eq!(loads.len(), 7);
        assert!(loads.iter().any(|load| load.metadata.is_test));
        assert!(loads
            .iter()
            .any(|load| load.tender.status == TenderStatus::Rejected));
        assert!(loads
            .iter()
            .any(|load| load.contract_type == ContractType::ContractBackup));
        assert!(loads
            .iter()
            .all(|load| load.lane_code().is_some()));
    }

    #[test]
    fn sample_overrides_point_at_seeded_segments() {
        let overrides = sample_overrides();
        assert_eq!(overrides.len(), 2);
        assert!(overrides
            .iter()
            .all(|entry| entry.segment_id.starts_with("seg_")));
    }
}
