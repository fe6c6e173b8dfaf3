//! Integration specifications for the metric catalog and evaluation workflow.
//!
//! Scenarios exercise the public service facade and HTTP router end to end:
//! catalog lifecycle, segment-aware evaluation, and the routing layer, without
//! reaching into private modules.

mod common {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use chrono::{DateTime, TimeZone, Utc};

    use freightlens::analytics::domain::{
        ActualTimes, Appointment, AppointmentType, CarrierRef, ChargeLineItem, ChargeType,
        Charges, ContractType, LateReason, LengthOfHaul, Load, LoadKind, LoadMetadata,
        LoadStatus, LoadingType, Location, LocationType, Money, ResponsibleParty, Stop, StopType,
        Tender, TenderStatus, TransportMode,
    };
    use freightlens::analytics::{
        catalog_router, CatalogService, CustomDefinitions, DefinitionRepository, RepositoryError,
    };

    pub(super) fn base_day(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 10, hour, minute, 0)
            .single()
            .expect("valid fixture timestamp")
    }

    pub(super) fn as_of() -> DateTime<Utc> {
        base_day(23, 0)
    }

    fn location(code: &str) -> Location {
        Location {
            location_id: format!("loc_{code}"),
            location_code: code.to_string(),
            name: format!("{code} DC"),
            city: code.to_string(),
            state: "TX".to_string(),
            postal_code: None,
            country_code: Some("US".to_string()),
            location_type: LocationType::DistributionCenter,
        }
    }

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
                departure: Some(arrival + chrono::Duration::minutes(45)),
            }
        });

        Stop {
            stop_id: stop_id.to_string(),
            sequence,
            stop_type,
            loading_type: LoadingType::Live,
            location: location(if stop_type == StopType::Pickup { "DAL" } else { "ATL" }),
            appointment: Appointment {
                appointment_type: AppointmentType::Appointment,
                scheduled_earliest: scheduled,
                scheduled_latest: scheduled + chrono::Duration::hours(2),
                original_earliest: None,
                original_latest: None,
            },
            actual,
            late_reason: late_party.map(|responsible_party| LateReason {
                code: "DELAY".to_string(),
                description: "Reported delay".to_string(),
                responsible_party,
                reported_at: None,
            }),
        }
    }

    pub(super) fn sample_load(load_id: &str, stops: Vec<Stop>) -> Load {
        let tendered_at = base_day(6, 0);
        Load {
            load_id: load_id.to_string(),
            load_type: LoadKind::Shipment,
            load_status: LoadStatus::Delivered,
            mode: TransportMode::Truckload,
            equipment_type: "53_DRY_VAN".to_string(),
            carrier: CarrierRef {
                carrier_id: "carrier_swift".to_string(),
                scac: "SWFT".to_string(),
                name: "Swift Transportation".to_string(),
            },
            contract_type: ContractType::ContractPrimary,
            length_of_haul: LengthOfHaul {
                value: 600.0,
                unit: "MILES".to_string(),
            },
            charges: Some(Charges {
                line_items: vec![
                    ChargeLineItem {
                        charge_type: ChargeType::LineHaul,
                        amount: Money {
                            currency: "USD".to_string(),
                            value: 1500.0,
                        },
                    },
                    ChargeLineItem {
                        charge_type: ChargeType::FuelSurcharge,
                        amount: Money {
                            currency: "USD".to_string(),
                            value: 180.0,
                        },
                    },
                ],
            }),
            tender: Tender {
                tendered_at,
                accepted_at: Some(tendered_at + chrono::Duration::hours(1)),
                rejected_at: None,
                status: TenderStatus::Accepted,
                rejection_reason: None,
            },
            stops,
            metadata: LoadMetadata {
                created_at: base_day(0, 0),
                is_test: false,
            },
        }
    }

    /// Two pickups (one on time, one 40 minutes late) plus an unmeasured
    /// delivery.
    pub(super) fn scenario_loads() -> Vec<Load> {
        vec![sample_load(
            "load_001",
            vec![
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
            ],
        )]
    }

    #[derive(Default, Clone)]
    pub(super) struct MemoryRepository {
        definitions: Arc<Mutex<CustomDefinitions>>,
    }

    impl DefinitionRepository for MemoryRepository {
        fn load(&self) -> Result<CustomDefinitions, RepositoryError> {
            Ok(self.definitions.lock().expect("lock").clone())
        }

        fn save(&self, definitions: &CustomDefinitions) -> Result<(), RepositoryError> {
            *self.definitions.lock().expect("lock") = definitions.clone();
            Ok(())
        }
    }

    pub(super) fn build_service() -> Arc<CatalogService<MemoryRepository>> {
        Arc::new(CatalogService::new(
            Arc::new(MemoryRepository::default()),
            Duration::from_secs(300),
        ))
    }

    pub(super) fn build_router() -> axum::Router {
        catalog_router(build_service())
    }
}

mod evaluation {
    use super::common::*;
    use freightlens::analytics::MetricValue;

    #[test]
    fn on_time_pickup_is_half_with_exact_windows() {
        let service = build_service();
        let loads = scenario_loads();

        let value = service
            .compute_metric("OTP_EXACT", &loads, 1, as_of())
            .expect("computes");
        assert_eq!(value, MetricValue::Defined(50.0));
    }

    #[test]
    fn grace_periods_recover_slightly_late_pickups() {
        let service = build_service();
        let mut loads = scenario_loads();
        let scheduled = loads[0].stops[1].appointment.scheduled_earliest;
        if let Some(actual) = loads[0].stops[1].actual.as_mut() {
            actual.arrival = Some(scheduled + chrono::Duration::minutes(10));
        }

        let exact = service
            .compute_metric("OTP_EXACT", &loads, 1, as_of())
            .expect("computes");
        let grace = service
            .compute_metric("OTP_15MIN", &loads, 1, as_of())
            .expect("computes");

        assert_eq!(exact, MetricValue::Defined(50.0));
        assert_eq!(grace, MetricValue::Defined(100.0));
    }

    #[test]
    fn zero_mile_load_yields_undefined_cost_per_mile() {
        let service = build_service();
        let mut loads = scenario_loads();
        loads[0].length_of_haul.value = 0.0;

        let value = service
            .compute_metric("CPM_ALL_IN", &loads, 1, as_of())
            .expect("computes");
        assert_eq!(value, MetricValue::Undefined);
    }

    #[test]
    fn carrier_reports_carry_raw_and_fault_adjusted_figures() {
        let service = build_service();
        let mut loads = scenario_loads();
        // Re-attribute the late pickup to the shipper.
        loads[0].stops[1].late_reason = Some(freightlens::analytics::domain::LateReason {
            code: "DELAY".to_string(),
            description: "dock not ready".to_string(),
            responsible_party: freightlens::analytics::domain::ResponsibleParty::Shipper,
            reported_at: None,
        });

        let reports = service.carrier_reports(&loads, as_of()).expect("reports");
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].performance.otp_exact, Some(50.0));
        assert_eq!(reports[0].performance_excluding_fault.otp_exact, Some(100.0));
    }
}

mod catalog {
    use super::common::*;
    use freightlens::analytics::{CatalogError, MetricDefinition};

    fn pickup_count_metric() -> MetricDefinition {
        serde_json::from_value(serde_json::json!({
            "metric_id": "metric_pickup_count",
            "metric_code": "PICKUP_COUNT",
            "metric_name": "Pickup Count",
            "description": "Number of pickup stops",
            "formula": {
                "type": "count",
                "filter": { "field": "stop_type", "operator": "=", "value": "PICKUP" }
            },
            "return_type": "INTEGER",
            "unit": "STOPS",
            "precision": 0,
            "is_baseline": false,
            "category": "SERVICE"
        }))
        .expect("definition parses")
    }

    #[test]
    fn custom_definitions_join_the_baseline_catalog() {
        let service = build_service();
        service
            .create_metric(pickup_count_metric())
            .expect("creation succeeds");

        let metrics = service.metrics().expect("metrics list");
        assert_eq!(metrics.len(), 13);

        let value = service
            .compute_metric("PICKUP_COUNT", &scenario_loads(), 1, as_of())
            .expect("computes");
        assert_eq!(value.to_option(), Some(2.0));
    }

    #[test]
    fn baseline_stays_immutable_through_the_facade() {
        let service = build_service();
        assert!(matches!(
            service.delete_metric("OTP_EXACT"),
            Err(CatalogError::BaselineImmutable { .. })
        ));
    }
}

mod routing {
    use super::common::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn read_json(response: axum::response::Response) -> Value {
        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        serde_json::from_slice(&body).expect("json payload")
    }

    #[tokio::test]
    async fn get_metrics_lists_the_baseline_catalog() {
        let router = build_router();
        let response = router
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/v1/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await;
        let metrics = payload.as_array().expect("array of metrics");
        assert_eq!(metrics.len(), 12);
        assert!(metrics
            .iter()
            .all(|metric| metric.get("is_baseline") == Some(&json!(true))));
    }

    #[tokio::test]
    async fn metric_value_endpoint_reports_value_and_unit() {
        let router = build_router();
        let request_body = json!({
            "loads": serde_json::to_value(scenario_loads()).expect("loads serialize"),
            "record_set_version": 1,
            "as_of": as_of()
        });

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/metrics/OTP_EXACT/value")
                    .header("content-type", "application/json")
                    .body(Body::from(request_body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await;
        assert_eq!(payload.get("metric_code"), Some(&json!("OTP_EXACT")));
        assert_eq!(payload.get("value"), Some(&json!(50.0)));
        assert_eq!(payload.get("unit"), Some(&json!("%")));
    }

    #[tokio::test]
    async fn undefined_metric_value_serializes_as_null() {
        let router = build_router();
        let request_body = json!({
            "loads": [],
            "record_set_version": 1
        });

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/metrics/OTP_EXACT/value")
                    .header("content-type", "application/json")
                    .body(Body::from(request_body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await;
        assert_eq!(payload.get("value"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn editing_a_baseline_is_a_conflict() {
        let router = build_router();
        let tampered = json!({
            "metric_id": "metric_otp_exact",
            "metric_code": "OTP_EXACT",
            "metric_name": "Tampered",
            "description": "",
            "formula": { "type": "count" },
            "return_type": "PERCENTAGE",
            "unit": "%",
            "precision": 1,
            "is_baseline": true,
            "category": "PERFORMANCE"
        });

        let response = router
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/v1/metrics/OTP_EXACT")
                    .header("content-type", "application/json")
                    .body(Body::from(tampered.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn malformed_definitions_are_unprocessable() {
        let router = build_router();
        let broken = json!({
            "metric_id": "metric_broken",
            "metric_code": "BROKEN",
            "metric_name": "Broken",
            "description": "",
            "formula": {
                "type": "count",
                "filter": { "field": "", "operator": "=", "value": "PICKUP" }
            },
            "return_type": "INTEGER",
            "unit": "STOPS",
            "precision": 0,
            "is_baseline": false,
            "category": "SERVICE"
        });

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/metrics")
                    .header("content-type", "application/json")
                    .body(Body::from(broken.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let payload = read_json(response).await;
        assert!(payload
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .contains("field"));
    }

    #[tokio::test]
    async fn assistant_endpoint_prefills_a_metric() {
        let router = build_router();
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/assistant/suggestions")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({ "prompt": "track tender acceptance rate" }).to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await;
        let suggestion = payload.get("suggestion").expect("suggestion key");
        assert_eq!(suggestion.get("metric_code"), Some(&json!("TAR")));
    }

    #[tokio::test]
    async fn carrier_reports_endpoint_rolls_up_the_posted_snapshot() {
        let router = build_router();
        let request_body = json!({
            "loads": serde_json::to_value(scenario_loads()).expect("loads serialize"),
            "as_of": as_of()
        });

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/reports/carriers")
                    .header("content-type", "application/json")
                    .body(Body::from(request_body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await;
        let reports = payload.as_array().expect("array of reports");
        assert_eq!(reports.len(), 1);
        assert_eq!(
            reports[0].pointer("/performance/otp_exact"),
            Some(&json!(50.0))
        );
    }
}
