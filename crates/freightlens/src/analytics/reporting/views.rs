//! Serialized shapes of the carrier and lane rollups.
//!
//! Undefined metric values surface as `null`, never as `0`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::super::domain::CarrierRef;

#[derive(Debug, Clone, Serialize)]
pub struct TimePeriod {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VolumeSummary {
    pub total_loads: u32,
    pub shipments: u32,
    pub tenders: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSummary {
    pub otp_exact: Option<f64>,
    pub otp_15min: Option<f64>,
    pub otp_60min: Option<f64>,
    pub otd_exact: Option<f64>,
    pub otd_15min: Option<f64>,
    pub avg_dwell_time_pickup: Option<f64>,
    pub avg_dwell_time_delivery: Option<f64>,
}

/// The same on-time figures with fault-attribution exclusions applied.
#[derive(Debug, Clone, Serialize)]
pub struct FaultAdjustedPerformance {
    pub otp_exact: Option<f64>,
    pub otp_15min: Option<f64>,
    pub otp_60min: Option<f64>,
    pub otd_exact: Option<f64>,
    pub otd_15min: Option<f64>,
    pub eligible_pickups: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenderSummary {
    pub acceptance_rate: Option<f64>,
    pub avg_response_time_hours: Option<f64>,
    pub ftar: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostSummary {
    pub avg_cost_per_mile: Option<f64>,
    pub min_cost_per_mile: Option<f64>,
    pub max_cost_per_mile: Option<f64>,
    pub cost_consistency_cv: Option<f64>,
    pub cost_index: Option<f64>,
    pub total_spend: f64,
    pub currency: String,
}

/// One lane's slice of a carrier report.
#[derive(Debug, Clone, Serialize)]
pub struct CarrierLaneRow {
    pub lane_code: String,
    pub load_count: u32,
    pub otp_exact: Option<f64>,
    pub otp_exact_excluding_fault: Option<f64>,
    pub avg_cost_per_mile: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CarrierReport {
    pub carrier: CarrierRef,
    pub time_period: TimePeriod,
    pub volume: VolumeSummary,
    pub performance: PerformanceSummary,
    pub performance_excluding_fault: FaultAdjustedPerformance,
    pub tender: TenderSummary,
    pub cost: CostSummary,
    pub lanes: Vec<CarrierLaneRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LaneReport {
    pub lane_code: String,
    pub origin_code: String,
    pub destination_code: String,
    pub time_period: TimePeriod,
    pub volume: VolumeSummary,
    pub performance: PerformanceSummary,
    pub performance_excluding_fault: FaultAdjustedPerformance,
    pub tender: TenderSummary,
    pub cost: CostSummary,
}
