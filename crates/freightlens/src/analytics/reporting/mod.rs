//! Carrier and lane rollups built on the formula evaluator.
//!
//! Every reported figure runs through [`evaluate_formula`] with a segment
//! set selected for the metric; the fault-adjusted figures re-run the same
//! formulas with the fault-attribution exclusion segments added, never a
//! second hardcoded computation.

pub mod views;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::definitions::{MetricDefinition, Segment, SegmentType, TransactionOverride};
use super::domain::{Load, LoadKind, StopType};
use super::expression::{collect_paths, eq_text};
use super::field::{EntityKind, Record};
use super::formula::{evaluate_formula, EvaluationScope, Formula, MetricValue};
use super::segments::apply_segments;

pub use views::{
    CarrierLaneRow, CarrierReport, CostSummary, FaultAdjustedPerformance, LaneReport,
    PerformanceSummary, TenderSummary, TimePeriod, VolumeSummary,
};

/// An EXCLUSION segment whose rule keys off fault attribution.
pub fn is_fault_exclusion(segment: &Segment) -> bool {
    if segment.segment_type != SegmentType::Exclusion {
        return false;
    }
    let mut paths = Vec::new();
    collect_paths(&segment.rules, &mut paths);
    paths
        .iter()
        .any(|path| path.starts_with("late_reason.responsible_party"))
}

/// Computes carrier and lane rollups over a load snapshot.
pub struct ReportingEngine<'a> {
    metrics: &'a [MetricDefinition],
    segments: &'a [Segment],
    overrides: &'a [TransactionOverride],
}

impl<'a> ReportingEngine<'a> {
    pub fn new(
        metrics: &'a [MetricDefinition],
        segments: &'a [Segment],
        overrides: &'a [TransactionOverride],
    ) -> Self {
        Self {
            metrics,
            segments,
            overrides,
        }
    }

    pub fn carrier_reports(&self, loads: &[Load], as_of: DateTime<Utc>) -> Vec<CarrierReport> {
        let network_cpm = self.metric_value("CPM_ALL_IN", loads, false, BTreeMap::new(), as_of);

        let mut reports = Vec::new();
        for (_, group) in group_by(loads, |load| load.carrier.carrier_id.clone()) {
            let carrier = group[0].carrier.clone();
            let carrier_cpm =
                self.metric_value("CPM_ALL_IN", &group, false, BTreeMap::new(), as_of);

            let mut lanes = Vec::new();
            for (lane_code, lane_loads) in
                group_by(&group, |load| load.lane_code().unwrap_or_default())
            {
                if lane_code.is_empty() {
                    continue;
                }
                lanes.push(CarrierLaneRow {
                    lane_code,
                    load_count: lane_loads.len() as u32,
                    otp_exact: self
                        .metric_value("OTP_EXACT", &lane_loads, false, BTreeMap::new(), as_of)
                        .to_option(),
                    otp_exact_excluding_fault: self
                        .metric_value("OTP_EXACT", &lane_loads, true, BTreeMap::new(), as_of)
                        .to_option(),
                    avg_cost_per_mile: self
                        .metric_value("CPM_ALL_IN", &lane_loads, false, BTreeMap::new(), as_of)
                        .to_option(),
                });
            }

            let cost_index = self.cost_index(&group, carrier_cpm, network_cpm, as_of);

            reports.push(CarrierReport {
                carrier,
                time_period: time_period(&group),
                volume: volume_summary(&group),
                performance: self.performance_summary(&group, as_of),
                performance_excluding_fault: self.fault_adjusted_performance(&group, as_of),
                tender: self.tender_summary(&group, as_of),
                cost: self.cost_summary(&group, carrier_cpm, cost_index, as_of),
                lanes,
            });
        }
        reports
    }

    pub fn lane_reports(&self, loads: &[Load], as_of: DateTime<Utc>) -> Vec<LaneReport> {
        let network_cpm = self.metric_value("CPM_ALL_IN", loads, false, BTreeMap::new(), as_of);

        let mut reports = Vec::new();
        for (lane_code, group) in group_by(loads, |load| load.lane_code().unwrap_or_default()) {
            if lane_code.is_empty() {
                continue;
            }
            let (origin_code, destination_code) = match lane_code.split_once('-') {
                Some((origin, destination)) => (origin.to_string(), destination.to_string()),
                None => (lane_code.clone(), String::new()),
            };

            let lane_cpm = self.metric_value("CPM_ALL_IN", &group, false, BTreeMap::new(), as_of);
            let cost_index = self.cost_index(&group, lane_cpm, network_cpm, as_of);

            reports.push(LaneReport {
                lane_code,
                origin_code,
                destination_code,
                time_period: time_period(&group),
                volume: volume_summary(&group),
                performance: self.performance_summary(&group, as_of),
                performance_excluding_fault: self.fault_adjusted_performance(&group, as_of),
                tender: self.tender_summary(&group, as_of),
                cost: self.cost_summary(&group, lane_cpm, cost_index, as_of),
            });
        }
        reports
    }

    /// Evaluate one cataloged metric over a load subset, with the auto-apply
    /// segments relevant to it; `include_fault` adds the fault-attribution
    /// exclusions for the "excluding fault" pass.
    pub fn metric_value(
        &self,
        metric_code: &str,
        loads: &[Load],
        include_fault: bool,
        context: BTreeMap<String, f64>,
        as_of: DateTime<Utc>,
    ) -> MetricValue {
        let Some(definition) = self
            .metrics
            .iter()
            .find(|metric| metric.metric_code == metric_code)
        else {
            warn!(metric_code, "report references unknown metric; skipping");
            return MetricValue::Undefined;
        };

        let segments = self.segments_for(metric_code, include_fault);
        let scope = EvaluationScope::new(loads)
            .with_segments(segments, self.overrides, as_of)
            .with_context(context);
        evaluate_formula(&definition.formula, &scope).round_to(definition.precision)
    }

    fn segments_for(&self, metric_code: &str, include_fault: bool) -> Vec<&'a Segment> {
        self.segments
            .iter()
            .filter(|segment| {
                segment.is_active
                    && segment.auto_apply
                    && segment.affects_metric(metric_code)
                    && (include_fault || !is_fault_exclusion(segment))
            })
            .collect()
    }

    fn performance_summary(&self, loads: &[Load], as_of: DateTime<Utc>) -> PerformanceSummary {
        PerformanceSummary {
            otp_exact: self
                .metric_value("OTP_EXACT", loads, false, BTreeMap::new(), as_of)
                .to_option(),
            otp_15min: self
                .metric_value("OTP_15MIN", loads, false, BTreeMap::new(), as_of)
                .to_option(),
            otp_60min: self
                .metric_value("OTP_60MIN", loads, false, BTreeMap::new(), as_of)
                .to_option(),
            otd_exact: self
                .metric_value("OTD_EXACT", loads, false, BTreeMap::new(), as_of)
                .to_option(),
            otd_15min: self
                .metric_value("OTD_15MIN", loads, false, BTreeMap::new(), as_of)
                .to_option(),
            avg_dwell_time_pickup: self.dwell_average(loads, StopType::Pickup, as_of),
            avg_dwell_time_delivery: self.dwell_average(loads, StopType::Delivery, as_of),
        }
    }

    fn fault_adjusted_performance(
        &self,
        loads: &[Load],
        as_of: DateTime<Utc>,
    ) -> FaultAdjustedPerformance {
        FaultAdjustedPerformance {
            otp_exact: self
                .metric_value("OTP_EXACT", loads, true, BTreeMap::new(), as_of)
                .to_option(),
            otp_15min: self
                .metric_value("OTP_15MIN", loads, true, BTreeMap::new(), as_of)
                .to_option(),
            otp_60min: self
                .metric_value("OTP_60MIN", loads, true, BTreeMap::new(), as_of)
                .to_option(),
            otd_exact: self
                .metric_value("OTD_EXACT", loads, true, BTreeMap::new(), as_of)
                .to_option(),
            otd_15min: self
                .metric_value("OTD_15MIN", loads, true, BTreeMap::new(), as_of)
                .to_option(),
            eligible_pickups: self.eligible_pickups(loads, as_of),
        }
    }

    fn tender_summary(&self, loads: &[Load], as_of: DateTime<Utc>) -> TenderSummary {
        TenderSummary {
            acceptance_rate: self
                .metric_value("TENDER_ACCEPTANCE_RATE", loads, false, BTreeMap::new(), as_of)
                .to_option(),
            avg_response_time_hours: self
                .metric_value("TENDER_RESPONSE_TIME", loads, false, BTreeMap::new(), as_of)
                .to_option(),
            ftar: self
                .metric_value("FTAR", loads, false, BTreeMap::new(), as_of)
                .to_option(),
        }
    }

    fn cost_summary(
        &self,
        loads: &[Load],
        avg_cpm: MetricValue,
        cost_index: MetricValue,
        as_of: DateTime<Utc>,
    ) -> CostSummary {
        let surviving = self.surviving_loads("CPM_ALL_IN", loads, as_of);
        let per_load_cpm: Vec<f64> = surviving
            .iter()
            .filter_map(|load| load.cost_per_mile())
            .collect();

        let total_spend = surviving.iter().map(|load| load.total_charges()).sum();
        let currency = surviving
            .iter()
            .find_map(|load| {
                load.charges
                    .as_ref()
                    .and_then(|charges| charges.line_items.first())
                    .map(|item| item.amount.currency.clone())
            })
            .unwrap_or_else(|| "USD".to_string());

        CostSummary {
            avg_cost_per_mile: avg_cpm.to_option(),
            min_cost_per_mile: per_load_cpm.iter().copied().reduce(f64::min),
            max_cost_per_mile: per_load_cpm.iter().copied().reduce(f64::max),
            cost_consistency_cv: coefficient_of_variation(&per_load_cpm),
            cost_index: cost_index.to_option(),
            total_spend,
            currency,
        }
    }

    /// COST_INDEX through the evaluator, with the comparison CPMs injected
    /// as scope context.
    fn cost_index(
        &self,
        loads: &[Load],
        own_cpm: MetricValue,
        reference_cpm: MetricValue,
        as_of: DateTime<Utc>,
    ) -> MetricValue {
        let (Some(own), Some(reference)) = (own_cpm.to_option(), reference_cpm.to_option()) else {
            return MetricValue::Undefined;
        };
        let mut context = BTreeMap::new();
        context.insert("carrier_avg_cpm".to_string(), own);
        context.insert("lane_avg_cpm".to_string(), reference);
        self.metric_value("COST_INDEX", loads, false, context, as_of)
    }

    /// Dwell averages reuse the formula model with a stop-type filter, under
    /// AVG_DWELL_TIME's segment selection.
    fn dwell_average(
        &self,
        loads: &[Load],
        stop_type: StopType,
        as_of: DateTime<Utc>,
    ) -> Option<f64> {
        let formula = Formula::Average {
            field: Some("dwell_time_minutes".to_string()),
            filter: Some(eq_text("stop_type", stop_type.label())),
        };
        let segments = self.segments_for("AVG_DWELL_TIME", false);
        let scope = EvaluationScope::new(loads).with_segments(segments, self.overrides, as_of);
        evaluate_formula(&formula, &scope).round_to(1).to_option()
    }

    fn eligible_pickups(&self, loads: &[Load], as_of: DateTime<Utc>) -> u32 {
        let segments = self.segments_for("OTP_EXACT", true);
        let records = apply_segments(
            "OTP_EXACT",
            &segments,
            EntityKind::Stops.flatten(loads),
            self.overrides,
            as_of,
        );
        records
            .iter()
            .filter(|record| {
                matches!(record, Record::Stop { stop, .. } if stop.stop_type == StopType::Pickup)
            })
            .count() as u32
    }

    fn surviving_loads<'b>(
        &self,
        metric_code: &str,
        loads: &'b [Load],
        as_of: DateTime<Utc>,
    ) -> Vec<&'b Load> {
        let segments = self.segments_for(metric_code, false);
        apply_segments(
            metric_code,
            &segments,
            EntityKind::Loads.flatten(loads),
            self.overrides,
            as_of,
        )
        .into_iter()
        .map(|record| record.owning_load())
        .collect()
    }
}

fn volume_summary(loads: &[Load]) -> VolumeSummary {
    VolumeSummary {
        total_loads: loads.len() as u32,
        shipments: loads
            .iter()
            .filter(|load| load.load_type == LoadKind::Shipment)
            .count() as u32,
        tenders: loads.len() as u32,
    }
}

fn time_period(loads: &[Load]) -> TimePeriod {
    TimePeriod {
        start: loads.iter().map(|load| load.metadata.created_at).min(),
        end: loads.iter().map(|load| load.metadata.created_at).max(),
    }
}

fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean == 0.0 {
        return None;
    }
    let variance =
        values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt() / mean)
}

/// Stable grouping preserving key order.
fn group_by<K: Ord, F: Fn(&Load) -> K>(loads: &[Load], key: F) -> BTreeMap<K, Vec<Load>> {
    let mut groups: BTreeMap<K, Vec<Load>> = BTreeMap::new();
    for load in loads {
        groups.entry(key(load)).or_default().push(load.clone());
    }
    groups
}
