//! Catalog service: definition lifecycle plus cached metric computation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::warn;

use super::definitions::{
    baseline_metrics, baseline_segments, validate_metric_definition, validate_segment,
    DefinitionError, MetricDefinition, Segment, TransactionOverride, ALL_METRICS,
};
use super::domain::Load;
use super::formula::{evaluate_formula, EvaluationScope, MetricValue};
use super::reporting::{CarrierReport, LaneReport, ReportingEngine};
use super::repository::{CustomDefinitions, DefinitionRepository, RepositoryError};

/// Error raised by catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Validation(#[from] DefinitionError),
    #[error("baseline definition '{code}' is immutable")]
    BaselineImmutable { code: String },
    #[error("definition code '{code}' already exists")]
    DuplicateCode { code: String },
    #[error("unknown metric '{code}'")]
    UnknownMetric { code: String },
    #[error("unknown segment '{code}'")]
    UnknownSegment { code: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

type CacheKey = (String, String, u64);

#[derive(Clone, Copy)]
struct CachedValue {
    computed_at: Instant,
    value: MetricValue,
}

/// Seeds the baseline catalogs, manages custom definitions through the
/// injected repository, and computes metric values with the relevant
/// auto-apply segments and overrides.
pub struct CatalogService<R> {
    repository: Arc<R>,
    baseline_metrics: Vec<MetricDefinition>,
    baseline_segments: Vec<Segment>,
    cache_ttl: Duration,
    cache: Mutex<HashMap<CacheKey, CachedValue>>,
}

impl<R> CatalogService<R>
where
    R: DefinitionRepository + 'static,
{
    pub fn new(repository: Arc<R>, cache_ttl: Duration) -> Self {
        Self {
            repository,
            baseline_metrics: baseline_metrics(),
            baseline_segments: baseline_segments(),
            cache_ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Baseline and custom metric definitions, baselines first.
    pub fn metrics(&self) -> Result<Vec<MetricDefinition>, CatalogError> {
        let custom = self.repository.load()?;
        let mut all = self.baseline_metrics.clone();
        all.extend(custom.metrics);
        Ok(all)
    }

    /// Baseline and custom segments, baselines first.
    pub fn segments(&self) -> Result<Vec<Segment>, CatalogError> {
        let custom = self.repository.load()?;
        let mut all = self.baseline_segments.clone();
        all.extend(custom.segments);
        Ok(all)
    }

    pub fn overrides(&self) -> Result<Vec<TransactionOverride>, CatalogError> {
        Ok(self.repository.load()?.overrides)
    }

    pub fn create_metric(&self, mut definition: MetricDefinition) -> Result<MetricDefinition, CatalogError> {
        validate_metric_definition(&definition)?;
        let mut custom = self.repository.load()?;
        self.ensure_metric_code_free(&definition.metric_code, &custom)?;
        definition.is_baseline = false;
        custom.metrics.push(definition.clone());
        self.repository.save(&custom)?;
        Ok(definition)
    }

    pub fn update_metric(
        &self,
        code: &str,
        mut definition: MetricDefinition,
    ) -> Result<MetricDefinition, CatalogError> {
        if self.is_baseline_metric(code) {
            return Err(CatalogError::BaselineImmutable {
                code: code.to_string(),
            });
        }
        validate_metric_definition(&definition)?;

        let mut custom = self.repository.load()?;
        let slot = custom
            .metrics
            .iter_mut()
            .find(|metric| metric.metric_code == code)
            .ok_or_else(|| CatalogError::UnknownMetric {
                code: code.to_string(),
            })?;
        definition.is_baseline = false;
        definition.metric_code = code.to_string();
        *slot = definition.clone();
        self.repository.save(&custom)?;
        Ok(definition)
    }

    pub fn delete_metric(&self, code: &str) -> Result<(), CatalogError> {
        if self.is_baseline_metric(code) {
            return Err(CatalogError::BaselineImmutable {
                code: code.to_string(),
            });
        }
        let mut custom = self.repository.load()?;
        let before = custom.metrics.len();
        custom.metrics.retain(|metric| metric.metric_code != code);
        if custom.metrics.len() == before {
            return Err(CatalogError::UnknownMetric {
                code: code.to_string(),
            });
        }
        self.repository.save(&custom)?;
        Ok(())
    }

    /// Copy an existing definition (baseline or custom) under a new code;
    /// the copy is always a custom definition.
    pub fn duplicate_metric(
        &self,
        code: &str,
        new_code: &str,
    ) -> Result<MetricDefinition, CatalogError> {
        let mut custom = self.repository.load()?;
        self.ensure_metric_code_free(new_code, &custom)?;

        let source = self
            .baseline_metrics
            .iter()
            .chain(custom.metrics.iter())
            .find(|metric| metric.metric_code == code)
            .ok_or_else(|| CatalogError::UnknownMetric {
                code: code.to_string(),
            })?;

        let mut copy = source.clone();
        copy.metric_id = format!("metric_{}", new_code.to_lowercase());
        copy.metric_code = new_code.to_string();
        copy.metric_name = format!("{} (Copy)", source.metric_name);
        copy.is_baseline = false;
        copy.created_by = None;
        copy.created_at = None;

        custom.metrics.push(copy.clone());
        self.repository.save(&custom)?;
        Ok(copy)
    }

    pub fn create_segment(&self, mut segment: Segment) -> Result<Segment, CatalogError> {
        validate_segment(&segment)?;
        let mut custom = self.repository.load()?;
        self.ensure_segment_code_free(&segment.segment_code, &custom)?;
        self.warn_on_dangling_metrics(&segment, &custom);
        segment.created_by = segment.created_by.take().or_else(|| Some("user".to_string()));
        custom.segments.push(segment.clone());
        self.repository.save(&custom)?;
        Ok(segment)
    }

    pub fn update_segment(&self, code: &str, segment: Segment) -> Result<Segment, CatalogError> {
        if self.is_baseline_segment(code) {
            return Err(CatalogError::BaselineImmutable {
                code: code.to_string(),
            });
        }
        validate_segment(&segment)?;

        let mut custom = self.repository.load()?;
        self.warn_on_dangling_metrics(&segment, &custom);
        let slot = custom
            .segments
            .iter_mut()
            .find(|existing| existing.segment_code == code)
            .ok_or_else(|| CatalogError::UnknownSegment {
                code: code.to_string(),
            })?;
        let mut segment = segment;
        segment.segment_code = code.to_string();
        *slot = segment.clone();
        self.repository.save(&custom)?;
        Ok(segment)
    }

    pub fn delete_segment(&self, code: &str) -> Result<(), CatalogError> {
        if self.is_baseline_segment(code) {
            return Err(CatalogError::BaselineImmutable {
                code: code.to_string(),
            });
        }
        let mut custom = self.repository.load()?;
        let before = custom.segments.len();
        custom.segments.retain(|segment| segment.segment_code != code);
        if custom.segments.len() == before {
            return Err(CatalogError::UnknownSegment {
                code: code.to_string(),
            });
        }
        self.repository.save(&custom)?;
        Ok(())
    }

    pub fn add_override(
        &self,
        entry: TransactionOverride,
    ) -> Result<TransactionOverride, CatalogError> {
        let mut custom = self.repository.load()?;
        custom.overrides.push(entry.clone());
        self.repository.save(&custom)?;
        Ok(entry)
    }

    /// Evaluate one metric over a load snapshot, with the auto-apply
    /// segments relevant to it and all effective overrides.
    ///
    /// Results are cached per `(metric_code, segment set, record_set_version)`
    /// until the configured TTL elapses; stale entries are recomputed.
    pub fn compute_metric(
        &self,
        code: &str,
        loads: &[Load],
        record_set_version: u64,
        as_of: DateTime<Utc>,
    ) -> Result<MetricValue, CatalogError> {
        let metrics = self.metrics()?;
        let definition = metrics
            .iter()
            .find(|metric| metric.metric_code == code)
            .ok_or_else(|| CatalogError::UnknownMetric {
                code: code.to_string(),
            })?;

        let segments = self.segments()?;
        let overrides = self.effective_overrides(&segments)?;

        let relevant: Vec<&Segment> = segments
            .iter()
            .filter(|segment| {
                segment.is_active && segment.auto_apply && segment.affects_metric(code)
            })
            .collect();

        let fingerprint = relevant
            .iter()
            .map(|segment| segment.segment_id.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let key = (code.to_string(), fingerprint, record_set_version);

        if let Ok(cache) = self.cache.lock() {
            if let Some(entry) = cache.get(&key) {
                if entry.computed_at.elapsed() < self.cache_ttl {
                    return Ok(entry.value);
                }
            }
        }

        let scope = EvaluationScope::new(loads).with_segments(relevant, &overrides, as_of);
        let value = evaluate_formula(&definition.formula, &scope).round_to(definition.precision);

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(
                key,
                CachedValue {
                    computed_at: Instant::now(),
                    value,
                },
            );
        }

        Ok(value)
    }

    pub fn carrier_reports(
        &self,
        loads: &[Load],
        as_of: DateTime<Utc>,
    ) -> Result<Vec<CarrierReport>, CatalogError> {
        let metrics = self.metrics()?;
        let segments = self.segments()?;
        let overrides = self.effective_overrides(&segments)?;
        Ok(ReportingEngine::new(&metrics, &segments, &overrides).carrier_reports(loads, as_of))
    }

    pub fn lane_reports(
        &self,
        loads: &[Load],
        as_of: DateTime<Utc>,
    ) -> Result<Vec<LaneReport>, CatalogError> {
        let metrics = self.metrics()?;
        let segments = self.segments()?;
        let overrides = self.effective_overrides(&segments)?;
        Ok(ReportingEngine::new(&metrics, &segments, &overrides).lane_reports(loads, as_of))
    }

    /// Overrides whose segment still exists; dangling references are logged
    /// and dropped rather than failing the computation.
    fn effective_overrides(
        &self,
        segments: &[Segment],
    ) -> Result<Vec<TransactionOverride>, CatalogError> {
        let overrides = self.repository.load()?.overrides;
        Ok(overrides
            .into_iter()
            .filter(|entry| {
                let known = segments
                    .iter()
                    .any(|segment| segment.segment_id == entry.segment_id);
                if !known {
                    warn!(
                        override_id = %entry.override_id,
                        segment_id = %entry.segment_id,
                        "override references unknown segment; ignoring"
                    );
                }
                known
            })
            .collect())
    }

    fn is_baseline_metric(&self, code: &str) -> bool {
        self.baseline_metrics
            .iter()
            .any(|metric| metric.metric_code == code)
    }

    fn is_baseline_segment(&self, code: &str) -> bool {
        self.baseline_segments
            .iter()
            .any(|segment| segment.segment_code == code)
    }

    fn ensure_metric_code_free(
        &self,
        code: &str,
        custom: &CustomDefinitions,
    ) -> Result<(), CatalogError> {
        let taken = self.is_baseline_metric(code)
            || custom.metrics.iter().any(|metric| metric.metric_code == code);
        if taken {
            return Err(CatalogError::DuplicateCode {
                code: code.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_segment_code_free(
        &self,
        code: &str,
        custom: &CustomDefinitions,
    ) -> Result<(), CatalogError> {
        let taken = self.is_baseline_segment(code)
            || custom
                .segments
                .iter()
                .any(|segment| segment.segment_code == code);
        if taken {
            return Err(CatalogError::DuplicateCode {
                code: code.to_string(),
            });
        }
        Ok(())
    }

    fn warn_on_dangling_metrics(&self, segment: &Segment, custom: &CustomDefinitions) {
        for code in &segment.affected_metrics {
            if code == ALL_METRICS {
                continue;
            }
            let known = self.is_baseline_metric(code)
                || custom.metrics.iter().any(|metric| &metric.metric_code == code);
            if !known {
                warn!(
                    segment_code = %segment.segment_code,
                    metric_code = %code,
                    "segment affects unknown metric"
                );
            }
        }
    }
}
