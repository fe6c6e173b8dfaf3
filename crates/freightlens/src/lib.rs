//! Metric formula and segment rule evaluation for freight transportation KPIs.
//!
//! The [`analytics`] module carries the core: the transactional domain model,
//! the condition/formula expression language and its evaluator, segment-based
//! record suppression with per-transaction overrides, and the carrier/lane
//! reporting rollups built on top of them.

pub mod analytics;
pub mod config;
pub mod error;
pub mod telemetry;
