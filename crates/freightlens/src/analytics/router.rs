use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::assistant::{suggest, AssistantSuggestion};
use super::definitions::{MetricDefinition, Segment, TransactionOverride};
use super::domain::Load;
use super::repository::DefinitionRepository;
use super::service::{CatalogError, CatalogService};

/// Router builder exposing the catalog, evaluation, and assistant endpoints.
pub fn catalog_router<R>(service: Arc<CatalogService<R>>) -> Router
where
    R: DefinitionRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/metrics",
            get(list_metrics::<R>).post(create_metric::<R>),
        )
        .route(
            "/api/v1/metrics/:code",
            put(update_metric::<R>).delete(delete_metric::<R>),
        )
        .route("/api/v1/metrics/:code/duplicate", post(duplicate_metric::<R>))
        .route("/api/v1/metrics/:code/value", post(metric_value::<R>))
        .route(
            "/api/v1/segments",
            get(list_segments::<R>).post(create_segment::<R>),
        )
        .route(
            "/api/v1/segments/:code",
            put(update_segment::<R>).delete(delete_segment::<R>),
        )
        .route("/api/v1/overrides", post(add_override::<R>))
        .route("/api/v1/reports/carriers", post(carrier_reports::<R>))
        .route("/api/v1/reports/lanes", post(lane_reports::<R>))
        .route("/api/v1/assistant/suggestions", post(assistant_suggestions))
        .with_state(service)
}

fn error_response(error: CatalogError) -> Response {
    let status = match &error {
        CatalogError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CatalogError::BaselineImmutable { .. } | CatalogError::DuplicateCode { .. } => {
            StatusCode::CONFLICT
        }
        CatalogError::UnknownMetric { .. } | CatalogError::UnknownSegment { .. } => {
            StatusCode::NOT_FOUND
        }
        CatalogError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}

async fn list_metrics<R>(State(service): State<Arc<CatalogService<R>>>) -> Response
where
    R: DefinitionRepository + 'static,
{
    match service.metrics() {
        Ok(metrics) => (StatusCode::OK, Json(metrics)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn create_metric<R>(
    State(service): State<Arc<CatalogService<R>>>,
    Json(definition): Json<MetricDefinition>,
) -> Response
where
    R: DefinitionRepository + 'static,
{
    match service.create_metric(definition) {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn update_metric<R>(
    State(service): State<Arc<CatalogService<R>>>,
    Path(code): Path<String>,
    Json(definition): Json<MetricDefinition>,
) -> Response
where
    R: DefinitionRepository + 'static,
{
    match service.update_metric(&code, definition) {
        Ok(updated) => (StatusCode::OK, Json(updated)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn delete_metric<R>(
    State(service): State<Arc<CatalogService<R>>>,
    Path(code): Path<String>,
) -> Response
where
    R: DefinitionRepository + 'static,
{
    match service.delete_metric(&code) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct DuplicateRequest {
    new_code: String,
}

async fn duplicate_metric<R>(
    State(service): State<Arc<CatalogService<R>>>,
    Path(code): Path<String>,
    Json(request): Json<DuplicateRequest>,
) -> Response
where
    R: DefinitionRepository + 'static,
{
    match service.duplicate_metric(&code, &request.new_code) {
        Ok(copy) => (StatusCode::CREATED, Json(copy)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct EvaluateRequest {
    loads: Vec<Load>,
    #[serde(default)]
    record_set_version: u64,
    #[serde(default)]
    as_of: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct EvaluateResponse {
    metric_code: String,
    /// `null` when the metric is undefined over the given records.
    value: Option<f64>,
    unit: String,
    precision: u8,
}

async fn metric_value<R>(
    State(service): State<Arc<CatalogService<R>>>,
    Path(code): Path<String>,
    Json(request): Json<EvaluateRequest>,
) -> Response
where
    R: DefinitionRepository + 'static,
{
    let definition = match service.metrics() {
        Ok(metrics) => metrics.into_iter().find(|metric| metric.metric_code == code),
        Err(error) => return error_response(error),
    };
    let Some(definition) = definition else {
        return error_response(CatalogError::UnknownMetric { code });
    };

    let as_of = request.as_of.unwrap_or_else(Utc::now);
    match service.compute_metric(&code, &request.loads, request.record_set_version, as_of) {
        Ok(value) => (
            StatusCode::OK,
            Json(EvaluateResponse {
                metric_code: code,
                value: value.to_option(),
                unit: definition.unit,
                precision: definition.precision,
            }),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

async fn list_segments<R>(State(service): State<Arc<CatalogService<R>>>) -> Response
where
    R: DefinitionRepository + 'static,
{
    match service.segments() {
        Ok(segments) => (StatusCode::OK, Json(segments)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn create_segment<R>(
    State(service): State<Arc<CatalogService<R>>>,
    Json(segment): Json<Segment>,
) -> Response
where
    R: DefinitionRepository + 'static,
{
    match service.create_segment(segment) {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn update_segment<R>(
    State(service): State<Arc<CatalogService<R>>>,
    Path(code): Path<String>,
    Json(segment): Json<Segment>,
) -> Response
where
    R: DefinitionRepository + 'static,
{
    match service.update_segment(&code, segment) {
        Ok(updated) => (StatusCode::OK, Json(updated)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn delete_segment<R>(
    State(service): State<Arc<CatalogService<R>>>,
    Path(code): Path<String>,
) -> Response
where
    R: DefinitionRepository + 'static,
{
    match service.delete_segment(&code) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

async fn add_override<R>(
    State(service): State<Arc<CatalogService<R>>>,
    Json(entry): Json<TransactionOverride>,
) -> Response
where
    R: DefinitionRepository + 'static,
{
    match service.add_override(entry) {
        Ok(stored) => (StatusCode::CREATED, Json(stored)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct ReportRequest {
    loads: Vec<Load>,
    #[serde(default)]
    as_of: Option<DateTime<Utc>>,
}

async fn carrier_reports<R>(
    State(service): State<Arc<CatalogService<R>>>,
    Json(request): Json<ReportRequest>,
) -> Response
where
    R: DefinitionRepository + 'static,
{
    let as_of = request.as_of.unwrap_or_else(Utc::now);
    match service.carrier_reports(&request.loads, as_of) {
        Ok(reports) => (StatusCode::OK, Json(reports)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn lane_reports<R>(
    State(service): State<Arc<CatalogService<R>>>,
    Json(request): Json<ReportRequest>,
) -> Response
where
    R: DefinitionRepository + 'static,
{
    let as_of = request.as_of.unwrap_or_else(Utc::now);
    match service.lane_reports(&request.loads, as_of) {
        Ok(reports) => (StatusCode::OK, Json(reports)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct SuggestRequest {
    prompt: String,
}

#[derive(Debug, Serialize)]
struct SuggestResponse {
    /// `null` when no template matches the prompt.
    suggestion: Option<AssistantSuggestion>,
}

async fn assistant_suggestions(Json(request): Json<SuggestRequest>) -> Response {
    let suggestion = suggest(&request.prompt);
    (StatusCode::OK, Json(SuggestResponse { suggestion })).into_response()
}
