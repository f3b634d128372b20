use crate::auth::TokenCache;
use crate::config::Config;
use crate::errors::AppError;
use crate::identity_client::{AuthenticatedUser, IdentityClient};
use crate::lead_store::LeadStore;
use crate::models::*;
use crate::quality::QualityAnalysis;
use crate::services::{FilterOptionsResponse, LeadService, SearchResponse, StatisticsReport};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Lead persistence (Postgres in production, in-memory in tests).
    pub leads: Arc<dyn LeadStore>,
    /// Application configuration.
    pub config: Config,
    /// Verifies bearer tokens against the identity provider.
    pub identity: IdentityClient,
    /// Recently verified tokens, keyed by SHA-256 digest.
    pub token_cache: TokenCache,
}

impl AppState {
    pub fn lead_service(&self) -> LeadService {
        LeadService::new(self.leads.clone())
    }
}

/// Health check endpoint.
///
/// Returns the service status and version.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "ritter-leads-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/v1/me
///
/// Returns the user behind the bearer token.
pub async fn current_user(
    Extension(user): Extension<AuthenticatedUser>,
) -> Json<AuthenticatedUser> {
    Json(user)
}

/// GET /api/v1/leads
///
/// Lists leads with filtering, sorting and pagination.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `params` - Paging, sort and filter query parameters. List filters are comma-separated.
pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LeadListParams>,
) -> Result<Json<LeadListResponse>, AppError> {
    tracing::debug!("GET /leads - params: {:?}", params);
    let response = state.lead_service().get_leads(&params).await?;
    Ok(Json(response))
}

/// GET /api/v1/leads/:id
///
/// Returns the lead with up to five related leads from the same category.
pub async fn get_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<LeadDetail>, AppError> {
    let detail = state.lead_service().get_lead(id).await?;
    Ok(Json(detail))
}

/// PUT /api/v1/leads/:id
pub async fn update_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(changes): Json<LeadChanges>,
) -> Result<Json<Lead>, AppError> {
    tracing::info!("PUT /leads/{}", id);
    let lead = state.lead_service().update_lead(id, &changes).await?;
    Ok(Json(lead))
}

/// DELETE /api/v1/leads/:id
pub async fn delete_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("DELETE /leads/{}", id);
    state.lead_service().delete_lead(id).await?;
    Ok(Json(json!({ "message": "Lead deleted successfully" })))
}

/// POST /api/v1/leads/bulk-update
pub async fn bulk_update_leads(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BulkUpdateRequest>,
) -> Result<Json<BulkOperationResponse>, AppError> {
    let response = state.lead_service().bulk_update(&request).await?;
    Ok(Json(response))
}

/// POST /api/v1/leads/bulk-delete
pub async fn bulk_delete_leads(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BulkDeleteRequest>,
) -> Result<Json<BulkOperationResponse>, AppError> {
    let response = state.lead_service().bulk_delete(&request).await?;
    Ok(Json(response))
}

/// GET /api/v1/statistics?period=all|30d|7d|1d
pub async fn statistics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatisticsParams>,
) -> Result<Json<StatisticsReport>, AppError> {
    let report = state
        .lead_service()
        .statistics(params.period.as_deref())
        .await?;
    Ok(Json(report))
}

/// GET /api/v1/quality-analysis
///
/// Quality factors and recommendations, optionally for one category and/or state.
pub async fn quality_analysis(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QualityAnalysisParams>,
) -> Result<Json<QualityAnalysis>, AppError> {
    let analysis = state.lead_service().quality_analysis(&params).await?;
    Ok(Json(analysis))
}

/// GET /api/v1/search?q=...&fields=...
pub async fn search_leads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let response = state.lead_service().search_leads(&params).await?;
    Ok(Json(response))
}

/// GET /api/v1/filters/options
pub async fn filter_options(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FilterOptionsResponse>, AppError> {
    let response = state.lead_service().filter_options().await?;
    Ok(Json(response))
}

/// GET /api/v1/export
///
/// Downloads the filtered leads as a JSON or CSV attachment.
pub async fn export_leads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExportParams>,
) -> Result<Response, AppError> {
    let file = state.lead_service().export_leads(&params).await?;
    let disposition = format!("attachment; filename=\"{}\"", file.file_name);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, file.format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.content,
    )
        .into_response())
}

/// POST /api/v1/import?mapping={...}
///
/// The request body is the CSV file (at most `MAX_IMPORT_BYTES`); `mapping` is
/// a JSON object of lead field to CSV column.
pub async fn import_leads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ImportParams>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let report = state.lead_service().import_leads(&params, &body).await?;
    Ok(Json(json!({
        "import": report,
        "message": "Import completed successfully"
    })))
}

/// POST /api/v1/validate
pub async fn validate_leads(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ValidateLeadsRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let job = state.lead_service().validate_leads(&request).await?;
    Ok(Json(json!({
        "validation": job,
        "message": "Validation completed successfully"
    })))
}

/// POST /api/v1/deduplicate
pub async fn deduplicate_leads(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DeduplicateLeadsRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let job = state.lead_service().deduplicate_leads(&request).await?;
    let message = format!(
        "Deduplication completed. Found {} duplicate groups.",
        job.outcome.duplicates_found
    );
    Ok(Json(json!({
        "deduplication": job,
        "message": message
    })))
}
