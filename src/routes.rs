use crate::auth::require_user;
use crate::handlers::{self, AppState};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

/// Builds the application router.
///
/// `/health` is public; everything under `/api/v1` needs a bearer token.
/// Rate limiting, tracing and CORS are layered on in `main`.
pub fn app(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/me", get(handlers::current_user))
        .route("/leads", get(handlers::list_leads))
        .route("/leads/bulk-update", post(handlers::bulk_update_leads))
        .route("/leads/bulk-delete", post(handlers::bulk_delete_leads))
        .route(
            "/leads/:id",
            get(handlers::get_lead)
                .put(handlers::update_lead)
                .delete(handlers::delete_lead),
        )
        .route("/statistics", get(handlers::statistics))
        .route("/quality-analysis", get(handlers::quality_analysis))
        .route("/search", get(handlers::search_leads))
        .route("/filters/options", get(handlers::filter_options))
        .route("/export", get(handlers::export_leads))
        .route("/import", post(handlers::import_leads))
        .route("/validate", post(handlers::validate_leads))
        .route("/deduplicate", post(handlers::deduplicate_leads))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user))
        .layer(RequestBodyLimitLayer::new(state.config.max_import_bytes));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api)
        .with_state(state)
}
