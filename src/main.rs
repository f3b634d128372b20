use axum::Router;
use ritter_leads_api::{
    auth::token_cache, config::Config, db::Database, db_storage::PgLeadStore,
    handlers::AppState, identity_client::IdentityClient, obs, routes,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Database connection and schema.
/// - Identity provider client and verified-token cache.
/// - HTTP routes and middleware (CORS, Rate Limiting).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obs::init_tracing();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    let identity = IdentityClient::new(
        config.identity_provider_url.clone(),
        config.identity_provider_api_key.clone(),
    )?;
    tracing::info!("Identity client initialized: {}", config.identity_provider_url);

    let token_cache = token_cache(config.auth_cache_ttl_secs);
    tracing::info!(
        "Token cache initialized ({}s TTL)",
        config.auth_cache_ttl_secs
    );

    let app_state = Arc::new(AppState {
        leads: Arc::new(PgLeadStore::new(db.pool.clone())),
        config: config.clone(),
        identity,
        token_cache,
    });

    // Configure rate limiter
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    // Layers applied innermost-first: CORS is outermost, then tracing, then the
    // rate limiter (same order as a ServiceBuilder listing CORS, Trace, Governor).
    let app: Router = routes::app(app_state)
        // 10 req/sec per IP, burst of 20
        .layer(GovernorLayer {
            config: governor_conf,
        })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
