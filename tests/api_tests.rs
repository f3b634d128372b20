/// HTTP-level tests for the router
/// Uses wiremock as the identity provider and an in-memory lead store
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use ritter_leads_api::auth::token_cache;
use ritter_leads_api::config::{Config, DEFAULT_MAX_IMPORT_BYTES};
use ritter_leads_api::handlers::AppState;
use ritter_leads_api::identity_client::IdentityClient;
use ritter_leads_api::lead_store::InMemoryLeadStore;
use ritter_leads_api::models::NewLead;
use ritter_leads_api::routes;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{header as header_eq, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "good-token";

async fn identity_provider() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header_eq("authorization", "Bearer good-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "user-1",
            "email": "analyst@ritter.es",
            "user_metadata": {},
            "app_metadata": {"role": "analyst"}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    server
}

fn app(server: &MockServer, store: InMemoryLeadStore) -> Router {
    let config = Config {
        database_url: "postgres://unused".to_string(),
        port: 0,
        identity_provider_url: server.uri(),
        identity_provider_api_key: "anon-key".to_string(),
        auth_cache_ttl_secs: 60,
        max_import_bytes: DEFAULT_MAX_IMPORT_BYTES,
    };
    let identity = IdentityClient::new(server.uri(), "anon-key".to_string()).unwrap();

    routes::app(Arc::new(AppState {
        leads: Arc::new(store),
        config,
        identity,
        token_cache: token_cache(60),
    }))
}

fn seeded_store() -> InMemoryLeadStore {
    let leads = [("Acme Foods", "info@acme.es"), ("Beta Logistics", "hola@beta.es")]
        .into_iter()
        .map(|(name, email)| {
            NewLead {
                email: Some(email.to_string()),
                category: Some("Retail".to_string()),
                ..NewLead::new(name, "Distribution")
            }
            .into_lead(Uuid::new_v4(), Utc::now())
        })
        .collect();
    InMemoryLeadStore::with_leads(leads)
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let server = identity_provider().await;
    let response = app(&server, InMemoryLeadStore::new())
        .oneshot(get("/health", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let server = identity_provider().await;
    let response = app(&server, seeded_store())
        .oneshot(get("/api/v1/leads", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn test_rejected_token_is_unauthorized() {
    let server = identity_provider().await;
    let response = app(&server, seeded_store())
        .oneshot(get("/api/v1/leads", Some("stale-token")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_returns_verified_user() {
    let server = identity_provider().await;
    let response = app(&server, InMemoryLeadStore::new())
        .oneshot(get("/api/v1/me", Some(TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["user_id"], "user-1");
    assert_eq!(body["metadata"]["app_metadata"]["role"], "analyst");
}

#[tokio::test]
async fn test_list_leads_with_token() {
    let server = identity_provider().await;
    let response = app(&server, seeded_store())
        .oneshot(get("/api/v1/leads?page=1&limit=10", Some(TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["leads"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_empty_search_query_is_bad_request() {
    let server = identity_provider().await;
    let response = app(&server, seeded_store())
        .oneshot(get("/api/v1/search?q=%20", Some(TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_ranks_company_matches() {
    let server = identity_provider().await;
    let response = app(&server, seeded_store())
        .oneshot(get("/api/v1/search?q=acme", Some(TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["search_info"]["total_matches"], 1);
    assert_eq!(body["search_results"][0]["company_name"], "Acme Foods");
}

#[tokio::test]
async fn test_unknown_dedup_strategy_is_bad_request() {
    let server = identity_provider().await;
    let response = app(&server, seeded_store())
        .oneshot(post_json(
            "/api/v1/deduplicate",
            json!({"strategy": "fax", "auto_merge": true}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_lead_is_not_found() {
    let server = identity_provider().await;
    let uri = format!("/api/v1/leads/{}", Uuid::new_v4());
    let response = app(&server, seeded_store())
        .oneshot(get(&uri, Some(TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_export_csv_is_an_attachment() {
    let server = identity_provider().await;
    let response = app(&server, seeded_store())
        .oneshot(get(
            "/api/v1/export?format=csv&fields=company_name",
            Some(TOKEN),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.starts_with("attachment;"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("company_name\n"));
}
