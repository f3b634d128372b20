use crate::errors::AppError;
use crate::handlers::AppState;
use crate::identity_client::AuthenticatedUser;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// Verified tokens, keyed by [`token_key`].
pub type TokenCache = Cache<String, AuthenticatedUser>;

pub fn token_cache(ttl_secs: u64) -> TokenCache {
    Cache::builder()
        .time_to_live(Duration::from_secs(ttl_secs))
        .max_capacity(10_000)
        .build()
}

/// Raw tokens never become cache keys; only their SHA-256 digest does.
pub fn token_key(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Rejects requests without a valid bearer token and attaches the
/// [`AuthenticatedUser`] to the request extensions.
pub async fn require_user(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let key = token_key(token);
    let user = match state.token_cache.get(&key).await {
        Some(user) => user,
        None => {
            let user = state.identity.verify(token).await?;
            state.token_cache.insert(key, user.clone()).await;
            user
        }
    };

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
