use crate::errors::AppError;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The caller behind a verified bearer token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub email: Option<String>,
    /// User and app metadata as returned by the provider.
    pub metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: serde_json::Value,
    #[serde(default)]
    app_metadata: serde_json::Value,
}

impl From<ProviderUser> for AuthenticatedUser {
    fn from(user: ProviderUser) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            metadata: serde_json::json!({
                "user_metadata": user.user_metadata,
                "app_metadata": user.app_metadata,
            }),
        }
    }
}

/// Client for the external identity provider's token verification endpoint.
#[derive(Clone)]
pub struct IdentityClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl IdentityClient {
    /// Creates a new `IdentityClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Provider root, without trailing slash.
    /// * `api_key` - Project API key sent as the `apikey` header.
    pub fn new(base_url: String, api_key: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::IdentityProvider(format!("Failed to create identity client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Resolves a bearer token to its user.
    ///
    /// A 401/403 from the provider means the token is bad and maps to
    /// `Unauthorized`; any other failure is a provider error.
    pub async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let url = format!("{}/auth/v1/user", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::IdentityProvider(format!("Token verification failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AppError::Unauthorized(
                "Invalid or expired token".to_string(),
            ));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::IdentityProvider(format!(
                "Identity provider returned {}: {}",
                status, error_text
            )));
        }

        let user: ProviderUser = response.json().await.map_err(|e| {
            AppError::IdentityProvider(format!("Failed to parse identity response: {}", e))
        })?;

        tracing::debug!("Verified token for user {}", user.id);
        Ok(user.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let client =
            IdentityClient::new("https://id.example.com/".to_string(), "key".to_string()).unwrap();
        assert_eq!(client.base_url, "https://id.example.com");
    }

    #[test]
    fn provider_user_keeps_both_metadata_blocks() {
        let raw = serde_json::json!({
            "id": "u-1",
            "email": "ana@example.com",
            "user_metadata": {"full_name": "Ana"},
            "app_metadata": {"role": "admin"}
        });
        let user: AuthenticatedUser = serde_json::from_value::<ProviderUser>(raw).unwrap().into();

        assert_eq!(user.user_id, "u-1");
        assert_eq!(user.metadata["app_metadata"]["role"], "admin");
        assert_eq!(user.metadata["user_metadata"]["full_name"], "Ana");
    }
}
