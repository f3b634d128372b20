use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// The backing lead store failed.
    Database(sqlx::Error),
    /// A referenced lead (or other resource) does not exist.
    NotFound(String),
    /// Caller error: empty query, unknown strategy, missing required fields.
    InvalidInput(String),
    /// The identity provider could not be reached or answered garbage.
    IdentityProvider(String),
    /// Missing or rejected bearer token.
    Unauthorized(String),
    /// Internal server error.
    Internal(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    /// HTTP status used when the error reaches the client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::IdentityProvider(_) => StatusCode::BAD_GATEWAY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::WithContext { source, .. } => source.status_code(),
        }
    }

    /// Message that is safe to hand back to API callers.
    fn public_message(&self) -> String {
        match self {
            AppError::Database(_) => "Database error".to_string(),
            AppError::NotFound(msg) | AppError::InvalidInput(msg) => msg.clone(),
            AppError::IdentityProvider(_) => "Identity provider unavailable".to_string(),
            AppError::Unauthorized(_) => "Unauthorized".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::WithContext { source, .. } => source.public_message(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(e) => write!(f, "Database error: {}", e),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::IdentityProvider(msg) => write!(f, "Identity provider error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Database(e) => Some(e),
            AppError::WithContext { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    /// Maps each error variant to an HTTP status and a JSON body.
    ///
    /// Server-side failures are logged with their full chain; only a generic
    /// message is returned to the caller.
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            AppError::Database(e) => tracing::error!("Database error: {:?}", e),
            AppError::IdentityProvider(msg) => tracing::error!("Identity provider error: {}", msg),
            AppError::Internal(msg) => tracing::error!("Internal error: {}", msg),
            AppError::Unauthorized(msg) => tracing::warn!("Unauthorized access: {}", msg),
            AppError::WithContext { .. } if status.is_server_error() => {
                tracing::error!("Error with context: {}", self)
            }
            _ => {}
        }

        let body = Json(json!({
            "error": self.public_message(),
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::IdentityProvider(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::InvalidInput(format!("Malformed CSV: {}", err))
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::Database(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::Database(e)),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keeps_the_source_status() {
        let err: Result<(), AppError> = Err(AppError::NotFound("lead 42".to_string()));
        let wrapped = err.context("loading lead").unwrap_err();

        assert_eq!(wrapped.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(wrapped.to_string(), "loading lead: Not found: lead 42");
    }

    #[test]
    fn database_errors_hide_details_from_callers() {
        let err = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.public_message(), "Database error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
