//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Every failure renders as
//!
//! ```json
//! { "message": "...", "errorCode": "USER_NOT_FOUND", "statusCode": 404 }
//! ```
//!
//! Server errors are captured to Sentry and answered with a generic message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::membership::MembershipError;
use crate::services::oauth::OAuthError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed outside a service.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication or session operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Store membership check or tenancy operation failed.
    #[error("Membership error: {0}")]
    Membership(#[from] MembershipError),

    /// OAuth provider handshake failed.
    #[error("OAuth error: {0}")]
    OAuth(#[from] OAuthError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: String,
    pub error_code: &'static str,
    pub status_code: u16,
}

impl AppError {
    /// Stable machine-readable code for clients.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Auth(err) => err.code(),
            Self::Membership(err) => err.code(),
            Self::OAuth(OAuthError::NotConfigured(_)) => "PROVIDER_NOT_CONFIGURED",
            Self::OAuth(OAuthError::InvalidState) => "INVALID_STATE",
            Self::OAuth(_) => "OAUTH_ERROR",
            Self::BadRequest(_) => "VALIDATION_ERROR",
            Self::Database(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Auth(err) => err.status(),
            Self::Membership(err) => err.status(),
            Self::OAuth(OAuthError::NotConfigured(_)) => StatusCode::NOT_FOUND,
            Self::OAuth(OAuthError::InvalidState) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::OAuth(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to clients.
    fn public_message(&self) -> String {
        match self {
            Self::Auth(err) => err.to_string(),
            Self::Membership(err) => err.to_string(),
            Self::OAuth(err @ (OAuthError::NotConfigured(_) | OAuthError::InvalidState)) => {
                err.to_string()
            }
            Self::OAuth(_) => "External service error".to_string(),
            Self::BadRequest(msg) => msg.clone(),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() || matches!(self, Self::OAuth(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let message = if status.is_server_error() && !matches!(self, Self::OAuth(_)) {
            "Internal server error".to_string()
        } else {
            self.public_message()
        };

        let body = ErrorBody {
            message,
            error_code: self.code(),
            status_code: status.as_u16(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}
