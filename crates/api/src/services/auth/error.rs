//! Authentication error types.

use axum::http::StatusCode;
use thiserror::Error;

use crate::db::RepositoryError;

use super::tokens::TokenError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] barestore_core::EmailError),

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    #[error("name must not be empty")]
    InvalidName,

    #[error("user not found")]
    UserNotFound,

    #[error("user already exists")]
    UserAlreadyExists,

    /// Account exists but no password was ever set.
    #[error("password has not been set for this account")]
    PasswordNotSet,

    #[error("email address has not been verified")]
    EmailNotVerified,

    #[error("invalid password")]
    InvalidPassword,

    /// Verification token unknown or already used.
    #[error("invalid or expired token")]
    InvalidOrExpiredToken,

    /// A token of the wrong kind was presented.
    #[error("invalid token type")]
    InvalidTokenType,

    /// Refresh token failed verification or has no live session.
    #[error("invalid or revoked token")]
    InvalidOrRevokedToken,

    #[error("request address does not match the session")]
    IpMismatch,

    #[error("session expired")]
    SessionExpired,

    /// No bearer token on a protected request.
    #[error("authentication required")]
    MissingCredentials,

    #[error("access token expired")]
    AccessTokenExpired,

    /// Resend requested inside the cooldown window.
    #[error("too many requests, retry in {retry_after_seconds}s")]
    TooManyRequests { retry_after_seconds: i64 },

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Token signing error.
    #[error("token error: {0}")]
    Token(#[source] TokenError),
}

impl AuthError {
    /// Stable machine-readable code for clients.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidEmail(_) | Self::WeakPassword(_) | Self::InvalidName => "VALIDATION_ERROR",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::UserAlreadyExists => "USER_ALREADY_EXISTS",
            Self::PasswordNotSet => "PENDING_PASSWORD",
            Self::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::InvalidOrExpiredToken | Self::InvalidOrRevokedToken => "INVALID_TOKEN",
            Self::InvalidTokenType => "INVALID_TOKEN_TYPE",
            Self::IpMismatch => "IP_MISMATCH",
            Self::SessionExpired | Self::AccessTokenExpired => "TOKEN_EXPIRED",
            Self::MissingCredentials => "UNAUTHORIZED",
            Self::TooManyRequests { .. } => "TOO_MANY_REQUESTS",
            Self::Repository(_) | Self::PasswordHash | Self::Token(_) => "INTERNAL_ERROR",
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidEmail(_)
            | Self::WeakPassword(_)
            | Self::InvalidName
            | Self::InvalidOrExpiredToken => StatusCode::BAD_REQUEST,
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::UserAlreadyExists => StatusCode::CONFLICT,
            Self::PasswordNotSet | Self::EmailNotVerified => StatusCode::FORBIDDEN,
            Self::InvalidPassword
            | Self::InvalidTokenType
            | Self::InvalidOrRevokedToken
            | Self::IpMismatch
            | Self::SessionExpired
            | Self::MissingCredentials
            | Self::AccessTokenExpired => StatusCode::UNAUTHORIZED,
            Self::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Repository(_) | Self::PasswordHash | Self::Token(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        let cases = [
            (AuthError::UserNotFound, "USER_NOT_FOUND", 404),
            (AuthError::UserAlreadyExists, "USER_ALREADY_EXISTS", 409),
            (AuthError::PasswordNotSet, "PENDING_PASSWORD", 403),
            (AuthError::EmailNotVerified, "EMAIL_NOT_VERIFIED", 403),
            (AuthError::InvalidPassword, "INVALID_PASSWORD", 401),
            (AuthError::InvalidOrExpiredToken, "INVALID_TOKEN", 400),
            (AuthError::InvalidTokenType, "INVALID_TOKEN_TYPE", 401),
            (AuthError::InvalidOrRevokedToken, "INVALID_TOKEN", 401),
            (AuthError::IpMismatch, "IP_MISMATCH", 401),
            (AuthError::SessionExpired, "TOKEN_EXPIRED", 401),
            (
                AuthError::TooManyRequests {
                    retry_after_seconds: 12,
                },
                "TOO_MANY_REQUESTS",
                429,
            ),
            (AuthError::WeakPassword("short".into()), "VALIDATION_ERROR", 400),
            (AuthError::MissingCredentials, "UNAUTHORIZED", 401),
            (AuthError::PasswordHash, "INTERNAL_ERROR", 500),
        ];

        for (err, code, status) in cases {
            assert_eq!(err.code(), code, "{err}");
            assert_eq!(err.status().as_u16(), status, "{err}");
        }
    }
}
