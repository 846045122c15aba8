//! Bearer-token authentication extractor.
//!
//! The access token is decoded once per request into a [`Principal`]; handlers
//! never touch raw tokens.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};

use barestore_core::{Email, UserId, UserRole};

use crate::error::{AppError, set_sentry_user};
use crate::services::auth::{AuthError, TokenError, TokenIssuer};
use crate::state::AppState;

/// The authenticated caller, decoded from a valid access token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(principal: Principal) -> impl IntoResponse {
///     format!("Hello, {}!", principal.email)
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub email: Email,
    pub role: UserRole,
}

/// Decode the `Authorization: Bearer` header into a principal.
///
/// # Errors
///
/// Returns `AuthError::MissingCredentials` if there is no bearer token,
/// `AuthError::AccessTokenExpired` if it has expired, and
/// `AuthError::InvalidOrRevokedToken` for anything else that fails to verify.
pub fn principal_from_headers(
    headers: &HeaderMap,
    issuer: &TokenIssuer,
) -> Result<Principal, AuthError> {
    let token = bearer_token(headers).ok_or(AuthError::MissingCredentials)?;

    let claims = issuer.verify_access(token).map_err(|e| match e {
        TokenError::Expired => AuthError::AccessTokenExpired,
        _ => AuthError::InvalidOrRevokedToken,
    })?;

    Ok(Principal {
        user_id: claims.sub,
        email: claims.email,
        role: claims.role,
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = principal_from_headers(&parts.headers, state.issuer())?;

        tracing::Span::current().record("user_id", principal.user_id.as_i32());
        set_sentry_user(&principal.user_id, Some(principal.email.as_str()));

        Ok(principal)
    }
}
