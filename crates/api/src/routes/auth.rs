//! Password authentication and session route handlers.
//!
//! All endpoints speak JSON. Successful logins return the token pair and the
//! user in one body:
//!
//! ```json
//! { "accessToken": "...", "refreshToken": "...", "user": { "id": 1, ... } }
//! ```

use axum::{extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::extract::{Json, Query};
use crate::middleware::{ClientIp, Principal};
use crate::models::User;
use crate::services::auth::{AuthSession, SignupVerification};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body for refresh and logout.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Plain acknowledgement.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Start signup and email a verification link.
///
/// POST /auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    state.auth().signup(&body.email, &body.name).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Verification email sent",
        }),
    ))
}

/// Check a verification token and return the email it belongs to.
///
/// GET /auth/signup/verify?token=...
pub async fn verify_signup(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<SignupVerification>> {
    Ok(Json(state.auth().verify_signup(&query.token).await?))
}

/// Set the initial password, activating the account.
///
/// POST /auth/signup/password
pub async fn set_password(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(body): Json<SetPasswordRequest>,
) -> Result<Json<AuthSession>> {
    let session = state
        .auth()
        .set_password(&body.token, &body.password, ip)
        .await?;
    Ok(Json(session))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthSession>> {
    let session = state.auth().login(&body.email, &body.password, ip).await?;
    Ok(Json(session))
}

/// Rotate a refresh token.
///
/// POST /auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<AuthSession>> {
    Ok(Json(state.auth().refresh(&body.refresh_token, ip).await?))
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<StatusCode> {
    state.auth().logout(&body.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /auth/me
pub async fn me(State(state): State<AppState>, principal: Principal) -> Result<Json<User>> {
    Ok(Json(state.auth().current_user(principal.user_id).await?))
}
