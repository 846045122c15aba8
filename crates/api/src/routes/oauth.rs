//! OAuth browser-flow route handlers.
//!
//! - `GET /auth/{provider}?redirect=/path`: stores a CSRF state and the
//!   post-login path in the handshake session, then redirects to the
//!   provider's consent screen.
//! - `GET /auth/{provider}/callback`: validates the state, exchanges the code,
//!   logs the user in and hands the tokens to the frontend as cookies before
//!   redirecting to `FRONTEND_URL + path`.
//!
//! Callback failures redirect to the frontend login page with an
//! `error` query parameter instead of rendering JSON.

use axum::{
    extract::State,
    http::{HeaderValue, header::SET_COOKIE},
    response::{IntoResponse, Redirect, Response},
};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tower_sessions::cookie::{Cookie, SameSite, time::Duration as CookieDuration};

use barestore_core::OAuthProvider;

use crate::error::{AppError, Result};
use crate::extract::{Path, Query};
use crate::middleware::ClientIp;
use crate::services::auth::TokenPair;
use crate::services::auth::tokens::{ACCESS_TOKEN_TTL, REFRESH_TOKEN_TTL};
use crate::services::oauth::OAuthError;
use crate::state::AppState;

/// Session key for the in-flight handshake.
const HANDSHAKE_KEY: &str = "oauth_handshake";

/// Where the frontend lands after login when no path was requested.
const DEFAULT_REDIRECT: &str = "/home";

const STATE_LENGTH: usize = 32;

/// Handshake data kept between the redirect and the callback.
#[derive(Debug, Serialize, Deserialize)]
struct Handshake {
    provider: OAuthProvider,
    state: String,
    redirect: String,
}

#[derive(Debug, Deserialize)]
pub struct StartQuery {
    pub redirect: Option<String>,
}

/// Query parameters from the provider callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user denied consent.
    pub error: Option<String>,
}

fn parse_provider(slug: &str) -> Result<OAuthProvider> {
    slug.parse().map_err(AppError::BadRequest)
}

/// Accept only same-site relative paths; anything else falls back to the default.
fn sanitize_redirect(path: Option<&str>) -> String {
    match path {
        Some(p) if p.starts_with('/') && !p.starts_with("//") && !p.contains('\\') => {
            p.to_owned()
        }
        _ => DEFAULT_REDIRECT.to_owned(),
    }
}

fn random_state() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}

/// Begin an OAuth login.
///
/// GET /auth/{provider}
pub async fn start(
    State(state): State<AppState>,
    session: Session,
    Path(provider): Path<String>,
    Query(query): Query<StartQuery>,
) -> Result<Redirect> {
    let provider = parse_provider(&provider)?;
    let handshake = Handshake {
        provider,
        state: random_state(),
        redirect: sanitize_redirect(query.redirect.as_deref()),
    };

    let url = state.oauth().authorize_url(provider, &handshake.state)?;

    session
        .insert(HANDSHAKE_KEY, &handshake)
        .await
        .map_err(|e| AppError::Internal(format!("failed to store OAuth state: {e}")))?;

    Ok(Redirect::to(url.as_str()))
}

/// Finish an OAuth login.
///
/// GET /auth/{provider}/callback
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    ClientIp(ip): ClientIp,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let frontend = state.config().frontend_url.trim_end_matches('/').to_owned();
    let fail = |code: &str| Redirect::to(&format!("{frontend}/login?error={code}")).into_response();

    if let Some(error) = query.error {
        tracing::warn!(%provider, %error, "OAuth consent denied");
        return fail("oauth_denied");
    }

    // One-time use, whatever the outcome
    let loaded = session.remove::<Handshake>(HANDSHAKE_KEY).await;
    let handshake = match check_handshake(loaded, &provider, query.state.as_deref()) {
        Ok(handshake) => handshake,
        Err(code) => return fail(code),
    };

    let Some(code) = query.code else {
        tracing::warn!(%provider, "OAuth callback missing code");
        return fail("missing_code");
    };

    let profile = match state.oauth().exchange(handshake.provider, &code).await {
        Ok(profile) => profile,
        Err(e @ OAuthError::MissingEmail) => {
            tracing::warn!(%provider, error = %e, "OAuth profile without email");
            return fail("missing_email");
        }
        Err(e) => {
            tracing::error!(%provider, error = %e, "OAuth code exchange failed");
            return fail("token_exchange");
        }
    };

    let auth = match state
        .auth()
        .oauth_login(handshake.provider, &profile, ip)
        .await
    {
        Ok(auth) => auth,
        Err(e) => return AppError::from(e).into_response(),
    };

    let mut response = Redirect::to(&format!("{frontend}{}", handshake.redirect)).into_response();
    for cookie in token_cookies(&auth.tokens, state.config().is_https()) {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => {
                return AppError::Internal(format!("invalid cookie header: {e}")).into_response();
            }
        }
    }

    tracing::info!(user_id = %auth.user.id, %provider, "OAuth login complete");
    response
}

/// Match the stored handshake against the callback.
///
/// Returns the redirect error code on failure. A session store failure is
/// logged as an error and kept distinct from a state mismatch.
fn check_handshake(
    loaded: std::result::Result<Option<Handshake>, tower_sessions::session::Error>,
    provider: &str,
    state: Option<&str>,
) -> std::result::Result<Handshake, &'static str> {
    let handshake = loaded.map_err(|e| {
        tracing::error!(%provider, error = %e, "Failed to load OAuth handshake session");
        "session_unavailable"
    })?;

    handshake
        .filter(|h| Some(h.state.as_str()) == state && h.provider.as_str() == provider)
        .ok_or_else(|| {
            tracing::warn!(%provider, "OAuth state mismatch");
            "invalid_state"
        })
}

/// `accessToken` and `refreshToken` cookies for the frontend to pick up.
fn token_cookies(tokens: &TokenPair, secure: bool) -> [Cookie<'static>; 2] {
    let build = |name: &'static str, value: &str, ttl: chrono::Duration| {
        Cookie::build((name, value.to_owned()))
            .path("/")
            .secure(secure)
            .same_site(SameSite::Lax)
            .max_age(CookieDuration::seconds(ttl.num_seconds()))
            .build()
    };

    [
        build("accessToken", &tokens.access_token, ACCESS_TOKEN_TTL),
        build("refreshToken", &tokens.refresh_token, REFRESH_TOKEN_TTL),
    ]
}
