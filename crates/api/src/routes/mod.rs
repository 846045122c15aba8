//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                  - Liveness check
//! GET  /health/ready                            - Readiness check (database)
//!
//! # Auth
//! POST /auth/signup                             - Start signup, email verification link
//! GET  /auth/signup/verify?token=               - Check a verification token
//! POST /auth/signup/password                    - Set password, activate, log in
//! POST /auth/login                              - Password login
//! POST /auth/refresh                            - Rotate refresh token
//! POST /auth/logout                             - Revoke refresh token
//! GET  /auth/me                                 - Current user (bearer)
//!
//! # OAuth (browser redirects)
//! GET  /auth/{provider}?redirect=/path          - Redirect to provider
//! GET  /auth/{provider}/callback                - Finish login, set cookies
//!
//! # Stores (bearer)
//! POST   /stores                                - Create store (caller becomes OWNER)
//! GET    /stores                                - Caller's stores
//! GET    /stores/{id}                           - Store with member count
//! PATCH  /stores/{id}                           - Update settings (OWNER/MANAGER)
//! DELETE /stores/{id}                           - Soft delete (OWNER)
//! GET    /stores/{id}/members                   - Members
//! GET    /stores/{id}/invite-link               - Current invite code (OWNER/MANAGER)
//! POST   /stores/{id}/invite-link               - Rotate invite code (OWNER/MANAGER)
//! GET    /stores/{id}/invitations               - Pending invitations (OWNER/MANAGER)
//! POST   /stores/{id}/invitations               - Invite by email (OWNER/MANAGER)
//! DELETE /stores/{id}/invitations/{inv}         - Withdraw invitation (OWNER/MANAGER)
//!
//! # Invitations (bearer)
//! GET  /invitations                             - Caller's pending invitations
//! POST /invitations/{inv}/respond               - Accept or decline
//! ```

pub mod auth;
pub mod invitations;
pub mod oauth;
pub mod stores;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/signup/verify", get(auth::verify_signup))
        .route("/signup/password", post(auth::set_password))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        // Static segments above take priority over the provider slug
        .route("/{provider}", get(oauth::start))
        .route("/{provider}/callback", get(oauth::callback))
}

/// Create the store routes router.
pub fn store_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(stores::index).post(stores::create))
        .route(
            "/{store_id}",
            get(stores::show)
                .patch(stores::update)
                .delete(stores::delete),
        )
        .route("/{store_id}/members", get(stores::members))
        .route(
            "/{store_id}/invite-link",
            get(stores::get_invite_link).post(stores::create_invite_link),
        )
        .route(
            "/{store_id}/invitations",
            get(stores::invitations).post(stores::invite),
        )
        .route(
            "/{store_id}/invitations/{invitation_id}",
            axum::routing::delete(stores::delete_invitation),
        )
}

/// Create the invitation routes router.
pub fn invitation_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(invitations::index))
        .route("/{invitation_id}/respond", post(invitations::respond))
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/stores", store_routes())
        .nest("/invitations", invitation_routes())
}
