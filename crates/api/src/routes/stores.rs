//! Store (tenant) route handlers.
//!
//! Every handler resolves the caller's membership in the addressed store
//! through [`MembershipService`](crate::services::MembershipService); role
//! requirements live there, not here.

use axum::{extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use barestore_core::{MemberId, MemberRole, StoreId};

use crate::error::Result;
use crate::extract::{Json, Path};
use crate::middleware::Principal;
use crate::models::{Member, NewStore, Store, StoreMember, StoreMembership, StoreUpdate};
use crate::services::membership::StoreOverview;
use crate::state::AppState;

/// A newly created store with the creator's owner membership.
#[derive(Debug, Serialize)]
pub struct CreatedStore {
    #[serde(flatten)]
    pub store: Store,
    pub member: Member,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteLink {
    pub invite_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InvitationRequest {
    pub email: String,
    pub role: MemberRole,
}

/// POST /stores
pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<NewStore>,
) -> Result<(StatusCode, Json<CreatedStore>)> {
    let (store, member) = state
        .membership()
        .create_store(principal.user_id, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedStore { store, member })))
}

/// Stores where the caller is an active member.
///
/// GET /stores
pub async fn index(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<StoreMembership>>> {
    Ok(Json(
        state.membership().list_my_stores(principal.user_id).await?,
    ))
}

/// GET /stores/{store_id}
pub async fn show(
    State(state): State<AppState>,
    principal: Principal,
    Path(store_id): Path<StoreId>,
) -> Result<Json<StoreOverview>> {
    Ok(Json(
        state
            .membership()
            .get_store(store_id, principal.user_id)
            .await?,
    ))
}

/// PATCH /stores/{store_id}
pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(store_id): Path<StoreId>,
    Json(body): Json<StoreUpdate>,
) -> Result<Json<Store>> {
    Ok(Json(
        state
            .membership()
            .update_store(store_id, principal.user_id, &body)
            .await?,
    ))
}

/// DELETE /stores/{store_id}
pub async fn delete(
    State(state): State<AppState>,
    principal: Principal,
    Path(store_id): Path<StoreId>,
) -> Result<StatusCode> {
    state
        .membership()
        .delete_store(store_id, principal.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /stores/{store_id}/members
pub async fn members(
    State(state): State<AppState>,
    principal: Principal,
    Path(store_id): Path<StoreId>,
) -> Result<Json<Vec<StoreMember>>> {
    Ok(Json(
        state
            .membership()
            .list_members(store_id, principal.user_id)
            .await?,
    ))
}

/// GET /stores/{store_id}/invite-link
pub async fn get_invite_link(
    State(state): State<AppState>,
    principal: Principal,
    Path(store_id): Path<StoreId>,
) -> Result<Json<InviteLink>> {
    let invite_code = state
        .membership()
        .get_invite_link(store_id, principal.user_id)
        .await?;
    Ok(Json(InviteLink { invite_code }))
}

/// Create or rotate the store's invite code.
///
/// POST /stores/{store_id}/invite-link
pub async fn create_invite_link(
    State(state): State<AppState>,
    principal: Principal,
    Path(store_id): Path<StoreId>,
) -> Result<Json<InviteLink>> {
    let code = state
        .membership()
        .create_invite_link(store_id, principal.user_id)
        .await?;
    Ok(Json(InviteLink {
        invite_code: Some(code),
    }))
}

/// Pending invitations of a store.
///
/// GET /stores/{store_id}/invitations
pub async fn invitations(
    State(state): State<AppState>,
    principal: Principal,
    Path(store_id): Path<StoreId>,
) -> Result<Json<Vec<StoreMember>>> {
    Ok(Json(
        state
            .membership()
            .list_store_invitations(store_id, principal.user_id)
            .await?,
    ))
}

/// Invite an existing user by email.
///
/// POST /stores/{store_id}/invitations
pub async fn invite(
    State(state): State<AppState>,
    principal: Principal,
    Path(store_id): Path<StoreId>,
    Json(body): Json<InvitationRequest>,
) -> Result<(StatusCode, Json<Member>)> {
    let member = state
        .membership()
        .create_invitation(store_id, principal.user_id, &body.email, body.role)
        .await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// DELETE /stores/{store_id}/invitations/{invitation_id}
pub async fn delete_invitation(
    State(state): State<AppState>,
    principal: Principal,
    Path((store_id, invitation_id)): Path<(StoreId, MemberId)>,
) -> Result<StatusCode> {
    state
        .membership()
        .delete_invitation(store_id, principal.user_id, invitation_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
