//! Route handlers for the caller's own invitations.

use axum::extract::State;
use serde::Deserialize;

use barestore_core::MemberId;

use crate::error::Result;
use crate::extract::{Json, Path};
use crate::middleware::Principal;
use crate::models::{Member, StoreMembership};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub accept: bool,
}

/// Pending invitations addressed to the caller.
///
/// GET /invitations
pub async fn index(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<StoreMembership>>> {
    Ok(Json(
        state
            .membership()
            .list_my_invitations(principal.user_id)
            .await?,
    ))
}

/// Accept or decline an invitation.
///
/// POST /invitations/{invitation_id}/respond
pub async fn respond(
    State(state): State<AppState>,
    principal: Principal,
    Path(invitation_id): Path<MemberId>,
    Json(body): Json<RespondRequest>,
) -> Result<Json<Member>> {
    Ok(Json(
        state
            .membership()
            .respond_to_invitation(invitation_id, body.accept, principal.user_id)
            .await?,
    ))
}
