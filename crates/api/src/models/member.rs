//! Store membership types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use barestore_core::{Email, MemberId, MemberRole, MemberStatus, StoreId, UserId};

use super::Store;

/// A user's role assignment within one store.
///
/// At most one row exists per `(store_id, user_id)`. A `Pending` row is an
/// outstanding invitation; its `id` doubles as the invitation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: MemberId,
    pub store_id: StoreId,
    pub user_id: UserId,
    pub role: MemberRole,
    pub status: MemberStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }

    #[must_use]
    pub fn has_role(&self, allowed: &[MemberRole]) -> bool {
        allowed.contains(&self.role)
    }
}

/// A member row joined with the user it belongs to.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreMember {
    #[serde(flatten)]
    pub member: Member,
    pub email: Email,
    pub name: String,
}

/// A member row joined with its store, as seen by the member.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreMembership {
    #[serde(flatten)]
    pub member: Member,
    pub store: Store,
}
