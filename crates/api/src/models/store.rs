//! Store (tenant) types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use barestore_core::{StoreId, UserId};

/// A store. Soft-deleted stores are never returned by the repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: StoreId,
    pub owner_id: UserId,
    pub name: String,
    pub description: Option<String>,
    /// Shared invite code. Only surfaced to owners and managers.
    #[serde(skip)]
    pub invite_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStore {
    pub name: String,
    pub description: Option<String>,
}

/// Partial update of store settings. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}
