//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use barestore_core::{Email, UserId, UserRole, UserStatus};

/// A user as exposed to clients.
///
/// Never carries the password hash or the soft-delete marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub avatar: Option<String>,
    pub status: UserStatus,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user together with its credential material.
///
/// Only the auth service sees this type.
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub user: User,
    /// Argon2 PHC string. `None` until the signup flow sets a password.
    pub password_hash: Option<String>,
}

/// Fields for inserting a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub name: String,
    pub avatar: Option<String>,
    pub status: UserStatus,
}
