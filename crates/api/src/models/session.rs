//! Refresh-token sessions.

use std::net::IpAddr;

use chrono::{DateTime, Utc};

use barestore_core::{SessionId, UserId};

/// A persisted refresh-token grant.
///
/// `token_hash` is the hex SHA-256 of the refresh JWT; the raw token is
/// never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    /// Client address at issuance. Refresh is only honoured from this address.
    pub ip_address: IpAddr,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Returns true if the session has expired as of `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Fields for inserting a session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: UserId,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: IpAddr,
}
