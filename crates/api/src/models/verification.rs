//! Email verification tokens.

use chrono::{DateTime, Duration, Utc};

use barestore_core::{UserId, VerificationId};

/// A single-use signup verification token (hash only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationToken {
    pub id: VerificationId,
    pub user_id: UserId,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
}

impl VerificationToken {
    /// Time elapsed since the token was issued.
    #[must_use]
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }
}
