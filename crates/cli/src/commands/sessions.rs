//! Session and verification-token maintenance.
//!
//! Neither table is cleaned up on the request path. Run this from a
//! scheduled job.

use chrono::{Duration, Utc};

use barestore_api::db::{PgStore, SessionStore, VerificationStore};

use super::{CommandError, connect};

/// Default age after which verification tokens are pruned.
pub const DEFAULT_VERIFICATION_MAX_AGE_HOURS: i64 = 24;

/// Delete expired sessions and verification tokens older than `max_age_hours`.
///
/// # Errors
///
/// Returns an error if `max_age_hours` is not positive or a query fails.
pub async fn prune(max_age_hours: i64) -> Result<(), CommandError> {
    if max_age_hours <= 0 {
        return Err(CommandError::InvalidArgument(format!(
            "verification max age must be positive, got {max_age_hours}"
        )));
    }

    let store = PgStore::new(connect().await?);
    let now = Utc::now();

    let sessions = store.prune_sessions(now).await?;
    let tokens = store
        .prune_verifications(now - Duration::hours(max_age_hours))
        .await?;

    tracing::info!(
        sessions,
        verification_tokens = tokens,
        "Pruned expired sessions and verification tokens"
    );
    Ok(())
}
