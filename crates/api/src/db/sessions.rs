//! Refresh-token session persistence.

use std::net::IpAddr;

use chrono::{DateTime, Utc};

use barestore_core::{SessionId, UserId};

use super::{PgStore, RepositoryError, SessionStore};
use crate::models::{NewSession, Session};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
pub(super) struct SessionRow {
    pub id: i32,
    pub user_id: i32,
    pub refresh_token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = RepositoryError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let ip_address: IpAddr = row.ip_address.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid session ip address: {e}"))
        })?;

        Ok(Self {
            id: SessionId::new(row.id),
            user_id: UserId::new(row.user_id),
            token_hash: row.refresh_token_hash,
            expires_at: row.expires_at,
            ip_address,
            created_at: row.created_at,
        })
    }
}

const SESSION_COLUMNS: &str =
    "id, user_id, refresh_token_hash, expires_at, ip_address, created_at";

/// Insert a session on any executor (pool or open transaction).
pub(super) async fn insert_session<'e, X>(
    executor: X,
    new: &NewSession,
) -> Result<Session, RepositoryError>
where
    X: sqlx::PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, SessionRow>(&format!(
        "INSERT INTO sessions (user_id, refresh_token_hash, expires_at, ip_address) \
         VALUES ($1, $2, $3, $4) \
         RETURNING {SESSION_COLUMNS}"
    ))
    .bind(new.user_id.as_i32())
    .bind(&new.token_hash)
    .bind(new.expires_at)
    .bind(new.ip_address.to_string())
    .fetch_one(executor)
    .await?;

    row.try_into()
}

// =============================================================================
// Repository
// =============================================================================

impl SessionStore for PgStore {
    async fn create_session(&self, new: NewSession) -> Result<Session, RepositoryError> {
        insert_session(self.pool(), &new).await
    }

    async fn find_session(
        &self,
        user_id: UserId,
        token_hash: &str,
    ) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE user_id = $1 AND refresh_token_hash = $2"
        ))
        .bind(user_id.as_i32())
        .bind(token_hash)
        .fetch_optional(self.pool())
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn delete_session(&self, id: SessionId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn rotate_session<F, E>(
        &self,
        user_id: UserId,
        token_hash: &str,
        replacement: NewSession,
        validate: F,
    ) -> Result<Option<Session>, E>
    where
        F: FnOnce(&Session) -> Result<(), E> + Send,
        E: From<RepositoryError> + Send,
    {
        let mut tx = self.pool().begin().await.map_err(RepositoryError::from)?;

        // Row lock: a concurrent rotation of the same token blocks here and
        // then finds nothing once this transaction commits.
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE user_id = $1 AND refresh_token_hash = $2 \
             FOR UPDATE"
        ))
        .bind(user_id.as_i32())
        .bind(token_hash)
        .fetch_optional(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let current = Session::try_from(row)?;

        validate(&current)?;

        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(current.id.as_i32())
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

        let session = insert_session(&mut *tx, &replacement).await?;

        tx.commit().await.map_err(RepositoryError::from)?;

        Ok(Some(session))
    }

    async fn prune_sessions(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }
}
