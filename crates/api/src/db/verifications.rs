//! Signup verification token persistence.

use chrono::{DateTime, Utc};

use barestore_core::{UserId, UserStatus, VerificationId};

use super::sessions::insert_session;
use super::users::{USER_COLUMNS, UserRow};
use super::{PgStore, RepositoryError, VerificationStore};
use crate::models::{NewSession, Session, User, VerificationToken};

#[derive(Debug, sqlx::FromRow)]
struct VerificationRow {
    id: i32,
    user_id: i32,
    token_hash: String,
    created_at: DateTime<Utc>,
}

impl From<VerificationRow> for VerificationToken {
    fn from(row: VerificationRow) -> Self {
        Self {
            id: VerificationId::new(row.id),
            user_id: UserId::new(row.user_id),
            token_hash: row.token_hash,
            created_at: row.created_at,
        }
    }
}

impl VerificationStore for PgStore {
    async fn create_verification(
        &self,
        user_id: UserId,
        token_hash: &str,
    ) -> Result<VerificationToken, RepositoryError> {
        let row = sqlx::query_as::<_, VerificationRow>(
            "INSERT INTO verification_tokens (user_id, token_hash) VALUES ($1, $2) \
             RETURNING id, user_id, token_hash, created_at",
        )
        .bind(user_id.as_i32())
        .bind(token_hash)
        .fetch_one(self.pool())
        .await?;

        Ok(row.into())
    }

    async fn find_last_verification(
        &self,
        user_id: UserId,
    ) -> Result<Option<VerificationToken>, RepositoryError> {
        let row = sqlx::query_as::<_, VerificationRow>(
            "SELECT id, user_id, token_hash, created_at FROM verification_tokens \
             WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT 1",
        )
        .bind(user_id.as_i32())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_verification(
        &self,
        token_hash: &str,
    ) -> Result<Option<VerificationToken>, RepositoryError> {
        let row = sqlx::query_as::<_, VerificationRow>(
            "SELECT id, user_id, token_hash, created_at FROM verification_tokens \
             WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn delete_verification(&self, id: VerificationId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM verification_tokens WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn redeem_verification(
        &self,
        id: VerificationId,
        password_hash: &str,
        session: NewSession,
    ) -> Result<Option<(User, Session)>, RepositoryError> {
        let mut tx = self.pool().begin().await?;

        // Deleting first makes the token single-use: a concurrent redeem
        // waits on the row lock and then deletes nothing.
        let consumed = sqlx::query_as::<_, (i32,)>(
            "DELETE FROM verification_tokens WHERE id = $1 RETURNING user_id",
        )
        .bind(id.as_i32())
        .fetch_optional(&mut *tx)
        .await?;

        let Some((user_id,)) = consumed else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET password_hash = $2, status = $3, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(password_hash)
        .bind(UserStatus::Active)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let user = User::try_from(row)?;

        let session = insert_session(&mut *tx, &session).await?;

        tx.commit().await?;

        Ok(Some((user, session)))
    }

    async fn prune_verifications(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM verification_tokens WHERE created_at < $1")
            .bind(cutoff)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }
}
