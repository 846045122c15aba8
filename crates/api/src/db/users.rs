//! User persistence.

use chrono::{DateTime, Utc};

use barestore_core::{Email, UserId, UserRole, UserStatus};

use super::{PgStore, RepositoryError, UserStore, conflict_on_unique};
use crate::models::{NewUser, User, UserAccount};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
pub(super) struct UserRow {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
    pub status: UserStatus,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            email,
            name: row.name,
            avatar: row.avatar,
            status: row.status,
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserAccountRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: Option<String>,
}

impl TryFrom<UserAccountRow> for UserAccount {
    type Error = RepositoryError;

    fn try_from(row: UserAccountRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user: row.user.try_into()?,
            password_hash: row.password_hash,
        })
    }
}

pub(super) const USER_COLUMNS: &str =
    "id, email, name, avatar, status, role, created_at, updated_at";

// =============================================================================
// Repository
// =============================================================================

impl UserStore for PgStore {
    async fn find_user_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<UserAccount>, RepositoryError> {
        let row = sqlx::query_as::<_, UserAccountRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users \
             WHERE email = $1 AND deleted_at IS NULL"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool())
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool())
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn create_user(&self, new: NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (email, name, avatar, status) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(new.email.as_str())
        .bind(&new.name)
        .bind(new.avatar.as_deref())
        .bind(new.status)
        .fetch_one(self.pool())
        .await
        .map_err(conflict_on_unique("email"))?;

        row.try_into()
    }

    async fn set_avatar_if_unset(
        &self,
        id: UserId,
        avatar: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET avatar = $2, updated_at = NOW() \
             WHERE id = $1 AND avatar IS NULL AND deleted_at IS NULL \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id.as_i32())
        .bind(avatar)
        .fetch_optional(self.pool())
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}
