//! Store (tenant) persistence.

use chrono::{DateTime, Utc};

use barestore_core::{MemberRole, MemberStatus, StoreId, UserId};

use super::members::{MEMBER_COLUMNS, MemberRow};
use super::{PgStore, RepositoryError, TenantStore, conflict_on_unique};
use crate::models::{Member, NewStore, Store, StoreUpdate};

#[derive(Debug, sqlx::FromRow)]
pub(super) struct StoreRow {
    pub id: i32,
    pub owner_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub invite_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StoreRow> for Store {
    fn from(row: StoreRow) -> Self {
        Self {
            id: StoreId::new(row.id),
            owner_id: UserId::new(row.owner_id),
            name: row.name,
            description: row.description,
            invite_code: row.invite_code,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const STORE_COLUMNS: &str =
    "id, owner_id, name, description, invite_code, created_at, updated_at";

impl TenantStore for PgStore {
    async fn create_store(
        &self,
        owner_id: UserId,
        new: &NewStore,
    ) -> Result<(Store, Member), RepositoryError> {
        let mut tx = self.pool().begin().await?;

        let store: Store = sqlx::query_as::<_, StoreRow>(&format!(
            "INSERT INTO stores (owner_id, name, description) VALUES ($1, $2, $3) \
             RETURNING {STORE_COLUMNS}"
        ))
        .bind(owner_id.as_i32())
        .bind(&new.name)
        .bind(new.description.as_deref())
        .fetch_one(&mut *tx)
        .await?
        .into();

        let owner: Member = sqlx::query_as::<_, MemberRow>(&format!(
            "INSERT INTO members (store_id, user_id, role, status) VALUES ($1, $2, $3, $4) \
             RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(store.id.as_i32())
        .bind(owner_id.as_i32())
        .bind(MemberRole::Owner)
        .bind(MemberStatus::Active)
        .fetch_one(&mut *tx)
        .await?
        .into();

        tx.commit().await?;

        Ok((store, owner))
    }

    async fn find_store(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM stores WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn update_store(
        &self,
        id: StoreId,
        update: &StoreUpdate,
    ) -> Result<Store, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "UPDATE stores SET \
                 name = COALESCE($2, name), \
                 description = COALESCE($3, description), \
                 updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {STORE_COLUMNS}"
        ))
        .bind(id.as_i32())
        .bind(update.name.as_deref())
        .bind(update.description.as_deref())
        .fetch_optional(self.pool())
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    async fn soft_delete_store(&self, id: StoreId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE stores SET deleted_at = NOW(), invite_code = NULL \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id.as_i32())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_invite_code(&self, id: StoreId, code: &str) -> Result<Store, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "UPDATE stores SET invite_code = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {STORE_COLUMNS}"
        ))
        .bind(id.as_i32())
        .bind(code)
        .fetch_optional(self.pool())
        .await
        .map_err(conflict_on_unique("invite code"))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    async fn ensure_invite_code(
        &self,
        id: StoreId,
        candidate: &str,
    ) -> Result<String, RepositoryError> {
        let code = sqlx::query_scalar::<_, Option<String>>(
            "UPDATE stores SET invite_code = COALESCE(invite_code, $2) \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING invite_code",
        )
        .bind(id.as_i32())
        .bind(candidate)
        .fetch_optional(self.pool())
        .await
        .map_err(conflict_on_unique("invite code"))?
        .flatten()
        .ok_or(RepositoryError::NotFound)?;

        Ok(code)
    }
}
