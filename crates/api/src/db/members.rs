//! Store membership persistence.
//!
//! A `PENDING` member row is an invitation; accepting flips it to `ACTIVE`,
//! declining to `INACTIVE`. Rows in soft-deleted stores are invisible.

use chrono::{DateTime, Utc};

use barestore_core::{Email, MemberId, MemberRole, MemberStatus, StoreId, UserId};

use super::stores::StoreRow;
use super::{MemberStore, PgStore, RepositoryError, conflict_on_unique};
use crate::models::{Member, StoreMember, StoreMembership};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
pub(super) struct MemberRow {
    pub id: i32,
    pub store_id: i32,
    pub user_id: i32,
    pub role: MemberRole,
    pub status: MemberStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        Self {
            id: MemberId::new(row.id),
            store_id: StoreId::new(row.store_id),
            user_id: UserId::new(row.user_id),
            role: row.role,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StoreMemberRow {
    #[sqlx(flatten)]
    member: MemberRow,
    email: String,
    name: String,
}

impl TryFrom<StoreMemberRow> for StoreMember {
    type Error = RepositoryError;

    fn try_from(row: StoreMemberRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            member: row.member.into(),
            email,
            name: row.name,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MembershipRow {
    #[sqlx(flatten)]
    member: MemberRow,
    store_owner_id: i32,
    store_name: String,
    store_description: Option<String>,
    store_invite_code: Option<String>,
    store_created_at: DateTime<Utc>,
    store_updated_at: DateTime<Utc>,
}

impl From<MembershipRow> for StoreMembership {
    fn from(row: MembershipRow) -> Self {
        let store = StoreRow {
            id: row.member.store_id,
            owner_id: row.store_owner_id,
            name: row.store_name,
            description: row.store_description,
            invite_code: row.store_invite_code,
            created_at: row.store_created_at,
            updated_at: row.store_updated_at,
        };

        Self {
            member: row.member.into(),
            store: store.into(),
        }
    }
}

pub(super) const MEMBER_COLUMNS: &str =
    "id, store_id, user_id, role, status, created_at, updated_at";

const JOINED_MEMBER_COLUMNS: &str =
    "m.id, m.store_id, m.user_id, m.role, m.status, m.created_at, m.updated_at";

const JOINED_STORE_COLUMNS: &str = "s.owner_id AS store_owner_id, s.name AS store_name, \
     s.description AS store_description, s.invite_code AS store_invite_code, \
     s.created_at AS store_created_at, s.updated_at AS store_updated_at";

// =============================================================================
// Repository
// =============================================================================

impl PgStore {
    async fn list_store_members_with_status(
        &self,
        store_id: StoreId,
        status: Option<MemberStatus>,
    ) -> Result<Vec<StoreMember>, RepositoryError> {
        let rows = sqlx::query_as::<_, StoreMemberRow>(&format!(
            "SELECT {JOINED_MEMBER_COLUMNS}, u.email, u.name \
             FROM members m \
             JOIN users u ON u.id = m.user_id AND u.deleted_at IS NULL \
             WHERE m.store_id = $1 AND ($2::member_status IS NULL OR m.status = $2) \
             ORDER BY m.created_at, m.id"
        ))
        .bind(store_id.as_i32())
        .bind(status)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_user_memberships_with_status(
        &self,
        user_id: UserId,
        status: MemberStatus,
    ) -> Result<Vec<StoreMembership>, RepositoryError> {
        let rows = sqlx::query_as::<_, MembershipRow>(&format!(
            "SELECT {JOINED_MEMBER_COLUMNS}, {JOINED_STORE_COLUMNS} \
             FROM members m \
             JOIN stores s ON s.id = m.store_id AND s.deleted_at IS NULL \
             WHERE m.user_id = $1 AND m.status = $2 \
             ORDER BY m.created_at DESC, m.id DESC"
        ))
        .bind(user_id.as_i32())
        .bind(status)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

impl MemberStore for PgStore {
    async fn find_member(
        &self,
        store_id: StoreId,
        user_id: UserId,
    ) -> Result<Option<Member>, RepositoryError> {
        let row = sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {JOINED_MEMBER_COLUMNS} \
             FROM members m \
             JOIN stores s ON s.id = m.store_id AND s.deleted_at IS NULL \
             WHERE m.store_id = $1 AND m.user_id = $2"
        ))
        .bind(store_id.as_i32())
        .bind(user_id.as_i32())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_member_in_store(
        &self,
        store_id: StoreId,
        member_id: MemberId,
    ) -> Result<Option<Member>, RepositoryError> {
        let row = sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE store_id = $1 AND id = $2"
        ))
        .bind(store_id.as_i32())
        .bind(member_id.as_i32())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_members(&self, store_id: StoreId) -> Result<Vec<StoreMember>, RepositoryError> {
        self.list_store_members_with_status(store_id, None).await
    }

    async fn list_store_invitations(
        &self,
        store_id: StoreId,
    ) -> Result<Vec<StoreMember>, RepositoryError> {
        self.list_store_members_with_status(store_id, Some(MemberStatus::Pending))
            .await
    }

    async fn create_invitation(
        &self,
        store_id: StoreId,
        user_id: UserId,
        role: MemberRole,
    ) -> Result<Member, RepositoryError> {
        let row = sqlx::query_as::<_, MemberRow>(&format!(
            "INSERT INTO members (store_id, user_id, role, status) VALUES ($1, $2, $3, $4) \
             RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(store_id.as_i32())
        .bind(user_id.as_i32())
        .bind(role)
        .bind(MemberStatus::Pending)
        .fetch_one(self.pool())
        .await
        .map_err(conflict_on_unique("member"))?;

        Ok(row.into())
    }

    async fn delete_member(
        &self,
        store_id: StoreId,
        member_id: MemberId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM members WHERE store_id = $1 AND id = $2")
            .bind(store_id.as_i32())
            .bind(member_id.as_i32())
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn respond_to_invitation(
        &self,
        member_id: MemberId,
        user_id: UserId,
        accept: bool,
    ) -> Result<Option<Member>, RepositoryError> {
        let status = if accept {
            MemberStatus::Active
        } else {
            MemberStatus::Inactive
        };

        let row = sqlx::query_as::<_, MemberRow>(&format!(
            "UPDATE members m SET status = $3, updated_at = NOW() \
             FROM stores s \
             WHERE m.id = $1 AND m.user_id = $2 AND m.status = $4 \
               AND s.id = m.store_id AND s.deleted_at IS NULL \
             RETURNING {JOINED_MEMBER_COLUMNS}"
        ))
        .bind(member_id.as_i32())
        .bind(user_id.as_i32())
        .bind(status)
        .bind(MemberStatus::Pending)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_user_invitations(
        &self,
        user_id: UserId,
    ) -> Result<Vec<StoreMembership>, RepositoryError> {
        self.list_user_memberships_with_status(user_id, MemberStatus::Pending)
            .await
    }

    async fn list_user_stores(
        &self,
        user_id: UserId,
    ) -> Result<Vec<StoreMembership>, RepositoryError> {
        self.list_user_memberships_with_status(user_id, MemberStatus::Active)
            .await
    }

    async fn count_members(&self, store_id: StoreId) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM members WHERE store_id = $1 AND status = $2",
        )
        .bind(store_id.as_i32())
        .bind(MemberStatus::Active)
        .fetch_one(self.pool())
        .await?;

        Ok(count)
    }
}
