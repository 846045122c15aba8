//! Database access for the Barestore API.
//!
//! ## Tables
//!
//! - `users` - Identity records (soft delete via `deleted_at`)
//! - `verification_tokens` - Signup verification tokens (hash only)
//! - `sessions` - Refresh-token sessions bound to an IP address (hash only)
//! - `stores` - Tenants (soft delete via `deleted_at`)
//! - `members` - Store membership and invitations, unique per `(store_id, user_id)`
//! - `tower_sessions.session` - Short-lived OAuth handshake state
//!
//! Each concern is a trait so the services can run against [`PgStore`] in
//! production and against the in-memory store in tests. Operations that must
//! be atomic (session rotation, password set, store creation) are single
//! trait methods that own their transaction.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p barestore-cli -- migrate
//! ```

pub mod members;
pub mod sessions;
pub mod stores;
pub mod users;
pub mod verifications;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use barestore_core::{
    Email, MemberId, MemberRole, SessionId, StoreId, UserId, VerificationId,
};

use crate::models::{
    Member, NewSession, NewStore, NewUser, Session, Store, StoreMember, StoreMembership,
    StoreUpdate, User, UserAccount, VerificationToken,
};

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-constraint violation to [`RepositoryError::Conflict`].
pub(crate) fn conflict_on_unique(what: &str) -> impl FnOnce(sqlx::Error) -> RepositoryError + '_ {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict(format!("{what} already exists"));
        }
        RepositoryError::Database(e)
    }
}

/// Persistence for user identities.
#[allow(async_fn_in_trait)]
pub trait UserStore {
    /// Look up a live (not soft-deleted) user with credentials by email.
    async fn find_user_by_email(&self, email: &Email)
    -> Result<Option<UserAccount>, RepositoryError>;

    /// Look up a live user by id.
    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Insert a user. Fails with `Conflict` if the email is taken.
    async fn create_user(&self, new: NewUser) -> Result<User, RepositoryError>;

    /// Set the avatar only if the user has none.
    ///
    /// Returns `None` when an avatar was already present (nothing changed).
    async fn set_avatar_if_unset(
        &self,
        id: UserId,
        avatar: &str,
    ) -> Result<Option<User>, RepositoryError>;
}

/// Persistence for refresh-token sessions.
///
/// Every lookup is by `(user_id, token_hash)`; raw tokens never reach the store.
#[allow(async_fn_in_trait)]
pub trait SessionStore {
    async fn create_session(&self, new: NewSession) -> Result<Session, RepositoryError>;

    async fn find_session(
        &self,
        user_id: UserId,
        token_hash: &str,
    ) -> Result<Option<Session>, RepositoryError>;

    /// Returns `false` if no session had this id.
    async fn delete_session(&self, id: SessionId) -> Result<bool, RepositoryError>;

    /// Atomically swap the session matching `(user_id, token_hash)` for `replacement`.
    ///
    /// The matching session is locked, passed to `validate`, and only deleted
    /// (with `replacement` inserted) if validation succeeds. A rejected or
    /// failed rotation leaves the old session untouched. Of two concurrent
    /// calls for the same hash, at most one can see the session.
    ///
    /// Returns `Ok(None)` if no session matches.
    async fn rotate_session<F, E>(
        &self,
        user_id: UserId,
        token_hash: &str,
        replacement: NewSession,
        validate: F,
    ) -> Result<Option<Session>, E>
    where
        F: FnOnce(&Session) -> Result<(), E> + Send,
        E: From<RepositoryError> + Send;

    /// Delete sessions that expired before `now`. Returns the number removed.
    async fn prune_sessions(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError>;
}

/// Persistence for signup verification tokens.
#[allow(async_fn_in_trait)]
pub trait VerificationStore {
    async fn create_verification(
        &self,
        user_id: UserId,
        token_hash: &str,
    ) -> Result<VerificationToken, RepositoryError>;

    /// Most recently issued token for a user.
    async fn find_last_verification(
        &self,
        user_id: UserId,
    ) -> Result<Option<VerificationToken>, RepositoryError>;

    async fn find_verification(
        &self,
        token_hash: &str,
    ) -> Result<Option<VerificationToken>, RepositoryError>;

    async fn delete_verification(&self, id: VerificationId) -> Result<bool, RepositoryError>;

    /// Consume a token and activate its user in one transaction.
    ///
    /// Deletes the token, stores `password_hash`, marks the user `ACTIVE` and
    /// inserts `session`. Returns `None` (and changes nothing) if the token
    /// was already consumed.
    async fn redeem_verification(
        &self,
        id: VerificationId,
        password_hash: &str,
        session: NewSession,
    ) -> Result<Option<(User, Session)>, RepositoryError>;

    /// Delete tokens issued before `cutoff`. Returns the number removed.
    async fn prune_verifications(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError>;
}

/// Persistence for store membership rows.
///
/// Every read is scoped by `store_id` or by the acting `user_id`.
#[allow(async_fn_in_trait)]
pub trait MemberStore {
    async fn find_member(
        &self,
        store_id: StoreId,
        user_id: UserId,
    ) -> Result<Option<Member>, RepositoryError>;

    /// Find a member row by id, only if it belongs to `store_id`.
    async fn find_member_in_store(
        &self,
        store_id: StoreId,
        member_id: MemberId,
    ) -> Result<Option<Member>, RepositoryError>;

    /// All members of a store with their user details.
    async fn list_members(&self, store_id: StoreId) -> Result<Vec<StoreMember>, RepositoryError>;

    /// Pending invitations of a store.
    async fn list_store_invitations(
        &self,
        store_id: StoreId,
    ) -> Result<Vec<StoreMember>, RepositoryError>;

    /// Insert a `PENDING` member. Fails with `Conflict` if the pair exists.
    async fn create_invitation(
        &self,
        store_id: StoreId,
        user_id: UserId,
        role: MemberRole,
    ) -> Result<Member, RepositoryError>;

    /// Returns `false` if no row with this id exists in the store.
    async fn delete_member(
        &self,
        store_id: StoreId,
        member_id: MemberId,
    ) -> Result<bool, RepositoryError>;

    /// Move a `PENDING` row owned by `user_id` to `ACTIVE` or `INACTIVE`.
    ///
    /// Returns `None` if the row does not exist, belongs to someone else, or
    /// is no longer pending.
    async fn respond_to_invitation(
        &self,
        member_id: MemberId,
        user_id: UserId,
        accept: bool,
    ) -> Result<Option<Member>, RepositoryError>;

    /// Pending invitations addressed to a user, with their stores.
    async fn list_user_invitations(
        &self,
        user_id: UserId,
    ) -> Result<Vec<StoreMembership>, RepositoryError>;

    /// Stores where the user is an active member.
    async fn list_user_stores(
        &self,
        user_id: UserId,
    ) -> Result<Vec<StoreMembership>, RepositoryError>;

    async fn count_members(&self, store_id: StoreId) -> Result<i64, RepositoryError>;
}

/// Persistence for stores (tenants).
#[allow(async_fn_in_trait)]
pub trait TenantStore {
    /// Insert a store and its `OWNER`/`ACTIVE` member in one transaction.
    async fn create_store(
        &self,
        owner_id: UserId,
        new: &NewStore,
    ) -> Result<(Store, Member), RepositoryError>;

    async fn find_store(&self, id: StoreId) -> Result<Option<Store>, RepositoryError>;

    /// Fails with `NotFound` if the store does not exist or is deleted.
    async fn update_store(&self, id: StoreId, update: &StoreUpdate)
    -> Result<Store, RepositoryError>;

    /// Returns `false` if the store was already gone.
    async fn soft_delete_store(&self, id: StoreId) -> Result<bool, RepositoryError>;

    /// Replace the store's invite code.
    async fn set_invite_code(&self, id: StoreId, code: &str) -> Result<Store, RepositoryError>;

    /// Keep the existing invite code, or store `candidate` if there is none.
    ///
    /// Returns the code in effect afterwards.
    async fn ensure_invite_code(
        &self,
        id: StoreId,
        candidate: &str,
    ) -> Result<String, RepositoryError>;
}

/// Everything the auth service persists.
pub trait AuthStore: UserStore + SessionStore + VerificationStore {}

impl<T: UserStore + SessionStore + VerificationStore> AuthStore for T {}

/// Everything the membership service persists.
pub trait TenancyStore: UserStore + MemberStore + TenantStore {}

impl<T: UserStore + MemberStore + TenantStore> TenancyStore for T {}

/// `PostgreSQL` implementation of every store trait.
///
/// Cheap to clone (wraps the pool's `Arc`).
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
