//! In-memory implementation of the store traits for tests.
//!
//! A single mutex guards all tables, so every trait method is atomic the
//! same way the `PostgreSQL` transactions are.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use barestore_core::{
    Email, MemberId, MemberRole, MemberStatus, SessionId, StoreId, UserId, UserStatus,
    VerificationId,
};

use super::{
    MemberStore, RepositoryError, SessionStore, TenantStore, UserStore, VerificationStore,
};
use crate::models::{
    Member, NewSession, NewStore, NewUser, Session, Store, StoreMember, StoreMembership,
    StoreUpdate, User, UserAccount, VerificationToken,
};

#[derive(Debug, Default)]
struct Tables {
    next_id: i32,
    users: BTreeMap<UserId, UserAccount>,
    sessions: BTreeMap<SessionId, Session>,
    verifications: BTreeMap<VerificationId, VerificationToken>,
    stores: BTreeMap<StoreId, (Store, Option<DateTime<Utc>>)>,
    members: BTreeMap<MemberId, Member>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn live_store(&self, id: StoreId) -> Option<&Store> {
        self.stores
            .get(&id)
            .filter(|(_, deleted_at)| deleted_at.is_none())
            .map(|(store, _)| store)
    }

    fn insert_session(&mut self, new: NewSession) -> Session {
        let session = Session {
            id: SessionId::new(self.next_id()),
            user_id: new.user_id,
            token_hash: new.token_hash,
            expires_at: new.expires_at,
            ip_address: new.ip_address,
            created_at: Utc::now(),
        };
        self.sessions.insert(session.id, session.clone());
        session
    }

    fn store_member(&self, member: &Member) -> Option<StoreMember> {
        self.users.get(&member.user_id).map(|account| StoreMember {
            member: member.clone(),
            email: account.user.email.clone(),
            name: account.user.name.clone(),
        })
    }

    fn memberships(&self, user_id: UserId, status: MemberStatus) -> Vec<StoreMembership> {
        let mut rows: Vec<StoreMembership> = self
            .members
            .values()
            .filter(|m| m.user_id == user_id && m.status == status)
            .filter_map(|m| {
                self.live_store(m.store_id).map(|store| StoreMembership {
                    member: m.clone(),
                    store: store.clone(),
                })
            })
            .collect();
        rows.reverse();
        rows
    }
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every persisted session.
    pub async fn sessions(&self) -> Vec<Session> {
        self.tables.lock().await.sessions.values().cloned().collect()
    }

    /// Snapshot of every persisted verification token.
    pub async fn verifications(&self) -> Vec<VerificationToken> {
        self.tables
            .lock()
            .await
            .verifications
            .values()
            .cloned()
            .collect()
    }

    /// Stored password hash for a user, if any.
    pub async fn password_hash(&self, id: UserId) -> Option<String> {
        self.tables
            .lock()
            .await
            .users
            .get(&id)
            .and_then(|account| account.password_hash.clone())
    }

    /// Store a password hash without touching the user's status.
    ///
    /// Returns `false` if the user does not exist.
    pub async fn set_password_hash(&self, id: UserId, hash: &str) -> bool {
        let mut tables = self.tables.lock().await;
        let Some(account) = tables.users.get_mut(&id) else {
            return false;
        };
        account.password_hash = Some(hash.to_owned());
        true
    }

    /// Shift the creation time of a user's verification tokens into the past.
    pub async fn age_verifications(&self, user_id: UserId, by: Duration) {
        let mut tables = self.tables.lock().await;
        for token in tables.verifications.values_mut() {
            if token.user_id == user_id {
                token.created_at -= by;
            }
        }
    }
}

impl UserStore for MemoryStore {
    async fn find_user_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<UserAccount>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|account| &account.user.email == email)
            .cloned())
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.get(&id).map(|account| account.user.clone()))
    }

    async fn create_user(&self, new: NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|a| a.user.email == new.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let now = Utc::now();
        let user = User {
            id: UserId::new(tables.next_id()),
            email: new.email,
            name: new.name,
            avatar: new.avatar,
            status: new.status,
            role: barestore_core::UserRole::default(),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(
            user.id,
            UserAccount {
                user: user.clone(),
                password_hash: None,
            },
        );
        Ok(user)
    }

    async fn set_avatar_if_unset(
        &self,
        id: UserId,
        avatar: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let Some(account) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        if account.user.avatar.is_some() {
            return Ok(None);
        }
        account.user.avatar = Some(avatar.to_owned());
        account.user.updated_at = Utc::now();
        Ok(Some(account.user.clone()))
    }
}

impl SessionStore for MemoryStore {
    async fn create_session(&self, new: NewSession) -> Result<Session, RepositoryError> {
        Ok(self.tables.lock().await.insert_session(new))
    }

    async fn find_session(
        &self,
        user_id: UserId,
        token_hash: &str,
    ) -> Result<Option<Session>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .values()
            .find(|s| s.user_id == user_id && s.token_hash == token_hash)
            .cloned())
    }

    async fn delete_session(&self, id: SessionId) -> Result<bool, RepositoryError> {
        Ok(self.tables.lock().await.sessions.remove(&id).is_some())
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
        let mut tables = self.tables.lock().await;
        let Some(current) = tables
            .sessions
            .values()
            .find(|s| s.user_id == user_id && s.token_hash == token_hash)
            .cloned()
        else {
            return Ok(None);
        };

        validate(&current)?;

        tables.sessions.remove(&current.id);
        Ok(Some(tables.insert_session(replacement)))
    }

    async fn prune_sessions(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| !s.is_expired_at(now));
        Ok((before - tables.sessions.len()) as u64)
    }
}

impl VerificationStore for MemoryStore {
    async fn create_verification(
        &self,
        user_id: UserId,
        token_hash: &str,
    ) -> Result<VerificationToken, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let token = VerificationToken {
            id: VerificationId::new(tables.next_id()),
            user_id,
            token_hash: token_hash.to_owned(),
            created_at: Utc::now(),
        };
        tables.verifications.insert(token.id, token.clone());
        Ok(token)
    }

    async fn find_last_verification(
        &self,
        user_id: UserId,
    ) -> Result<Option<VerificationToken>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .verifications
            .values()
            .filter(|t| t.user_id == user_id)
            .max_by_key(|t| (t.created_at, t.id))
            .cloned())
    }

    async fn find_verification(
        &self,
        token_hash: &str,
    ) -> Result<Option<VerificationToken>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .verifications
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn delete_verification(&self, id: VerificationId) -> Result<bool, RepositoryError> {
        Ok(self.tables.lock().await.verifications.remove(&id).is_some())
    }

    async fn redeem_verification(
        &self,
        id: VerificationId,
        password_hash: &str,
        session: NewSession,
    ) -> Result<Option<(User, Session)>, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let Some(token) = tables.verifications.get(&id).cloned() else {
            return Ok(None);
        };
        let Some(account) = tables.users.get_mut(&token.user_id) else {
            return Ok(None);
        };

        account.password_hash = Some(password_hash.to_owned());
        account.user.status = UserStatus::Active;
        account.user.updated_at = Utc::now();
        let user = account.user.clone();

        tables.verifications.remove(&id);
        let session = tables.insert_session(session);
        Ok(Some((user, session)))
    }

    async fn prune_verifications(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let before = tables.verifications.len();
        tables.verifications.retain(|_, t| t.created_at >= cutoff);
        Ok((before - tables.verifications.len()) as u64)
    }
}

impl MemberStore for MemoryStore {
    async fn find_member(
        &self,
        store_id: StoreId,
        user_id: UserId,
    ) -> Result<Option<Member>, RepositoryError> {
        let tables = self.tables.lock().await;
        if tables.live_store(store_id).is_none() {
            return Ok(None);
        }
        Ok(tables
            .members
            .values()
            .find(|m| m.store_id == store_id && m.user_id == user_id)
            .cloned())
    }

    async fn find_member_in_store(
        &self,
        store_id: StoreId,
        member_id: MemberId,
    ) -> Result<Option<Member>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .members
            .get(&member_id)
            .filter(|m| m.store_id == store_id)
            .cloned())
    }

    async fn list_members(&self, store_id: StoreId) -> Result<Vec<StoreMember>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .members
            .values()
            .filter(|m| m.store_id == store_id)
            .filter_map(|m| tables.store_member(m))
            .collect())
    }

    async fn list_store_invitations(
        &self,
        store_id: StoreId,
    ) -> Result<Vec<StoreMember>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .members
            .values()
            .filter(|m| m.store_id == store_id && m.status == MemberStatus::Pending)
            .filter_map(|m| tables.store_member(m))
            .collect())
    }

    async fn create_invitation(
        &self,
        store_id: StoreId,
        user_id: UserId,
        role: MemberRole,
    ) -> Result<Member, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if tables
            .members
            .values()
            .any(|m| m.store_id == store_id && m.user_id == user_id)
        {
            return Err(RepositoryError::Conflict("member already exists".to_owned()));
        }

        let now = Utc::now();
        let member = Member {
            id: MemberId::new(tables.next_id()),
            store_id,
            user_id,
            role,
            status: MemberStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        tables.members.insert(member.id, member.clone());
        Ok(member)
    }

    async fn delete_member(
        &self,
        store_id: StoreId,
        member_id: MemberId,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if tables
            .members
            .get(&member_id)
            .is_some_and(|m| m.store_id == store_id)
        {
            tables.members.remove(&member_id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn respond_to_invitation(
        &self,
        member_id: MemberId,
        user_id: UserId,
        accept: bool,
    ) -> Result<Option<Member>, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let Some(store_id) = tables
            .members
            .get(&member_id)
            .filter(|m| m.user_id == user_id && m.status == MemberStatus::Pending)
            .map(|m| m.store_id)
        else {
            return Ok(None);
        };
        if tables.live_store(store_id).is_none() {
            return Ok(None);
        }

        let Some(member) = tables.members.get_mut(&member_id) else {
            return Ok(None);
        };
        member.status = if accept {
            MemberStatus::Active
        } else {
            MemberStatus::Inactive
        };
        member.updated_at = Utc::now();
        Ok(Some(member.clone()))
    }

    async fn list_user_invitations(
        &self,
        user_id: UserId,
    ) -> Result<Vec<StoreMembership>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .await
            .memberships(user_id, MemberStatus::Pending))
    }

    async fn list_user_stores(
        &self,
        user_id: UserId,
    ) -> Result<Vec<StoreMembership>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .await
            .memberships(user_id, MemberStatus::Active))
    }

    async fn count_members(&self, store_id: StoreId) -> Result<i64, RepositoryError> {
        let tables = self.tables.lock().await;
        let count = tables
            .members
            .values()
            .filter(|m| m.store_id == store_id && m.is_active())
            .count();
        i64::try_from(count).map_err(|e| RepositoryError::DataCorruption(e.to_string()))
    }
}

impl TenantStore for MemoryStore {
    async fn create_store(
        &self,
        owner_id: UserId,
        new: &NewStore,
    ) -> Result<(Store, Member), RepositoryError> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let store = Store {
            id: StoreId::new(tables.next_id()),
            owner_id,
            name: new.name.clone(),
            description: new.description.clone(),
            invite_code: None,
            created_at: now,
            updated_at: now,
        };
        let owner = Member {
            id: MemberId::new(tables.next_id()),
            store_id: store.id,
            user_id: owner_id,
            role: MemberRole::Owner,
            status: MemberStatus::Active,
            created_at: now,
            updated_at: now,
        };
        tables.stores.insert(store.id, (store.clone(), None));
        tables.members.insert(owner.id, owner.clone());
        Ok((store, owner))
    }

    async fn find_store(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        Ok(self.tables.lock().await.live_store(id).cloned())
    }

    async fn update_store(
        &self,
        id: StoreId,
        update: &StoreUpdate,
    ) -> Result<Store, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let Some((store, None)) = tables.stores.get_mut(&id) else {
            return Err(RepositoryError::NotFound);
        };
        if let Some(name) = &update.name {
            store.name.clone_from(name);
        }
        if let Some(description) = &update.description {
            store.description = Some(description.clone());
        }
        store.updated_at = Utc::now();
        Ok(store.clone())
    }

    async fn soft_delete_store(&self, id: StoreId) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let Some((store, deleted_at @ None)) = tables.stores.get_mut(&id) else {
            return Ok(false);
        };
        store.invite_code = None;
        *deleted_at = Some(Utc::now());
        Ok(true)
    }

    async fn set_invite_code(&self, id: StoreId, code: &str) -> Result<Store, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if tables
            .stores
            .values()
            .any(|(s, _)| s.id != id && s.invite_code.as_deref() == Some(code))
        {
            return Err(RepositoryError::Conflict("invite code already exists".to_owned()));
        }
        let Some((store, None)) = tables.stores.get_mut(&id) else {
            return Err(RepositoryError::NotFound);
        };
        store.invite_code = Some(code.to_owned());
        store.updated_at = Utc::now();
        Ok(store.clone())
    }

    async fn ensure_invite_code(
        &self,
        id: StoreId,
        candidate: &str,
    ) -> Result<String, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let Some((store, None)) = tables.stores.get_mut(&id) else {
            return Err(RepositoryError::NotFound);
        };
        Ok(store
            .invite_code
            .get_or_insert_with(|| candidate.to_owned())
            .clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    async fn seed_user(store: &MemoryStore, address: &str) -> User {
        store
            .create_user(NewUser {
                email: email(address),
                name: "Test".to_owned(),
                avatar: None,
                status: UserStatus::Pending,
            })
            .await
            .unwrap()
    }

    fn new_session(user_id: UserId, hash: &str) -> NewSession {
        NewSession {
            user_id,
            token_hash: hash.to_owned(),
            expires_at: Utc::now() + Duration::days(7),
            ip_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        }
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicate_email() {
        let store = MemoryStore::new();
        seed_user(&store, "a@example.com").await;

        let err = store
            .create_user(NewUser {
                email: email("A@Example.com"),
                name: "Other".to_owned(),
                avatar: None,
                status: UserStatus::Active,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_rotate_rejected_keeps_session() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "a@example.com").await;
        store.create_session(new_session(user.id, "old")).await.unwrap();

        let result: Result<Option<Session>, RepositoryError> = store
            .rotate_session(user.id, "old", new_session(user.id, "new"), |_| {
                Err(RepositoryError::NotFound)
            })
            .await;
        assert!(result.is_err());

        let sessions = store.sessions().await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].token_hash, "old");
    }

    #[tokio::test]
    async fn test_rotate_replaces_session_once() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "a@example.com").await;
        store.create_session(new_session(user.id, "old")).await.unwrap();

        let first: Result<_, RepositoryError> = store
            .rotate_session(user.id, "old", new_session(user.id, "new"), |_| Ok(()))
            .await;
        assert_eq!(first.unwrap().unwrap().token_hash, "new");

        let second: Result<_, RepositoryError> = store
            .rotate_session(user.id, "old", new_session(user.id, "newer"), |_| Ok(()))
            .await;
        assert!(second.unwrap().is_none());
        assert_eq!(store.sessions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_redeem_is_single_use() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "a@example.com").await;
        let token = store.create_verification(user.id, "hash").await.unwrap();

        let (redeemed, _) = store
            .redeem_verification(token.id, "pw-hash", new_session(user.id, "s1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(redeemed.status, UserStatus::Active);
        assert_eq!(store.password_hash(user.id).await.as_deref(), Some("pw-hash"));

        let again = store
            .redeem_verification(token.id, "pw-hash-2", new_session(user.id, "s2"))
            .await
            .unwrap();
        assert!(again.is_none());
        assert_eq!(store.sessions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_find_last_verification_picks_newest() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "a@example.com").await;
        store.create_verification(user.id, "first").await.unwrap();
        store.age_verifications(user.id, Duration::seconds(30)).await;
        store.create_verification(user.id, "second").await.unwrap();

        let last = store.find_last_verification(user.id).await.unwrap().unwrap();
        assert_eq!(last.token_hash, "second");
    }

    #[tokio::test]
    async fn test_soft_deleted_store_hides_members() {
        let store = MemoryStore::new();
        let owner = seed_user(&store, "owner@example.com").await;
        let (created, _) = store
            .create_store(
                owner.id,
                &NewStore {
                    name: "Shop".to_owned(),
                    description: None,
                },
            )
            .await
            .unwrap();

        assert!(store.find_member(created.id, owner.id).await.unwrap().is_some());
        assert!(store.soft_delete_store(created.id).await.unwrap());
        assert!(!store.soft_delete_store(created.id).await.unwrap());
        assert!(store.find_member(created.id, owner.id).await.unwrap().is_none());
        assert!(store.list_user_stores(owner.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_invite_code_keeps_existing() {
        let store = MemoryStore::new();
        let owner = seed_user(&store, "owner@example.com").await;
        let (created, _) = store
            .create_store(
                owner.id,
                &NewStore {
                    name: "Shop".to_owned(),
                    description: None,
                },
            )
            .await
            .unwrap();

        let first = store.ensure_invite_code(created.id, "abc").await.unwrap();
        let second = store.ensure_invite_code(created.id, "xyz").await.unwrap();
        assert_eq!(first, "abc");
        assert_eq!(second, "abc");
    }
}
