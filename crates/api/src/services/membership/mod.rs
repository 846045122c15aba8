//! Store membership and tenant authorization.
//!
//! Every tenant-scoped operation resolves the caller's member row for the
//! addressed store first. Lookups are always keyed by both store and user,
//! so a member of one store learns nothing about another.

mod error;

pub use error::MembershipError;

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Serialize;

use barestore_core::{MemberId, MemberRole, StoreId, UserId};

use crate::db::{RepositoryError, TenancyStore};
use crate::models::{Member, NewStore, Store, StoreMember, StoreMembership, StoreUpdate};
use crate::services::email::Mailer;

/// Length of generated store invite codes.
const INVITE_CODE_LENGTH: usize = 10;

/// A store as seen by one of its members.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreOverview {
    #[serde(flatten)]
    pub store: Store,
    pub member_count: i64,
    /// The caller's role in this store.
    pub role: MemberRole,
}

/// Membership service.
pub struct MembershipService<'a, S, M> {
    store: &'a S,
    mailer: &'a M,
}

impl<'a, S, M> MembershipService<'a, S, M>
where
    S: TenancyStore,
    M: Mailer,
{
    #[must_use]
    pub const fn new(store: &'a S, mailer: &'a M) -> Self {
        Self { store, mailer }
    }

    // =========================================================================
    // Authorization
    // =========================================================================

    /// The user's member row in the store, in any status.
    ///
    /// # Errors
    ///
    /// Returns `MembershipError::Repository` if the lookup fails.
    pub async fn resolve(
        &self,
        store_id: StoreId,
        user_id: UserId,
    ) -> Result<Option<Member>, MembershipError> {
        Ok(self.store.find_member(store_id, user_id).await?)
    }

    /// The user's active member row in the store.
    ///
    /// # Errors
    ///
    /// Returns `MembershipError::NotAMember` if there is no active row.
    pub async fn authorize(
        &self,
        store_id: StoreId,
        user_id: UserId,
    ) -> Result<Member, MembershipError> {
        self.resolve(store_id, user_id)
            .await?
            .filter(Member::is_active)
            .ok_or(MembershipError::NotAMember)
    }

    /// Check that a member holds one of the allowed roles.
    ///
    /// # Errors
    ///
    /// Returns `MembershipError::InsufficientPermissions` otherwise.
    pub fn require_role(member: &Member, allowed: &[MemberRole]) -> Result<(), MembershipError> {
        if member.has_role(allowed) {
            Ok(())
        } else {
            Err(MembershipError::InsufficientPermissions)
        }
    }

    /// [`authorize`](Self::authorize) followed by [`require_role`](Self::require_role).
    ///
    /// # Errors
    ///
    /// Returns `NotAMember` or `InsufficientPermissions`.
    pub async fn authorize_role(
        &self,
        store_id: StoreId,
        user_id: UserId,
        allowed: &[MemberRole],
    ) -> Result<Member, MembershipError> {
        let member = self.authorize(store_id, user_id).await?;
        Self::require_role(&member, allowed)?;
        Ok(member)
    }

    // =========================================================================
    // Stores
    // =========================================================================

    /// Create a store owned by `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns `MembershipError::InvalidStoreName` if the name is blank.
    pub async fn create_store(
        &self,
        owner_id: UserId,
        new: &NewStore,
    ) -> Result<(Store, Member), MembershipError> {
        let new = NewStore {
            name: validate_store_name(&new.name)?,
            description: new.description.clone(),
        };
        let (store, owner) = self.store.create_store(owner_id, &new).await?;

        tracing::info!(store_id = %store.id, owner_id = %owner_id, "Store created");
        Ok((store, owner))
    }

    /// Store details with member count and the caller's role.
    ///
    /// # Errors
    ///
    /// Returns `NotAMember` unless the caller is an active member.
    pub async fn get_store(
        &self,
        store_id: StoreId,
        user_id: UserId,
    ) -> Result<StoreOverview, MembershipError> {
        let member = self.authorize(store_id, user_id).await?;
        let store = self.load_store(store_id).await?;
        let member_count = self.store.count_members(store_id).await?;

        Ok(StoreOverview {
            store,
            member_count,
            role: member.role,
        })
    }

    /// Stores where the user is an active member.
    ///
    /// # Errors
    ///
    /// Returns `MembershipError::Repository` if the query fails.
    pub async fn list_my_stores(
        &self,
        user_id: UserId,
    ) -> Result<Vec<StoreMembership>, MembershipError> {
        Ok(self.store.list_user_stores(user_id).await?)
    }

    /// Update store settings.
    ///
    /// # Errors
    ///
    /// Returns `NotAMember`/`InsufficientPermissions` unless OWNER or MANAGER.
    pub async fn update_store(
        &self,
        store_id: StoreId,
        user_id: UserId,
        update: &StoreUpdate,
    ) -> Result<Store, MembershipError> {
        self.authorize_role(store_id, user_id, MemberRole::MANAGERS)
            .await?;

        let update = StoreUpdate {
            name: update.name.as_deref().map(validate_store_name).transpose()?,
            description: update.description.clone(),
        };
        self.store
            .update_store(store_id, &update)
            .await
            .map_err(not_found_as(MembershipError::StoreNotFound))
    }

    /// Soft-delete a store.
    ///
    /// # Errors
    ///
    /// Returns `NotAMember`/`InsufficientPermissions` unless OWNER.
    pub async fn delete_store(
        &self,
        store_id: StoreId,
        user_id: UserId,
    ) -> Result<(), MembershipError> {
        self.authorize_role(store_id, user_id, MemberRole::OWNERS)
            .await?;

        if !self.store.soft_delete_store(store_id).await? {
            return Err(MembershipError::StoreNotFound);
        }
        tracing::info!(store_id = %store_id, user_id = %user_id, "Store deleted");
        Ok(())
    }

    async fn load_store(&self, store_id: StoreId) -> Result<Store, MembershipError> {
        self.store
            .find_store(store_id)
            .await?
            .ok_or(MembershipError::StoreNotFound)
    }

    // =========================================================================
    // Invite Links
    // =========================================================================

    /// Generate a fresh invite code, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns `NotAMember`/`InsufficientPermissions` unless OWNER or MANAGER.
    pub async fn create_invite_link(
        &self,
        store_id: StoreId,
        user_id: UserId,
    ) -> Result<String, MembershipError> {
        self.authorize_role(store_id, user_id, MemberRole::MANAGERS)
            .await?;

        let store = self
            .store
            .set_invite_code(store_id, &generate_invite_code())
            .await
            .map_err(not_found_as(MembershipError::StoreNotFound))?;

        store.invite_code.ok_or(MembershipError::StoreNotFound)
    }

    /// The store's current invite code, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `NotAMember`/`InsufficientPermissions` unless OWNER or MANAGER.
    pub async fn get_invite_link(
        &self,
        store_id: StoreId,
        user_id: UserId,
    ) -> Result<Option<String>, MembershipError> {
        self.authorize_role(store_id, user_id, MemberRole::MANAGERS)
            .await?;
        Ok(self.load_store(store_id).await?.invite_code)
    }

    // =========================================================================
    // Invitations
    // =========================================================================

    /// Invite an existing user to the store and email them the invite code.
    ///
    /// # Errors
    ///
    /// Returns `NotAMember`/`InsufficientPermissions` unless OWNER or MANAGER.
    /// Returns `OwnerRoleNotAssignable` for `role == OWNER`.
    /// Returns `UserNotFound` if no account has this email.
    /// Returns `UserAlreadyMember` if the user has any member row in the store.
    pub async fn create_invitation(
        &self,
        store_id: StoreId,
        user_id: UserId,
        email: &str,
        role: MemberRole,
    ) -> Result<Member, MembershipError> {
        self.authorize_role(store_id, user_id, MemberRole::MANAGERS)
            .await?;
        if role == MemberRole::Owner {
            return Err(MembershipError::OwnerRoleNotAssignable);
        }

        let email = barestore_core::Email::parse(email)?;
        let target = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or(MembershipError::UserNotFound)?
            .user;

        if self.store.find_member(store_id, target.id).await?.is_some() {
            return Err(MembershipError::UserAlreadyMember);
        }

        let invitation = self
            .store
            .create_invitation(store_id, target.id, role)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => MembershipError::UserAlreadyMember,
                other => MembershipError::Repository(other),
            })?;

        let store = self.load_store(store_id).await?;
        let code = self
            .store
            .ensure_invite_code(store_id, &generate_invite_code())
            .await?;

        if let Err(e) = self
            .mailer
            .send_invitation_email(&target.email, &store.name, &code)
            .await
        {
            tracing::warn!(
                store_id = %store_id,
                invitation_id = %invitation.id,
                error = %e,
                "Failed to send invitation email"
            );
        }

        tracing::info!(
            store_id = %store_id,
            invitation_id = %invitation.id,
            role = %role,
            "Invitation created"
        );
        Ok(invitation)
    }

    /// Pending invitations of a store.
    ///
    /// # Errors
    ///
    /// Returns `NotAMember`/`InsufficientPermissions` unless OWNER or MANAGER.
    pub async fn list_store_invitations(
        &self,
        store_id: StoreId,
        user_id: UserId,
    ) -> Result<Vec<StoreMember>, MembershipError> {
        self.authorize_role(store_id, user_id, MemberRole::MANAGERS)
            .await?;
        Ok(self.store.list_store_invitations(store_id).await?)
    }

    /// Withdraw a pending invitation of this store.
    ///
    /// # Errors
    ///
    /// Returns `InvitationNotFound` if the id is not a pending invitation of
    /// `store_id`.
    pub async fn delete_invitation(
        &self,
        store_id: StoreId,
        user_id: UserId,
        invitation_id: MemberId,
    ) -> Result<(), MembershipError> {
        self.authorize_role(store_id, user_id, MemberRole::MANAGERS)
            .await?;

        let pending = self
            .store
            .find_member_in_store(store_id, invitation_id)
            .await?
            .filter(|m| m.status == barestore_core::MemberStatus::Pending)
            .ok_or(MembershipError::InvitationNotFound)?;

        if !self.store.delete_member(store_id, pending.id).await? {
            return Err(MembershipError::InvitationNotFound);
        }
        Ok(())
    }

    /// Invitations addressed to the user.
    ///
    /// # Errors
    ///
    /// Returns `MembershipError::Repository` if the query fails.
    pub async fn list_my_invitations(
        &self,
        user_id: UserId,
    ) -> Result<Vec<StoreMembership>, MembershipError> {
        Ok(self.store.list_user_invitations(user_id).await?)
    }

    /// Accept or decline an invitation addressed to the user.
    ///
    /// # Errors
    ///
    /// Returns `InvitationNotFound` unless the invitation is pending and
    /// belongs to `user_id`.
    pub async fn respond_to_invitation(
        &self,
        invitation_id: MemberId,
        accept: bool,
        user_id: UserId,
    ) -> Result<Member, MembershipError> {
        let member = self
            .store
            .respond_to_invitation(invitation_id, user_id, accept)
            .await?
            .ok_or(MembershipError::InvitationNotFound)?;

        tracing::info!(
            store_id = %member.store_id,
            invitation_id = %invitation_id,
            accept,
            "Invitation answered"
        );
        Ok(member)
    }

    // =========================================================================
    // Members
    // =========================================================================

    /// All members of a store, for any active member.
    ///
    /// # Errors
    ///
    /// Returns `NotAMember` unless the caller is an active member.
    pub async fn list_members(
        &self,
        store_id: StoreId,
        user_id: UserId,
    ) -> Result<Vec<StoreMember>, MembershipError> {
        self.authorize(store_id, user_id).await?;
        Ok(self.store.list_members(store_id).await?)
    }
}

fn not_found_as(err: MembershipError) -> impl FnOnce(RepositoryError) -> MembershipError {
    move |e| match e {
        RepositoryError::NotFound => err,
        other => MembershipError::Repository(other),
    }
}

fn validate_store_name(name: &str) -> Result<String, MembershipError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(MembershipError::InvalidStoreName);
    }
    Ok(name.to_owned())
}

/// Random alphanumeric invite code.
fn generate_invite_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_CODE_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use barestore_core::{Email, MemberStatus, UserStatus};

    use super::*;
    use crate::db::{MemoryStore, UserStore};
    use crate::models::{NewUser, User};
    use crate::services::email::{RecordingMailer, SentEmail};

    async fn user(store: &MemoryStore, email: &str) -> User {
        store
            .create_user(NewUser {
                email: Email::parse(email).unwrap(),
                name: email.to_owned(),
                avatar: None,
                status: UserStatus::Active,
            })
            .await
            .unwrap()
    }

    fn shop(name: &str) -> NewStore {
        NewStore {
            name: name.to_owned(),
            description: None,
        }
    }

    #[test]
    fn test_invite_code_shape() {
        let code = generate_invite_code();
        assert_eq!(code.len(), INVITE_CODE_LENGTH);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(MembershipError::NotAMember.code(), "FORBIDDEN_RESOURCE");
        assert_eq!(MembershipError::NotAMember.status().as_u16(), 403);
        assert_eq!(
            MembershipError::InsufficientPermissions.code(),
            "INSUFFICIENT_PERMISSIONS"
        );
        assert_eq!(MembershipError::UserAlreadyMember.status().as_u16(), 409);
        assert_eq!(MembershipError::InvitationNotFound.status().as_u16(), 404);
    }

    #[tokio::test]
    async fn test_create_store_makes_owner() {
        let db = MemoryStore::new();
        let mailer = RecordingMailer::new();
        let svc = MembershipService::new(&db, &mailer);
        let owner = user(&db, "owner@example.com").await;

        let (store, member) = svc.create_store(owner.id, &shop("  Corner  ")).await.unwrap();
        assert_eq!(store.name, "Corner");
        assert_eq!(member.role, MemberRole::Owner);
        assert_eq!(member.status, MemberStatus::Active);

        let overview = svc.get_store(store.id, owner.id).await.unwrap();
        assert_eq!(overview.member_count, 1);
        assert_eq!(overview.role, MemberRole::Owner);
    }

    #[tokio::test]
    async fn test_create_store_rejects_blank_name() {
        let db = MemoryStore::new();
        let mailer = RecordingMailer::new();
        let svc = MembershipService::new(&db, &mailer);
        let owner = user(&db, "owner@example.com").await;

        assert!(matches!(
            svc.create_store(owner.id, &shop(" ")).await,
            Err(MembershipError::InvalidStoreName)
        ));
    }

    #[tokio::test]
    async fn test_invitation_flow() {
        let db = MemoryStore::new();
        let mailer = RecordingMailer::new();
        let svc = MembershipService::new(&db, &mailer);
        let owner = user(&db, "owner@example.com").await;
        let staff = user(&db, "staff@example.com").await;
        let (store, _) = svc.create_store(owner.id, &shop("Corner")).await.unwrap();

        let invitation = svc
            .create_invitation(store.id, owner.id, "Staff@Example.com", MemberRole::Staff)
            .await
            .unwrap();
        assert_eq!(invitation.status, MemberStatus::Pending);

        // Pending members are not authorized yet.
        assert!(matches!(
            svc.authorize(store.id, staff.id).await,
            Err(MembershipError::NotAMember)
        ));

        let code = svc.get_invite_link(store.id, owner.id).await.unwrap().unwrap();
        let sent = mailer.sent().await;
        assert_eq!(
            sent,
            vec![SentEmail::Invitation {
                to: staff.email.clone(),
                store_name: "Corner".to_owned(),
                invite_code: code,
            }]
        );

        let accepted = svc
            .respond_to_invitation(invitation.id, true, staff.id)
            .await
            .unwrap();
        assert_eq!(accepted.status, MemberStatus::Active);
        assert_eq!(
            svc.authorize(store.id, staff.id).await.unwrap().role,
            MemberRole::Staff
        );

        assert!(matches!(
            svc.respond_to_invitation(invitation.id, true, staff.id).await,
            Err(MembershipError::InvitationNotFound)
        ));
    }

    #[tokio::test]
    async fn test_invitation_rejects_existing_member_and_unknown_user() {
        let db = MemoryStore::new();
        let mailer = RecordingMailer::new();
        let svc = MembershipService::new(&db, &mailer);
        let owner = user(&db, "owner@example.com").await;
        let (store, _) = svc.create_store(owner.id, &shop("Corner")).await.unwrap();

        assert!(matches!(
            svc.create_invitation(store.id, owner.id, "owner@example.com", MemberRole::Staff)
                .await,
            Err(MembershipError::UserAlreadyMember)
        ));
        assert!(matches!(
            svc.create_invitation(store.id, owner.id, "ghost@example.com", MemberRole::Staff)
                .await,
            Err(MembershipError::UserNotFound)
        ));
        assert!(matches!(
            svc.create_invitation(store.id, owner.id, "owner@example.com", MemberRole::Owner)
                .await,
            Err(MembershipError::OwnerRoleNotAssignable)
        ));
    }

    #[tokio::test]
    async fn test_staff_cannot_manage_store() {
        let db = MemoryStore::new();
        let mailer = RecordingMailer::new();
        let svc = MembershipService::new(&db, &mailer);
        let owner = user(&db, "owner@example.com").await;
        let staff = user(&db, "staff@example.com").await;
        let (store, _) = svc.create_store(owner.id, &shop("Corner")).await.unwrap();
        let invitation = svc
            .create_invitation(store.id, owner.id, "staff@example.com", MemberRole::Staff)
            .await
            .unwrap();
        svc.respond_to_invitation(invitation.id, true, staff.id)
            .await
            .unwrap();

        let update = StoreUpdate {
            name: Some("Renamed".to_owned()),
            description: None,
        };
        assert!(matches!(
            svc.update_store(store.id, staff.id, &update).await,
            Err(MembershipError::InsufficientPermissions)
        ));
        assert!(matches!(
            svc.create_invite_link(store.id, staff.id).await,
            Err(MembershipError::InsufficientPermissions)
        ));
        assert_eq!(svc.list_members(store.id, staff.id).await.unwrap().len(), 2);

        let renamed = svc.update_store(store.id, owner.id, &update).await.unwrap();
        assert_eq!(renamed.name, "Renamed");
    }

    #[tokio::test]
    async fn test_delete_invitation_is_scoped_to_store() {
        let db = MemoryStore::new();
        let mailer = RecordingMailer::new();
        let svc = MembershipService::new(&db, &mailer);
        let owner_a = user(&db, "a@example.com").await;
        let owner_b = user(&db, "b@example.com").await;
        user(&db, "invitee@example.com").await;
        let (store_a, _) = svc.create_store(owner_a.id, &shop("A")).await.unwrap();
        let (store_b, _) = svc.create_store(owner_b.id, &shop("B")).await.unwrap();

        let invitation = svc
            .create_invitation(store_a.id, owner_a.id, "invitee@example.com", MemberRole::Staff)
            .await
            .unwrap();

        assert!(matches!(
            svc.delete_invitation(store_b.id, owner_b.id, invitation.id).await,
            Err(MembershipError::InvitationNotFound)
        ));
        svc.delete_invitation(store_a.id, owner_a.id, invitation.id)
            .await
            .unwrap();
        assert!(
            svc.list_store_invitations(store_a.id, owner_a.id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_owner_deletes_store() {
        let db = MemoryStore::new();
        let mailer = RecordingMailer::new();
        let svc = MembershipService::new(&db, &mailer);
        let owner = user(&db, "owner@example.com").await;
        let (store, _) = svc.create_store(owner.id, &shop("Corner")).await.unwrap();

        svc.delete_store(store.id, owner.id).await.unwrap();
        assert!(matches!(
            svc.get_store(store.id, owner.id).await,
            Err(MembershipError::NotAMember)
        ));
        assert!(svc.list_my_stores(owner.id).await.unwrap().is_empty());
    }
}
