//! Authentication service.
//!
//! Drives the account lifecycle:
//!
//! ```text
//! UNREGISTERED -> PENDING (unverified) -> PENDING (verified, no password) -> ACTIVE
//! ```
//!
//! Signup issues an emailed verification token; setting a password consumes
//! it and activates the account. Login, refresh and OAuth login all end in a
//! fresh access/refresh pair with a server-side session bound to the caller's
//! IP. Refresh tokens rotate: each one is good for exactly one refresh.

mod error;
pub mod tokens;

pub use error::AuthError;
pub use tokens::{TokenError, TokenIssuer, TokenPair};

use std::net::IpAddr;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use serde::Serialize;

use barestore_core::{Email, OAuthProvider, UserId, UserStatus};

use crate::db::{AuthStore, RepositoryError};
use crate::models::{NewSession, NewUser, User};
use crate::services::email::Mailer;
use crate::services::media::MediaStore;
use crate::services::oauth::ProviderProfile;
use tokens::{generate_opaque_token, hash_token};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Lifetime of a server-side refresh session.
pub const SESSION_TTL: Duration = Duration::days(7);

/// Minimum gap between two verification emails to the same user.
pub const RESEND_COOLDOWN: Duration = Duration::seconds(60);

/// Media folder for uploaded avatars.
const AVATAR_FOLDER: &str = "avatar";

/// Result of a successful login: tokens plus the user they belong to.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: User,
}

/// Result of checking a signup verification token.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupVerification {
    pub email: Email,
    pub token: String,
}

/// Authentication service.
///
/// Borrows its collaborators; construct one per request from `AppState`.
pub struct AuthService<'a, S, M, D> {
    store: &'a S,
    issuer: &'a TokenIssuer,
    mailer: &'a M,
    media: Option<&'a D>,
}

impl<'a, S, M, D> AuthService<'a, S, M, D>
where
    S: AuthStore,
    M: Mailer,
    D: MediaStore,
{
    /// Create a new authentication service.
    ///
    /// Without a media store, inline (`data:`) provider pictures are dropped.
    #[must_use]
    pub const fn new(
        store: &'a S,
        issuer: &'a TokenIssuer,
        mailer: &'a M,
        media: Option<&'a D>,
    ) -> Self {
        Self {
            store,
            issuer,
            mailer,
            media,
        }
    }

    // =========================================================================
    // Signup
    // =========================================================================

    /// Start (or restart) signup: create a pending user and email a
    /// verification token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` / `AuthError::InvalidName` for bad input.
    /// Returns `AuthError::UserAlreadyExists` if the account is already active.
    /// Returns `AuthError::TooManyRequests` if the last token is under a minute old.
    pub async fn signup(&self, email: &str, name: &str) -> Result<(), AuthError> {
        let email = Email::parse(email)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::InvalidName);
        }

        let user = match self.store.find_user_by_email(&email).await? {
            Some(account) if account.user.status != UserStatus::Pending => {
                return Err(AuthError::UserAlreadyExists);
            }
            Some(account) => {
                self.check_resend_cooldown(account.user.id).await?;
                account.user
            }
            None => self
                .store
                .create_user(NewUser {
                    email: email.clone(),
                    name: name.to_owned(),
                    avatar: None,
                    status: UserStatus::Pending,
                })
                .await
                .map_err(|e| match e {
                    RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                    other => AuthError::Repository(other),
                })?,
        };

        let (raw, hash) = generate_opaque_token();
        self.store.create_verification(user.id, &hash).await?;

        if let Err(e) = self.mailer.send_verification_email(&email, &raw).await {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to send verification email");
        }

        tracing::info!(user_id = %user.id, "Verification token issued");
        Ok(())
    }

    async fn check_resend_cooldown(&self, user_id: UserId) -> Result<(), AuthError> {
        let Some(last) = self.store.find_last_verification(user_id).await? else {
            return Ok(());
        };

        let elapsed = last.age_at(Utc::now());
        if elapsed < RESEND_COOLDOWN {
            // floor(60 - elapsed), computed in whole milliseconds
            let remaining_ms = (RESEND_COOLDOWN - elapsed).num_milliseconds();
            return Err(AuthError::TooManyRequests {
                retry_after_seconds: remaining_ms / 1000,
            });
        }
        Ok(())
    }

    /// Check a verification token and return the email it was sent to.
    ///
    /// Does not consume the token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidOrExpiredToken` if the token is unknown.
    pub async fn verify_signup(&self, token: &str) -> Result<SignupVerification, AuthError> {
        let verification = self
            .store
            .find_verification(&hash_token(token))
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        let Some(user) = self.store.find_user_by_id(verification.user_id).await? else {
            self.store.delete_verification(verification.id).await?;
            return Err(AuthError::InvalidOrExpiredToken);
        };

        Ok(SignupVerification {
            email: user.email,
            token: token.to_owned(),
        })
    }

    /// Consume a verification token, set the password and log the user in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if the password is too short.
    /// Returns `AuthError::InvalidOrExpiredToken` if the token is unknown or
    /// was consumed concurrently.
    pub async fn set_password(
        &self,
        token: &str,
        password: &str,
        ip: IpAddr,
    ) -> Result<AuthSession, AuthError> {
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let verification = self
            .store
            .find_verification(&hash_token(token))
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;
        let user = self
            .store
            .find_user_by_id(verification.user_id)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        let tokens = self.issuer.issue_pair(&user).map_err(AuthError::Token)?;
        let session = new_session(user.id, &tokens, ip);

        let (user, _) = self
            .store
            .redeem_verification(verification.id, &password_hash, session)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        tracing::info!(user_id = %user.id, "Password set, account activated");
        Ok(AuthSession { tokens, user })
    }

    // =========================================================================
    // Password Login
    // =========================================================================

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Checked in order: `UserNotFound`, `PasswordNotSet`, `EmailNotVerified`,
    /// `InvalidPassword`.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        ip: IpAddr,
    ) -> Result<AuthSession, AuthError> {
        let email = Email::parse(email)?;

        let account = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let Some(password_hash) = account.password_hash.as_deref() else {
            return Err(AuthError::PasswordNotSet);
        };
        if account.user.status != UserStatus::Active {
            return Err(AuthError::EmailNotVerified);
        }
        verify_password(password, password_hash)?;

        self.start_session(account.user, ip).await
    }

    /// Mint a token pair and persist its session.
    async fn start_session(&self, user: User, ip: IpAddr) -> Result<AuthSession, AuthError> {
        let tokens = self.issuer.issue_pair(&user).map_err(AuthError::Token)?;
        self.store
            .create_session(new_session(user.id, &tokens, ip))
            .await?;

        tracing::info!(user_id = %user.id, "Session started");
        Ok(AuthSession { tokens, user })
    }

    // =========================================================================
    // Refresh / Logout
    // =========================================================================

    /// Exchange a refresh token for a new pair, retiring the old session.
    ///
    /// A rejected refresh leaves the presented session in place.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOrRevokedToken` if the token fails verification or has
    /// no session, `InvalidTokenType` for non-refresh tokens, `IpMismatch` if
    /// `ip` differs from the session's, and `SessionExpired` past its expiry.
    pub async fn refresh(&self, refresh_token: &str, ip: IpAddr) -> Result<AuthSession, AuthError> {
        let claims = self
            .issuer
            .verify_refresh(refresh_token)
            .map_err(|_| AuthError::InvalidOrRevokedToken)?;
        if !claims.is_refresh() {
            return Err(AuthError::InvalidTokenType);
        }

        let user = self
            .store
            .find_user_by_id(claims.sub)
            .await?
            .ok_or(AuthError::InvalidOrRevokedToken)?;

        let tokens = self.issuer.issue_pair(&user).map_err(AuthError::Token)?;
        let now = Utc::now();

        self.store
            .rotate_session(
                user.id,
                &hash_token(refresh_token),
                new_session(user.id, &tokens, ip),
                |session| {
                    if session.ip_address != ip {
                        return Err(AuthError::IpMismatch);
                    }
                    if session.is_expired_at(now) {
                        return Err(AuthError::SessionExpired);
                    }
                    Ok(())
                },
            )
            .await?
            .ok_or(AuthError::InvalidOrRevokedToken)?;

        tracing::debug!(user_id = %user.id, "Session rotated");
        Ok(AuthSession { tokens, user })
    }

    /// Revoke the session of a refresh token. Expired tokens are accepted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOrRevokedToken` if the signature is bad or the session
    /// is already gone.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let claims = self
            .issuer
            .verify_refresh_signature(refresh_token)
            .map_err(|_| AuthError::InvalidOrRevokedToken)?;

        let session = self
            .store
            .find_session(claims.sub, &hash_token(refresh_token))
            .await?
            .ok_or(AuthError::InvalidOrRevokedToken)?;

        if !self.store.delete_session(session.id).await? {
            return Err(AuthError::InvalidOrRevokedToken);
        }

        tracing::info!(user_id = %claims.sub, "Logged out");
        Ok(())
    }

    // =========================================================================
    // OAuth
    // =========================================================================

    /// Find or create the user behind a provider profile and log them in.
    ///
    /// Existing users only get an avatar if they have none. A failed avatar
    /// upload is logged and the login proceeds without one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` or `AuthError::Token` on internal failure.
    pub async fn oauth_login(
        &self,
        provider: OAuthProvider,
        profile: &ProviderProfile,
        ip: IpAddr,
    ) -> Result<AuthSession, AuthError> {
        let user = match self.store.find_user_by_email(&profile.email).await? {
            Some(account) => self.backfill_avatar(provider, profile, account.user).await?,
            None => self.create_oauth_user(provider, profile).await?,
        };

        tracing::info!(user_id = %user.id, %provider, "OAuth login");
        self.start_session(user, ip).await
    }

    async fn backfill_avatar(
        &self,
        provider: OAuthProvider,
        profile: &ProviderProfile,
        user: User,
    ) -> Result<User, AuthError> {
        if user.avatar.is_some() {
            return Ok(user);
        }
        let Some(avatar) = self.resolve_avatar(provider, profile).await else {
            return Ok(user);
        };

        Ok(self
            .store
            .set_avatar_if_unset(user.id, &avatar)
            .await?
            .unwrap_or(user))
    }

    async fn create_oauth_user(
        &self,
        provider: OAuthProvider,
        profile: &ProviderProfile,
    ) -> Result<User, AuthError> {
        let avatar = self.resolve_avatar(provider, profile).await;
        let created = self
            .store
            .create_user(NewUser {
                email: profile.email.clone(),
                name: profile.display_name(),
                avatar,
                status: UserStatus::Active,
            })
            .await;

        match created {
            Ok(user) => Ok(user),
            // Lost a race with a concurrent first login for the same email.
            Err(RepositoryError::Conflict(_)) => self
                .store
                .find_user_by_email(&profile.email)
                .await?
                .map(|account| account.user)
                .ok_or(AuthError::UserNotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Public avatar URL for a profile, uploading inline pictures first.
    async fn resolve_avatar(
        &self,
        provider: OAuthProvider,
        profile: &ProviderProfile,
    ) -> Option<String> {
        let picture = profile.picture.as_deref()?;
        if !profile.has_inline_picture() {
            return Some(picture.to_owned());
        }

        let Some(media) = self.media else {
            tracing::warn!(%provider, "No media store configured, dropping inline avatar");
            return None;
        };
        match media.upload_data_url(picture, AVATAR_FOLDER).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(%provider, error = %e, "Avatar upload failed");
                None
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Load the user behind an authenticated principal.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the account no longer exists.
    pub async fn current_user(&self, id: UserId) -> Result<User, AuthError> {
        self.store
            .find_user_by_id(id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

fn new_session(user_id: UserId, tokens: &TokenPair, ip: IpAddr) -> NewSession {
    NewSession {
        user_id,
        token_hash: hash_token(&tokens.refresh_token),
        expires_at: Utc::now() + SESSION_TTL,
        ip_address: ip,
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::PasswordHash)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidPassword)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::Ipv4Addr;

    use secrecy::SecretString;

    use super::*;
    use crate::db::{MemoryStore, SessionStore, UserStore};
    use crate::services::email::RecordingMailer;
    use crate::services::media::FakeMediaStore;

    const IP: IpAddr = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7));
    const OTHER_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 9));

    struct Harness {
        store: MemoryStore,
        issuer: TokenIssuer,
        mailer: RecordingMailer,
        media: FakeMediaStore,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_media(FakeMediaStore::returning("https://cdn.example.com/avatar.jpg"))
        }

        fn with_media(media: FakeMediaStore) -> Self {
            Self {
                store: MemoryStore::new(),
                issuer: TokenIssuer::new(
                    &SecretString::from("access-key-for-tests".to_owned()),
                    &SecretString::from("refresh-key-for-tests".to_owned()),
                ),
                mailer: RecordingMailer::new(),
                media,
            }
        }

        fn service(&self) -> AuthService<'_, MemoryStore, RecordingMailer, FakeMediaStore> {
            AuthService::new(&self.store, &self.issuer, &self.mailer, Some(&self.media))
        }

        async fn active_user(&self, email: &str, password: &str) -> AuthSession {
            self.service().signup(email, "Jane Doe").await.unwrap();
            let to = Email::parse(email).unwrap();
            let token = self.mailer.last_verification_token(&to).await.unwrap();
            self.service()
                .set_password(&token, password, IP)
                .await
                .unwrap()
        }
    }

    fn profile(email: &str, picture: Option<&str>) -> ProviderProfile {
        ProviderProfile {
            email: Email::parse(email).unwrap(),
            first_name: "Grace".to_owned(),
            middle_name: None,
            last_name: Some("Hopper".to_owned()),
            picture: picture.map(str::to_owned),
        }
    }

    #[test]
    fn test_validate_password_length() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidPassword)
        ));
    }

    #[tokio::test]
    async fn test_signup_creates_pending_user_and_sends_token() {
        let h = Harness::new();
        h.service().signup("Jane@Example.com", "Jane").await.unwrap();

        let email = Email::parse("jane@example.com").unwrap();
        let account = h.store.find_user_by_email(&email).await.unwrap().unwrap();
        assert_eq!(account.user.status, UserStatus::Pending);
        assert!(account.password_hash.is_none());

        let raw = h.mailer.last_verification_token(&email).await.unwrap();
        let stored = h.store.verifications().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].token_hash, hash_token(&raw));
        assert_ne!(stored[0].token_hash, raw);
    }

    #[tokio::test]
    async fn test_signup_rejects_blank_name() {
        let h = Harness::new();
        let err = h.service().signup("a@example.com", "   ").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidName));
    }

    #[tokio::test]
    async fn test_signup_resend_cooldown() {
        let h = Harness::new();
        h.service().signup("a@example.com", "A").await.unwrap();

        let err = h.service().signup("a@example.com", "A").await.unwrap_err();
        match err {
            AuthError::TooManyRequests {
                retry_after_seconds,
            } => assert!((58..=59).contains(&retry_after_seconds)),
            other => panic!("expected TooManyRequests, got {other:?}"),
        }

        let user = h
            .store
            .find_user_by_email(&Email::parse("a@example.com").unwrap())
            .await
            .unwrap()
            .unwrap()
            .user;
        h.store.age_verifications(user.id, Duration::seconds(61)).await;
        h.service().signup("a@example.com", "A").await.unwrap();
        assert_eq!(h.store.verifications().await.len(), 2);
    }

    #[tokio::test]
    async fn test_signup_rejects_active_user() {
        let h = Harness::new();
        h.active_user("a@example.com", "password123").await;

        let err = h.service().signup("a@example.com", "A").await.unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists));
    }

    #[tokio::test]
    async fn test_signup_survives_mail_failure() {
        let h = Harness {
            mailer: RecordingMailer::failing(),
            ..Harness::new()
        };
        h.service().signup("a@example.com", "A").await.unwrap();
        assert_eq!(h.store.verifications().await.len(), 1);
    }

    #[tokio::test]
    async fn test_verify_signup_does_not_consume() {
        let h = Harness::new();
        h.service().signup("a@example.com", "A").await.unwrap();
        let email = Email::parse("a@example.com").unwrap();
        let token = h.mailer.last_verification_token(&email).await.unwrap();

        let first = h.service().verify_signup(&token).await.unwrap();
        let second = h.service().verify_signup(&token).await.unwrap();
        assert_eq!(first.email, email);
        assert_eq!(second.token, token);

        assert!(matches!(
            h.service().verify_signup("bogus").await,
            Err(AuthError::InvalidOrExpiredToken)
        ));
    }

    #[tokio::test]
    async fn test_set_password_activates_and_consumes_token() {
        let h = Harness::new();
        h.service().signup("a@example.com", "A").await.unwrap();
        let email = Email::parse("a@example.com").unwrap();
        let token = h.mailer.last_verification_token(&email).await.unwrap();

        let session = h
            .service()
            .set_password(&token, "password123", IP)
            .await
            .unwrap();
        assert_eq!(session.user.status, UserStatus::Active);
        assert!(h.store.verifications().await.is_empty());

        let stored = h.store.password_hash(session.user.id).await.unwrap();
        assert!(stored.starts_with("$argon2"));

        let sessions = h.store.sessions().await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].token_hash, hash_token(&session.tokens.refresh_token));
        assert_eq!(sessions[0].ip_address, IP);

        let err = h
            .service()
            .set_password(&token, "password123", IP)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredToken));
    }

    #[tokio::test]
    async fn test_set_password_rejects_weak_password() {
        let h = Harness::new();
        h.service().signup("a@example.com", "A").await.unwrap();
        let email = Email::parse("a@example.com").unwrap();
        let token = h.mailer.last_verification_token(&email).await.unwrap();

        let err = h.service().set_password(&token, "short", IP).await.unwrap_err();
        assert!(matches!(err, AuthError::WeakPassword(_)));
        assert_eq!(h.store.verifications().await.len(), 1);
    }

    #[tokio::test]
    async fn test_login_error_order() {
        let h = Harness::new();
        assert!(matches!(
            h.service().login("nobody@example.com", "password123", IP).await,
            Err(AuthError::UserNotFound)
        ));

        h.service().signup("pending@example.com", "P").await.unwrap();
        assert!(matches!(
            h.service().login("pending@example.com", "password123", IP).await,
            Err(AuthError::PasswordNotSet)
        ));

        h.active_user("active@example.com", "password123").await;
        assert!(matches!(
            h.service().login("active@example.com", "wrong-password", IP).await,
            Err(AuthError::InvalidPassword)
        ));
    }

    #[tokio::test]
    async fn test_login_success_creates_session() {
        let h = Harness::new();
        h.active_user("a@example.com", "password123").await;

        let session = h
            .service()
            .login("A@example.com", "password123", OTHER_IP)
            .await
            .unwrap();
        assert_eq!(session.user.email.as_str(), "a@example.com");

        let found = h
            .store
            .find_session(session.user.id, &hash_token(&session.tokens.refresh_token))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.ip_address, OTHER_IP);
    }

    #[tokio::test]
    async fn test_refresh_rotates_once() {
        let h = Harness::new();
        let initial = h.active_user("a@example.com", "password123").await;
        let token = initial.tokens.refresh_token;

        let rotated = h.service().refresh(&token, IP).await.unwrap();
        assert_ne!(rotated.tokens.refresh_token, token);

        let again = h.service().refresh(&token, IP).await.unwrap_err();
        assert!(matches!(again, AuthError::InvalidOrRevokedToken));

        let sessions = h.store.sessions().await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(
            sessions[0].token_hash,
            hash_token(&rotated.tokens.refresh_token)
        );
    }

    #[tokio::test]
    async fn test_refresh_from_other_ip_keeps_session() {
        let h = Harness::new();
        let initial = h.active_user("a@example.com", "password123").await;

        let err = h
            .service()
            .refresh(&initial.tokens.refresh_token, OTHER_IP)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::IpMismatch));

        h.service()
            .refresh(&initial.tokens.refresh_token, IP)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_refresh_rejects_expired_session() {
        let h = Harness::new();
        let initial = h.active_user("a@example.com", "password123").await;
        let user_id = initial.user.id;

        // Replace the live session with an expired one for a new token.
        let stale = h.issuer.issue_refresh(user_id).unwrap();
        h.store
            .create_session(NewSession {
                user_id,
                token_hash: hash_token(&stale),
                expires_at: Utc::now() - Duration::minutes(1),
                ip_address: IP,
            })
            .await
            .unwrap();

        let err = h.service().refresh(&stale, IP).await.unwrap_err();
        assert!(matches!(err, AuthError::SessionExpired));
        assert!(
            h.store
                .find_session(user_id, &hash_token(&stale))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token_and_garbage() {
        let h = Harness::new();
        let initial = h.active_user("a@example.com", "password123").await;

        assert!(matches!(
            h.service().refresh(&initial.tokens.access_token, IP).await,
            Err(AuthError::InvalidOrRevokedToken)
        ));
        assert!(matches!(
            h.service().refresh("garbage", IP).await,
            Err(AuthError::InvalidOrRevokedToken)
        ));
    }

    #[tokio::test]
    async fn test_logout_deletes_session() {
        let h = Harness::new();
        let initial = h.active_user("a@example.com", "password123").await;

        h.service()
            .logout(&initial.tokens.refresh_token)
            .await
            .unwrap();
        assert!(h.store.sessions().await.is_empty());

        assert!(matches!(
            h.service().logout(&initial.tokens.refresh_token).await,
            Err(AuthError::InvalidOrRevokedToken)
        ));
    }

    #[tokio::test]
    async fn test_oauth_creates_active_user_with_avatar() {
        let h = Harness::new();
        let session = h
            .service()
            .oauth_login(
                OAuthProvider::Google,
                &profile("grace@example.com", Some("https://lh3.example.com/p.jpg")),
                IP,
            )
            .await
            .unwrap();

        assert_eq!(session.user.status, UserStatus::Active);
        assert_eq!(session.user.name, "Grace Hopper");
        assert_eq!(
            session.user.avatar.as_deref(),
            Some("https://lh3.example.com/p.jpg")
        );
        assert!(h.store.password_hash(session.user.id).await.is_none());
        assert_eq!(h.store.sessions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_oauth_never_overwrites_avatar() {
        let h = Harness::new();
        h.service()
            .oauth_login(
                OAuthProvider::Google,
                &profile("grace@example.com", Some("https://first.example.com/a.jpg")),
                IP,
            )
            .await
            .unwrap();

        let again = h
            .service()
            .oauth_login(
                OAuthProvider::Facebook,
                &profile("grace@example.com", Some("https://second.example.com/b.jpg")),
                IP,
            )
            .await
            .unwrap();
        assert_eq!(
            again.user.avatar.as_deref(),
            Some("https://first.example.com/a.jpg")
        );
    }

    #[tokio::test]
    async fn test_oauth_backfills_missing_avatar() {
        let h = Harness::new();
        h.active_user("grace@example.com", "password123").await;

        let session = h
            .service()
            .oauth_login(
                OAuthProvider::Microsoft,
                &profile("grace@example.com", Some("data:image/jpeg;base64,AAAA")),
                IP,
            )
            .await
            .unwrap();
        assert_eq!(
            session.user.avatar.as_deref(),
            Some("https://cdn.example.com/avatar.jpg")
        );
    }

    #[tokio::test]
    async fn test_oauth_upload_failure_degrades() {
        let h = Harness::with_media(FakeMediaStore::failing());
        let session = h
            .service()
            .oauth_login(
                OAuthProvider::Microsoft,
                &profile("grace@example.com", Some("data:image/jpeg;base64,AAAA")),
                IP,
            )
            .await
            .unwrap();
        assert!(session.user.avatar.is_none());
    }
}
