//! Integration tests for Barestore.
//!
//! The suites under `tests/` drive the auth and membership services end to
//! end against the in-memory store (`barestore-api` feature `test-utils`),
//! which gives the same transactional guarantees as the `PostgreSQL` store.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p barestore-integration-tests
//! ```

use std::net::{IpAddr, Ipv4Addr};

use axum::http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
use secrecy::SecretString;

use barestore_api::db::MemoryStore;
use barestore_api::middleware::{Principal, principal_from_headers};
use barestore_api::services::auth::{AuthError, AuthService, AuthSession, TokenIssuer};
use barestore_api::services::email::RecordingMailer;
use barestore_api::services::media::FakeMediaStore;
use barestore_api::services::membership::MembershipService;
use barestore_core::Email;

/// Address most test clients connect from.
pub const HOME_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 10));

/// A second, different client address.
pub const AWAY_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 77));

/// Default password used by [`TestApp::register`].
pub const PASSWORD: &str = "correct horse battery";

/// In-process application: one store, issuer, mailer and media store shared
/// by every service built from it.
pub struct TestApp {
    pub store: MemoryStore,
    pub issuer: TokenIssuer,
    pub mailer: RecordingMailer,
    pub media: FakeMediaStore,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: MemoryStore::new(),
            issuer: TokenIssuer::new(
                &SecretString::from("integration-access-secret-0123456789abcdef"),
                &SecretString::from("integration-refresh-secret-0123456789abcdef"),
            ),
            mailer: RecordingMailer::new(),
            media: FakeMediaStore::returning("https://cdn.example.com/avatars/1.jpg"),
        }
    }

    #[must_use]
    pub fn auth(&self) -> AuthService<'_, MemoryStore, RecordingMailer, FakeMediaStore> {
        AuthService::new(&self.store, &self.issuer, &self.mailer, Some(&self.media))
    }

    #[must_use]
    pub fn membership(&self) -> MembershipService<'_, MemoryStore, RecordingMailer> {
        MembershipService::new(&self.store, &self.mailer)
    }

    /// Raw token from the latest verification email sent to `email`.
    ///
    /// # Panics
    ///
    /// Panics if the address is invalid or no verification email was sent.
    pub async fn verification_token(&self, email: &str) -> String {
        let to = Email::parse(email).expect("test email is valid");
        self.mailer
            .last_verification_token(&to)
            .await
            .expect("a verification email was sent")
    }

    /// Run the full signup flow and return the logged-in session.
    ///
    /// # Errors
    ///
    /// Returns the first `AuthError` raised along the way.
    pub async fn register(&self, email: &str, name: &str) -> Result<AuthSession, AuthError> {
        self.auth().signup(email, name).await?;
        let token = self.verification_token(email).await;
        self.auth().set_password(&token, PASSWORD, HOME_IP).await
    }

    /// Decode an access token the way the HTTP extractor does.
    ///
    /// # Errors
    ///
    /// Returns the extractor's `AuthError` for a rejected token.
    pub fn principal(&self, access_token: &str) -> Result<Principal, AuthError> {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {access_token}")) {
            headers.insert(AUTHORIZATION, value);
        }
        principal_from_headers(&headers, &self.issuer)
    }
}
