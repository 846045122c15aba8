//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::db::PgStore;
use crate::services::{
    AuthService, CloudinaryClient, MediaError, MembershipService, OAuthClient, OAuthError,
    SmtpMailer, TokenIssuer,
};

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("SMTP transport: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("OAuth client: {0}")]
    OAuth(#[from] OAuthError),
    #[error("media client: {0}")]
    Media(#[from] MediaError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. Everything inside is built
/// once at startup and read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    store: PgStore,
    issuer: TokenIssuer,
    mailer: SmtpMailer,
    oauth: OAuthClient,
    media: Option<CloudinaryClient>,
}

/// Auth service wired to the production collaborators.
pub type AppAuthService<'a> = AuthService<'a, PgStore, SmtpMailer, CloudinaryClient>;

/// Membership service wired to the production collaborators.
pub type AppMembershipService<'a> = MembershipService<'a, PgStore, SmtpMailer>;

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP transport, OAuth client or media client
    /// cannot be built from the configuration.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, StateError> {
        let issuer = TokenIssuer::new(&config.jwt.access_secret, &config.jwt.refresh_secret);
        let mailer = SmtpMailer::new(&config.email, &config.frontend_url)?;
        let oauth = OAuthClient::new(config.oauth.clone(), &config.base_url)?;
        let media = config
            .cloudinary
            .as_ref()
            .map(CloudinaryClient::new)
            .transpose()?;

        if media.is_none() {
            tracing::warn!("Cloudinary not configured, inline OAuth avatars will be dropped");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store: PgStore::new(pool),
                issuer,
                mailer,
                oauth,
                media,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        self.inner.store.pool()
    }

    #[must_use]
    pub fn store(&self) -> &PgStore {
        &self.inner.store
    }

    #[must_use]
    pub fn issuer(&self) -> &TokenIssuer {
        &self.inner.issuer
    }

    #[must_use]
    pub fn oauth(&self) -> &OAuthClient {
        &self.inner.oauth
    }

    /// Auth service borrowing this state's collaborators.
    #[must_use]
    pub fn auth(&self) -> AppAuthService<'_> {
        AuthService::new(
            &self.inner.store,
            &self.inner.issuer,
            &self.inner.mailer,
            self.inner.media.as_ref(),
        )
    }

    /// Membership service borrowing this state's collaborators.
    #[must_use]
    pub fn membership(&self) -> AppMembershipService<'_> {
        MembershipService::new(&self.inner.store, &self.inner.mailer)
    }
}
