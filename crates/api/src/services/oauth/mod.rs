//! OAuth 2.0 authorization-code login with Google, Microsoft and Facebook.
//!
//! The client builds provider authorization URLs and exchanges callback codes
//! for a normalized [`ProviderProfile`]. Providers without credentials in the
//! configuration are reported as not configured.

mod types;

pub use types::ProviderProfile;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use secrecy::ExposeSecret;
use thiserror::Error;
use url::Url;

use barestore_core::OAuthProvider;

use crate::config::{OAuthConfig, OAuthProviderConfig};
use types::{FacebookProfile, GoogleUserInfo, MicrosoftProfile, TokenResponse};

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

const MICROSOFT_AUTHORIZE_URL: &str =
    "https://login.microsoftonline.com/common/oauth2/v2.0/authorize";
const MICROSOFT_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";
const MICROSOFT_PROFILE_URL: &str = "https://graph.microsoft.com/v1.0/me";
const MICROSOFT_PHOTO_URL: &str = "https://graph.microsoft.com/v1.0/me/photo/$value";

const FACEBOOK_AUTHORIZE_URL: &str = "https://www.facebook.com/v19.0/dialog/oauth";
const FACEBOOK_TOKEN_URL: &str = "https://graph.facebook.com/v19.0/oauth/access_token";
const FACEBOOK_PROFILE_URL: &str = "https://graph.facebook.com/v19.0/me";
const FACEBOOK_PROFILE_FIELDS: &str = "id,email,first_name,middle_name,last_name,picture.type(large)";

/// Errors that can occur during an OAuth handshake.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// No credentials configured for the provider.
    #[error("{0} login is not configured")]
    NotConfigured(OAuthProvider),

    /// Callback state did not match the state issued with the redirect.
    #[error("invalid OAuth state")]
    InvalidState,

    /// Provider returned no usable email address.
    #[error("provider did not return an email address")]
    MissingEmail,

    /// Provider returned an unparseable email address.
    #[error("invalid email from provider: {0}")]
    InvalidEmail(#[from] barestore_core::EmailError),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned an error response.
    #[error("provider error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to build a URL or parse a response.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Client for every configured OAuth provider.
#[derive(Clone)]
pub struct OAuthClient {
    client: reqwest::Client,
    config: OAuthConfig,
    callback_base: String,
}

impl OAuthClient {
    /// Create a new OAuth client.
    ///
    /// `api_base_url` is the public URL of this API; provider callbacks land
    /// on `{api_base_url}/auth/{provider}/callback`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: OAuthConfig, api_base_url: &str) -> Result<Self, OAuthError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            config,
            callback_base: api_base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn credentials(&self, provider: OAuthProvider) -> Result<&OAuthProviderConfig, OAuthError> {
        let creds = match provider {
            OAuthProvider::Google => self.config.google.as_ref(),
            OAuthProvider::Microsoft => self.config.microsoft.as_ref(),
            OAuthProvider::Facebook => self.config.facebook.as_ref(),
        };
        creds.ok_or(OAuthError::NotConfigured(provider))
    }

    fn redirect_uri(&self, provider: OAuthProvider) -> String {
        format!("{}/auth/{provider}/callback", self.callback_base)
    }

    /// Provider consent-screen URL carrying `state`.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::NotConfigured` if the provider has no credentials.
    pub fn authorize_url(&self, provider: OAuthProvider, state: &str) -> Result<Url, OAuthError> {
        let creds = self.credentials(provider)?;
        let (base, scope) = match provider {
            OAuthProvider::Google => (GOOGLE_AUTHORIZE_URL, "openid email profile"),
            OAuthProvider::Microsoft => (MICROSOFT_AUTHORIZE_URL, "openid email profile User.Read"),
            OAuthProvider::Facebook => (FACEBOOK_AUTHORIZE_URL, "email,public_profile"),
        };
        let redirect_uri = self.redirect_uri(provider);

        Url::parse_with_params(
            base,
            &[
                ("client_id", creds.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope),
                ("state", state),
            ],
        )
        .map_err(|e| OAuthError::Parse(e.to_string()))
    }

    /// Exchange an authorization code for the user's profile.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError` if the provider is not configured, rejects the
    /// code, or returns a profile without a usable email.
    pub async fn exchange(
        &self,
        provider: OAuthProvider,
        code: &str,
    ) -> Result<ProviderProfile, OAuthError> {
        let access_token = self.exchange_code(provider, code).await?;

        match provider {
            OAuthProvider::Google => {
                let info: GoogleUserInfo = self.get_json(GOOGLE_USERINFO_URL, &access_token).await?;
                info.try_into()
            }
            OAuthProvider::Microsoft => {
                let profile: MicrosoftProfile =
                    self.get_json(MICROSOFT_PROFILE_URL, &access_token).await?;
                let photo = self.microsoft_photo(&access_token).await?;
                profile.into_profile(photo)
            }
            OAuthProvider::Facebook => {
                let url = Url::parse_with_params(
                    FACEBOOK_PROFILE_URL,
                    &[("fields", FACEBOOK_PROFILE_FIELDS)],
                )
                .map_err(|e| OAuthError::Parse(e.to_string()))?;
                let profile: FacebookProfile = self.get_json(url.as_str(), &access_token).await?;
                profile.try_into()
            }
        }
    }

    async fn exchange_code(&self, provider: OAuthProvider, code: &str) -> Result<String, OAuthError> {
        let creds = self.credentials(provider)?;
        let redirect_uri = self.redirect_uri(provider);
        let params = [
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.expose_secret()),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let request = match provider {
            OAuthProvider::Google => self.client.post(GOOGLE_TOKEN_URL).form(&params),
            OAuthProvider::Microsoft => self.client.post(MICROSOFT_TOKEN_URL).form(&params),
            OAuthProvider::Facebook => {
                let url = Url::parse_with_params(FACEBOOK_TOKEN_URL, &params)
                    .map_err(|e| OAuthError::Parse(e.to_string()))?;
                self.client.get(url)
            }
        };

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(%provider, status = status.as_u16(), "OAuth code exchange rejected");
            return Err(OAuthError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| OAuthError::Parse(e.to_string()))?;
        Ok(token.access_token)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, OAuthError> {
        let response = self.client.get(url).bearer_auth(access_token).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(OAuthError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| OAuthError::Parse(e.to_string()))
    }

    /// Profile photo as a `data:` URL. `None` if the account has no photo.
    async fn microsoft_photo(&self, access_token: &str) -> Result<Option<String>, OAuthError> {
        let response = self
            .client
            .get(MICROSOFT_PHOTO_URL)
            .bearer_auth(access_token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            tracing::warn!(
                status = response.status().as_u16(),
                "Failed to fetch Microsoft profile photo"
            );
            return Ok(None);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_owned();
        let bytes = response.bytes().await?;

        Ok(Some(format!(
            "data:{content_type};base64,{}",
            BASE64.encode(&bytes)
        )))
    }
}
