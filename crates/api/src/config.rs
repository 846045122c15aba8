//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `API_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `API_BASE_URL` - Public URL of this API (OAuth callbacks land here)
//! - `FRONTEND_URL` - Public URL of the POS frontend (email links, OAuth redirects)
//! - `API_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `JWT_SECRET` - Access token signing secret (min 32 chars, high entropy)
//! - `JWT_REFRESH_SECRET` - Refresh token signing secret (min 32 chars, must differ)
//! - `SMTP_HOST` - SMTP server hostname
//! - `SMTP_USERNAME` - SMTP authentication username
//! - `SMTP_PASSWORD` - SMTP authentication password
//! - `EMAIL_FROM` - Email sender address
//!
//! ## Optional
//! - `API_HOST` - Bind address (default: 0.0.0.0)
//! - `API_PORT` - Listen port (default: 3000)
//! - `SMTP_PORT` - SMTP port (default: 587)
//! - `TRUSTED_PROXY` - Proxy in front of the API whose client-IP header is
//!   honored: `none`, `cloudflare`, `fly` or `forwarded` (default: none)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` - Sampling (default: 1.0)
//!
//! ## Optional (OAuth - each provider enabled when both variables are set)
//! - `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET`
//! - `MICROSOFT_CLIENT_ID` / `MICROSOFT_CLIENT_SECRET`
//! - `FACEBOOK_CLIENT_ID` / `FACEBOOK_CLIENT_SECRET`
//!
//! ## Optional (Cloudinary - avatar uploads)
//! - `CLOUDINARY_CLOUD_NAME` - Cloud name
//! - `CLOUDINARY_UPLOAD_PRESET` - Unsigned upload preset
//! - `CLOUDINARY_FOLDER` - Root folder (default: barestore-test)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use barestore_core::OAuthProvider;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_CLOUDINARY_FOLDER: &str = "barestore-test";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the API
    pub base_url: String,
    /// Public base URL of the frontend
    pub frontend_url: String,
    /// Which proxy header, if any, carries the client address
    pub trusted_proxy: TrustedProxy,
    /// Session signing secret (OAuth handshake sessions)
    pub session_secret: SecretString,
    /// JWT signing secrets
    pub jwt: JwtConfig,
    /// Email configuration
    pub email: EmailConfig,
    /// OAuth provider credentials
    pub oauth: OAuthConfig,
    /// Cloudinary configuration (optional - avatar uploads)
    pub cloudinary: Option<CloudinaryConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// The reverse proxy the API trusts to report the client address.
///
/// With `None` the socket peer is the client. Any other mode reads exactly
/// one header that the named proxy overwrites or appends, so a value forged
/// by the client never wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrustedProxy {
    #[default]
    None,
    /// `cf-connecting-ip`, set by Cloudflare.
    Cloudflare,
    /// `fly-client-ip`, set by the Fly.io edge.
    Fly,
    /// Last `x-forwarded-for` entry, appended by a single trusted proxy.
    Forwarded,
}

impl FromStr for TrustedProxy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "cloudflare" => Ok(Self::Cloudflare),
            "fly" => Ok(Self::Fly),
            "forwarded" => Ok(Self::Forwarded),
            other => Err(format!(
                "unknown proxy '{other}' (expected none, cloudflare, fly or forwarded)"
            )),
        }
    }
}

/// JWT signing secrets.
///
/// Implements `Debug` manually to redact both secrets.
#[derive(Clone)]
pub struct JwtConfig {
    pub access_secret: SecretString,
    pub refresh_secret: SecretString,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_secret", &"[REDACTED]")
            .field("refresh_secret", &"[REDACTED]")
            .finish()
    }
}

/// Email (SMTP) configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// SMTP authentication username
    pub smtp_username: String,
    /// SMTP authentication password
    pub smtp_password: SecretString,
    /// Email sender address (From header)
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Credentials for one OAuth provider.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct OAuthProviderConfig {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl std::fmt::Debug for OAuthProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthProviderConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Credentials for every OAuth provider. `None` disables that provider.
#[derive(Debug, Clone, Default)]
pub struct OAuthConfig {
    pub google: Option<OAuthProviderConfig>,
    pub microsoft: Option<OAuthProviderConfig>,
    pub facebook: Option<OAuthProviderConfig>,
}

/// Cloudinary unsigned-upload configuration.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub upload_preset: String,
    /// Root folder, e.g. `barestore-prod`.
    pub folder_root: String,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("API_DATABASE_URL")?;
        let host = get_env_or_default("API_HOST", "0.0.0.0")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("API_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("API_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("API_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("API_BASE_URL")?;
        let frontend_url = get_required_env("FRONTEND_URL")?;
        let trusted_proxy = get_env_or_default("TRUSTED_PROXY", "none")
            .parse::<TrustedProxy>()
            .map_err(|e| ConfigError::InvalidEnvVar("TRUSTED_PROXY".to_string(), e))?;
        let session_secret = get_validated_secret("API_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "API_SESSION_SECRET")?;

        let jwt = JwtConfig::from_env()?;
        let email = EmailConfig::from_env()?;
        let oauth = OAuthConfig::from_env()?;
        let cloudinary = CloudinaryConfig::from_env();
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            frontend_url,
            trusted_proxy,
            session_secret,
            jwt,
            email,
            oauth,
            cloudinary,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Returns true if the API is served over HTTPS (secure cookies).
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl JwtConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let access_secret = get_validated_secret("JWT_SECRET")?;
        validate_session_secret(&access_secret, "JWT_SECRET")?;
        let refresh_secret = get_validated_secret("JWT_REFRESH_SECRET")?;
        validate_session_secret(&refresh_secret, "JWT_REFRESH_SECRET")?;

        let config = Self {
            access_secret,
            refresh_secret,
        };
        config.validate_distinct()?;
        Ok(config)
    }

    /// Access and refresh tokens must not share a signing key.
    fn validate_distinct(&self) -> Result<(), ConfigError> {
        if self.access_secret.expose_secret() == self.refresh_secret.expose_secret() {
            return Err(ConfigError::InsecureSecret(
                "JWT_REFRESH_SECRET".to_string(),
                "must differ from JWT_SECRET".to_string(),
            ));
        }
        Ok(())
    }
}

impl EmailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let smtp_port = get_env_or_default("SMTP_PORT", "587")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string()))?;

        Ok(Self {
            smtp_host: get_required_env("SMTP_HOST")?,
            smtp_port,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: get_validated_secret("SMTP_PASSWORD")?,
            from_address: get_required_env("EMAIL_FROM")?,
        })
    }
}

impl OAuthConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            google: OAuthProviderConfig::from_env(OAuthProvider::Google)?,
            microsoft: OAuthProviderConfig::from_env(OAuthProvider::Microsoft)?,
            facebook: OAuthProviderConfig::from_env(OAuthProvider::Facebook)?,
        })
    }

    /// Providers with credentials configured.
    #[must_use]
    pub fn enabled(&self) -> Vec<OAuthProvider> {
        OAuthProvider::ALL
            .iter()
            .copied()
            .filter(|p| match p {
                OAuthProvider::Google => self.google.is_some(),
                OAuthProvider::Microsoft => self.microsoft.is_some(),
                OAuthProvider::Facebook => self.facebook.is_some(),
            })
            .collect()
    }
}

impl OAuthProviderConfig {
    /// Load `{PROVIDER}_CLIENT_ID` and `{PROVIDER}_CLIENT_SECRET`.
    ///
    /// Returns `None` if neither is set; an error if only one is.
    fn from_env(provider: OAuthProvider) -> Result<Option<Self>, ConfigError> {
        let prefix = provider.as_str().to_uppercase();
        let id_key = format!("{prefix}_CLIENT_ID");
        let secret_key = format!("{prefix}_CLIENT_SECRET");

        match (get_optional_env(&id_key), get_optional_env(&secret_key)) {
            (Some(client_id), Some(secret)) => {
                validate_secret_strength(&secret, &secret_key)?;
                Ok(Some(Self {
                    client_id,
                    client_secret: SecretString::from(secret),
                }))
            }
            (None, None) => Ok(None),
            (Some(_), None) => Err(ConfigError::MissingEnvVar(secret_key)),
            (None, Some(_)) => Err(ConfigError::MissingEnvVar(id_key)),
        }
    }
}

impl CloudinaryConfig {
    /// Returns `None` if Cloudinary variables are not set (avatar uploads disabled).
    fn from_env() -> Option<Self> {
        let cloud_name = get_optional_env("CLOUDINARY_CLOUD_NAME")?;
        let upload_preset = get_optional_env("CLOUDINARY_UPLOAD_PRESET")?;

        Some(Self {
            cloud_name,
            upload_preset,
            folder_root: get_env_or_default("CLOUDINARY_FOLDER", DEFAULT_CLOUDINARY_FOLDER),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither variable is set.
pub fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate that a secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
