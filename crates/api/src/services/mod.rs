//! Business logic services.
//!
//! Services borrow their collaborators (store, mailer, token issuer) from
//! `AppState` and are cheap to construct per request.

pub mod auth;
pub mod email;
pub mod media;
pub mod membership;
pub mod oauth;

pub use auth::{AuthError, AuthService, AuthSession, TokenIssuer, TokenPair};
pub use email::{EmailError, Mailer, SmtpMailer};
pub use media::{CloudinaryClient, MediaError, MediaStore};
pub use membership::{MembershipError, MembershipService};
pub use oauth::{OAuthClient, OAuthError, ProviderProfile};
