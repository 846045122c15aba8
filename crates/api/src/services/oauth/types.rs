//! Provider response shapes and the normalized profile.

use serde::Deserialize;

use barestore_core::Email;

use super::OAuthError;

/// Identity returned by a provider after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub email: Email,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    /// Picture URL, or a `data:` URL for providers that return raw bytes.
    pub picture: Option<String>,
}

impl ProviderProfile {
    /// `first [middle] last`, skipping absent parts.
    #[must_use]
    pub fn display_name(&self) -> String {
        [
            Some(self.first_name.as_str()),
            self.middle_name.as_deref(),
            self.last_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }

    /// True if the picture must be uploaded before it can be stored.
    #[must_use]
    pub fn has_inline_picture(&self) -> bool {
        self.picture
            .as_deref()
            .is_some_and(|p| p.starts_with("data:"))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn first_name_or_local_part(first: Option<String>, email: &Email) -> String {
    non_empty(first).unwrap_or_else(|| {
        email
            .as_str()
            .split('@')
            .next()
            .unwrap_or_default()
            .to_owned()
    })
}

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub access_token: String,
}

// =============================================================================
// Google
// =============================================================================

#[derive(Debug, Deserialize)]
pub(super) struct GoogleUserInfo {
    pub email: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub picture: Option<String>,
}

impl TryFrom<GoogleUserInfo> for ProviderProfile {
    type Error = OAuthError;

    fn try_from(info: GoogleUserInfo) -> Result<Self, Self::Error> {
        let email = Email::parse(&info.email.ok_or(OAuthError::MissingEmail)?)?;
        Ok(Self {
            first_name: first_name_or_local_part(info.given_name, &email),
            middle_name: None,
            last_name: non_empty(info.family_name),
            picture: non_empty(info.picture),
            email,
        })
    }
}

// =============================================================================
// Microsoft
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct MicrosoftProfile {
    pub mail: Option<String>,
    pub user_principal_name: Option<String>,
    pub given_name: Option<String>,
    pub surname: Option<String>,
}

impl MicrosoftProfile {
    /// Build the profile; `picture` is the photo as a `data:` URL, if any.
    pub(super) fn into_profile(self, picture: Option<String>) -> Result<ProviderProfile, OAuthError> {
        let address = non_empty(self.mail)
            .or_else(|| non_empty(self.user_principal_name))
            .ok_or(OAuthError::MissingEmail)?;
        let email = Email::parse(&address)?;
        Ok(ProviderProfile {
            first_name: first_name_or_local_part(self.given_name, &email),
            middle_name: None,
            last_name: non_empty(self.surname),
            picture,
            email,
        })
    }
}

// =============================================================================
// Facebook
// =============================================================================

#[derive(Debug, Deserialize)]
pub(super) struct FacebookPictureData {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct FacebookPicture {
    pub data: FacebookPictureData,
}

#[derive(Debug, Deserialize)]
pub(super) struct FacebookProfile {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub picture: Option<FacebookPicture>,
}

impl TryFrom<FacebookProfile> for ProviderProfile {
    type Error = OAuthError;

    fn try_from(profile: FacebookProfile) -> Result<Self, Self::Error> {
        // Accounts registered by phone have no email.
        let address = non_empty(profile.email)
            .unwrap_or_else(|| format!("{}@facebook.com", profile.id));
        let email = Email::parse(&address)?;
        Ok(Self {
            first_name: first_name_or_local_part(profile.first_name, &email),
            middle_name: non_empty(profile.middle_name),
            last_name: non_empty(profile.last_name),
            picture: profile.picture.and_then(|p| non_empty(p.data.url)),
            email,
        })
    }
}
