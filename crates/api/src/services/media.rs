//! Media uploads (user avatars) to Cloudinary.
//!
//! Uses unsigned uploads through an upload preset, so no API secret is held
//! by the service.

use serde::Deserialize;
use thiserror::Error;

use crate::config::CloudinaryConfig;

/// Cloudinary upload API base URL.
const BASE_URL: &str = "https://api.cloudinary.com/v1_1";

/// Errors that can occur when uploading media.
#[derive(Debug, Error)]
pub enum MediaError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Remote storage for user-supplied images.
#[allow(async_fn_in_trait)]
pub trait MediaStore {
    /// Upload a `data:` URL into `folder` and return the public URL.
    async fn upload_data_url(&self, data_url: &str, folder: &str) -> Result<String, MediaError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// Cloudinary API client.
#[derive(Clone)]
pub struct CloudinaryClient {
    client: reqwest::Client,
    upload_url: String,
    upload_preset: String,
    folder_root: String,
}

impl CloudinaryClient {
    /// Create a new Cloudinary client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &CloudinaryConfig) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            upload_url: format!("{BASE_URL}/{}/image/upload", config.cloud_name),
            upload_preset: config.upload_preset.clone(),
            folder_root: config.folder_root.clone(),
        })
    }
}

impl MediaStore for CloudinaryClient {
    async fn upload_data_url(&self, data_url: &str, folder: &str) -> Result<String, MediaError> {
        let folder = format!("{}/{folder}", self.folder_root);
        let form = [
            ("file", data_url),
            ("upload_preset", self.upload_preset.as_str()),
            ("folder", folder.as_str()),
        ];

        let response = self.client.post(&self.upload_url).form(&form).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MediaError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| MediaError::Parse(e.to_string()))?;

        tracing::debug!(folder = %folder, url = %uploaded.secure_url, "Uploaded media");
        Ok(uploaded.secure_url)
    }
}

/// [`MediaStore`] that returns a fixed URL, or fails when built with `failing`.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct FakeMediaStore {
    url: Option<String>,
}

#[cfg(any(test, feature = "test-utils"))]
impl FakeMediaStore {
    #[must_use]
    pub fn returning(url: &str) -> Self {
        Self {
            url: Some(url.to_owned()),
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self { url: None }
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl MediaStore for FakeMediaStore {
    async fn upload_data_url(&self, _data_url: &str, _folder: &str) -> Result<String, MediaError> {
        self.url.clone().ok_or_else(|| MediaError::Api {
            status: 500,
            message: "upload rejected".to_owned(),
        })
    }
}
