//! Cloudinary image hosting client.
//!
//! Uploads are signed with SHA-1 over the sorted request parameters plus the
//! API secret, as Cloudinary requires. Validation happens before any bytes
//! leave the process; an upload failure is fatal to the parent request.

use chrono::Utc;
use comunimapp_common::config::CloudinaryConfig;
use comunimapp_common::{AppError, AppResult};
use reqwest::multipart;
use serde::Deserialize;
use sha1::{Digest, Sha1};

/// Accepted image extensions.
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

/// Maximum size per image, 5 MB.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const CLOUDINARY_API: &str = "https://api.cloudinary.com/v1_1";

/// An image accepted for upload.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Original filename.
    pub filename: String,
    /// Raw bytes.
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    /// Validate extension and size before upload.
    pub fn validate(&self) -> AppResult<()> {
        let extension = self
            .filename
            .rsplit('.')
            .next()
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(AppError::Validation(format!(
                "Unsupported image type for {}: allowed extensions are jpg, jpeg, png, gif",
                self.filename
            )));
        }
        if self.bytes.len() > MAX_IMAGE_BYTES {
            return Err(AppError::Validation(format!(
                "Image {} exceeds the 5 MB limit",
                self.filename
            )));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// Cloudinary media service.
#[derive(Clone)]
pub struct MediaService {
    config: Option<CloudinaryConfig>,
    http_client: reqwest::Client,
}

impl MediaService {
    /// Create a media service. `None` config disables uploads.
    #[must_use]
    pub fn new(config: Option<CloudinaryConfig>) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    /// Whether Cloudinary is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Validate and upload a batch of images, returning their secure URLs.
    ///
    /// `kind` and `username` choose the folder, mirroring the
    /// `comunimapp/{kind}/{username}` layout of the hosting account.
    pub async fn upload_all(
        &self,
        images: Vec<UploadedImage>,
        kind: &str,
        username: &str,
    ) -> AppResult<Vec<String>> {
        for image in &images {
            image.validate()?;
        }
        let mut urls = Vec::with_capacity(images.len());
        for image in images {
            urls.push(self.upload(image, kind, username).await?);
        }
        Ok(urls)
    }

    /// Upload a single image.
    pub async fn upload(
        &self,
        image: UploadedImage,
        kind: &str,
        username: &str,
    ) -> AppResult<String> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| AppError::Config("Cloudinary not configured".to_string()))?;

        image.validate()?;

        let now = Utc::now();
        let folder = format!("{}/{kind}/{username}", config.folder);
        let public_id = format!("{}_{}", now.format("%Y%m%d_%H%M%S"), image.filename);
        let timestamp = now.timestamp().to_string();

        // Parameters must be signed in lexicographic order.
        let to_sign = format!(
            "folder={folder}&public_id={public_id}&timestamp={timestamp}{}",
            config.api_secret
        );
        let signature = sha1_hex(&to_sign);

        let filename = image.filename.clone();
        let form = multipart::Form::new()
            .part(
                "file",
                multipart::Part::bytes(image.bytes).file_name(image.filename),
            )
            .text("api_key", config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder)
            .text("public_id", public_id)
            .text("signature", signature);

        let url = format!("{CLOUDINARY_API}/{}/image/upload", config.cloud_name);
        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("cloudinary upload {filename}: {e}")))?;

        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "cloudinary upload {filename}: {detail}"
            )));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("cloudinary upload {filename}: {e}")))?;
        Ok(uploaded.secure_url)
    }

    /// Best-effort deletion of a hosted image, given its secure URL.
    ///
    /// Failures are logged and swallowed; stale images on the CDN are
    /// acceptable, blocked deletions are not.
    pub async fn destroy(&self, secure_url: &str) {
        let Some(config) = self.config.as_ref() else {
            return;
        };
        let Some(public_id) = public_id_from_url(secure_url) else {
            tracing::warn!(url = secure_url, "Could not derive Cloudinary public id");
            return;
        };

        let timestamp = Utc::now().timestamp().to_string();
        let to_sign = format!(
            "public_id={public_id}&timestamp={timestamp}{}",
            config.api_secret
        );
        let signature = sha1_hex(&to_sign);

        let form = multipart::Form::new()
            .text("public_id", public_id)
            .text("api_key", config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature);

        let url = format!("{CLOUDINARY_API}/{}/image/destroy", config.cloud_name);
        match self.http_client.post(&url).multipart(form).send().await {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(url = secure_url, "Cloudinary destroy rejected");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(url = secure_url, error = %e, "Cloudinary destroy failed"),
        }
    }
}

fn sha1_hex(input: &str) -> String {
    let digest = Sha1::digest(input.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Extract the full public id (folder included, extension stripped) from a
/// Cloudinary secure URL of the form
/// `https://res.cloudinary.com/{cloud}/image/upload/v123/{folder}/{name}.jpg`.
fn public_id_from_url(secure_url: &str) -> Option<String> {
    let parts: Vec<&str> = secure_url.split('/').collect();
    let upload_index = parts.iter().position(|p| *p == "upload")?;
    let mut tail: Vec<&str> = parts.get(upload_index + 1..)?.to_vec();
    if tail.first().is_some_and(|p| {
        p.starts_with('v') && p.len() > 1 && p[1..].chars().all(|c| c.is_ascii_digit())
    }) {
        tail.remove(0);
    }
    if tail.is_empty() {
        return None;
    }
    let last = tail.pop()?;
    let stem = last.rsplit_once('.').map_or(last, |(stem, _)| stem);
    tail.push(stem);
    Some(tail.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_extension_and_size() {
        let ok = UploadedImage {
            filename: "photo.JPG".to_string(),
            bytes: vec![0; 128],
        };
        assert!(ok.validate().is_ok());

        let bad_ext = UploadedImage {
            filename: "document.pdf".to_string(),
            bytes: vec![0; 128],
        };
        assert!(matches!(bad_ext.validate(), Err(AppError::Validation(_))));

        let too_big = UploadedImage {
            filename: "huge.png".to_string(),
            bytes: vec![0; MAX_IMAGE_BYTES + 1],
        };
        assert!(matches!(too_big.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_public_id_from_url() {
        let url = "https://res.cloudinary.com/demo/image/upload/v1700000000/comunimapp/reports/ana/20240101_120000_foto.jpg";
        assert_eq!(
            public_id_from_url(url).as_deref(),
            Some("comunimapp/reports/ana/20240101_120000_foto")
        );
    }

    #[test]
    fn test_public_id_without_version_segment() {
        let url = "https://res.cloudinary.com/demo/image/upload/comunimapp/case_updates/ana/x.png";
        assert_eq!(
            public_id_from_url(url).as_deref(),
            Some("comunimapp/case_updates/ana/x")
        );
    }

    #[test]
    fn test_sha1_signature() {
        // Known SHA-1 of "abc".
        assert_eq!(sha1_hex("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }
}
