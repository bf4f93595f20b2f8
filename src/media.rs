//! Base64 image payloads and the on-disk media directory.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use uuid::Uuid;

use crate::{
    constants::{IMAGE_EXTENSIONS, RECIPE_IMAGE_DIR},
    error::ApiError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

/// Accepts `data:image/<type>;base64,<payload>` or a bare base64 payload (treated as PNG).
pub fn decode_image(payload: &str) -> Result<DecodedImage, ApiError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(ApiError::Validation(String::from("Image is required")));
    }

    let (extension, data) = match payload.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| ApiError::Validation(String::from("Invalid image payload")))?;

            let media_type = header
                .strip_suffix(";base64")
                .ok_or_else(|| ApiError::Validation(String::from("Image must be base64 encoded")))?;

            let subtype = media_type
                .strip_prefix("image/")
                .ok_or_else(|| ApiError::Validation(String::from("Payload is not an image")))?;

            let extension = IMAGE_EXTENSIONS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(subtype))
                .map(|(_, extension)| *extension)
                .ok_or_else(|| {
                    ApiError::Validation(format!("Unsupported image type: {subtype}"))
                })?;

            (extension, data)
        }
        None => ("png", payload),
    };

    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|_| ApiError::Validation(String::from("Invalid image payload")))?;

    if bytes.is_empty() {
        return Err(ApiError::Validation(String::from("Image is empty")));
    }

    Ok(DecodedImage { extension, bytes })
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    url: String,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, url: &str) -> Self {
        let mut url = url.to_string();
        if !url.ends_with('/') {
            url.push('/');
        }

        Self {
            root: root.into(),
            url,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Public URL of a file stored under the media root.
    pub fn url(&self, relative: &str) -> String {
        format!("{}{}", self.url, relative.trim_start_matches('/'))
    }

    /// Writes the image under a random name and returns its path relative to the media root.
    pub async fn save_recipe_image(&self, image: &DecodedImage) -> Result<String, ApiError> {
        let relative = format!("{RECIPE_IMAGE_DIR}/{}.{}", Uuid::new_v4(), image.extension);
        let path = self.root.join(&relative);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ApiError::Internal(format!("Could not create {}: {e}", parent.display()))
            })?;
        }

        tokio::fs::write(&path, &image.bytes)
            .await
            .map_err(|e| ApiError::Internal(format!("Could not write {}: {e}", path.display())))?;

        Ok(relative)
    }

    /// Best effort; a missing file is not an error.
    pub async fn remove(&self, relative: &str) {
        let path = self.root.join(relative);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove {}: {e}", path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIXEL: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

    #[test]
    fn decodes_data_uri() {
        let image = decode_image(&format!("data:image/png;base64,{PIXEL}")).unwrap();

        assert_eq!(image.extension, "png");
        assert_eq!(&image.bytes[1..4], b"PNG");
    }

    #[test]
    fn jpeg_is_stored_as_jpg() {
        let image = decode_image(&format!("data:image/jpeg;base64,{PIXEL}")).unwrap();
        assert_eq!(image.extension, "jpg");
    }

    #[test]
    fn bare_payload_defaults_to_png() {
        let image = decode_image(PIXEL).unwrap();
        assert_eq!(image.extension, "png");
    }

    #[test]
    fn rejects_non_image_media_type() {
        let result = decode_image(&format!("data:text/plain;base64,{PIXEL}"));
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[test]
    fn rejects_unsupported_image_type() {
        let result = decode_image(&format!("data:image/tiff;base64,{PIXEL}"));
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_image("data:image/png;base64,@@@").is_err());
        assert!(decode_image("").is_err());
        assert!(decode_image("data:image/png,abc").is_err());
    }

    #[test]
    fn url_joins_media_prefix() {
        let store = MediaStore::new("/tmp/media", "/media");
        assert_eq!(
            store.url("recipes/images/a.png"),
            "/media/recipes/images/a.png"
        );
    }

    #[tokio::test]
    async fn saves_and_removes_image() {
        let root = std::env::temp_dir().join(format!("foodgram-media-{}", Uuid::new_v4()));
        let store = MediaStore::new(&root, "/media/");
        let image = decode_image(PIXEL).unwrap();

        let relative = store.save_recipe_image(&image).await.unwrap();
        assert!(relative.starts_with(RECIPE_IMAGE_DIR));
        assert!(relative.ends_with(".png"));

        let written = tokio::fs::read(root.join(&relative)).await.unwrap();
        assert_eq!(written, image.bytes);

        store.remove(&relative).await;
        assert!(!root.join(&relative).exists());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
