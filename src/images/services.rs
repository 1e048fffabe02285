use tracing::{debug, warn};

use crate::{outfits::repo_types::file_name_of, storage::StorageClient};

/// URL prefix under which stored images are referenced.
pub const IMAGE_URL_PREFIX: &str = "/images/";

pub fn image_url(file_name: &str) -> String {
    format!("{IMAGE_URL_PREFIX}{file_name}")
}

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        "image/heif" => Some("heif"),
        "image/avif" => Some("avif"),
        _ => None,
    }
}

pub fn mime_from_ext(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        "avif" => Some("image/avif"),
        _ => None,
    }
}

/// Lower-cased extension of a file name, if it looks like one.
pub fn extension_of(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    let plausible = !stem.is_empty()
        && !ext.is_empty()
        && ext.len() <= 5
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    plausible.then(|| ext.to_ascii_lowercase())
}

pub fn content_type_for(file_name: &str) -> &'static str {
    extension_of(file_name)
        .and_then(|ext| mime_from_ext(&ext))
        .unwrap_or("application/octet-stream")
}

/// Deletes the file behind a record's image path. Failures are logged, not returned.
pub async fn remove_image_best_effort(storage: &dyn StorageClient, image_path: &str) {
    let file_name = file_name_of(image_path);
    match storage.delete_image(file_name).await {
        Ok(true) => debug!(%file_name, "image deleted"),
        Ok(false) => warn!(%file_name, "image already missing"),
        Err(e) => warn!(error = %e, %file_name, "failed to delete image"),
    }
}

#[cfg(test)]
mod image_tests {
    use super::*;

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
        assert_eq!(ext_from_mime("whatever/else"), None);
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a.JPG"), "image/jpeg");
        assert_eq!(content_type_for("a.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("b.webp"), "image/webp");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
        assert_eq!(content_type_for("c.exe"), "application/octet-stream");
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("look.PNG").as_deref(), Some("png"));
        assert_eq!(extension_of(".hidden"), None);
        assert_eq!(extension_of("weird.ex/e"), None);
        assert_eq!(extension_of("none"), None);
    }

    #[test]
    fn test_image_url() {
        assert_eq!(image_url("x.jpg"), "/images/x.jpg");
        assert_eq!(file_name_of(&image_url("x.jpg")), "x.jpg");
    }
}
