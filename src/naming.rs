//! Filenames of derived artifacts.
//!
//! Derived files sit next to their sources in `uploads/` and are named so
//! that the name alone identifies the inputs:
//!
//! - `identity-collage-v2-1a2b3c4d5e6f.jpg` — collage, keyed by pipeline
//!   version and a hash of the ordered reference items
//! - `dawn.scene-noface.jpg` — sanitized copy of `dawn.<ext>`
//!
//! Sanitized output is always `.jpg`, whatever the source format.

use crate::storage::UploadPath;

/// Prefix shared by every collage artifact.
pub const COLLAGE_PREFIX: &str = "identity-collage";

/// Substring that marks a file as already sanitized.
pub const SANITIZED_MARKER: &str = ".scene-noface.";

/// `identity-collage-<version>-<hash>.jpg`
pub fn collage_filename(version: &str, hash: &str) -> String {
    format!("{COLLAGE_PREFIX}-{version}-{hash}.jpg")
}

/// `<stem>.scene-noface.jpg` for the given source.
pub fn sanitized_filename(source: &UploadPath) -> String {
    format!("{}{SANITIZED_MARKER}jpg", source.stem())
}

/// Whether the path already names a sanitized artifact.
pub fn is_sanitized(path: &UploadPath) -> bool {
    path.relative().contains(SANITIZED_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::normalize_upload_path;

    fn upload(raw: &str) -> UploadPath {
        normalize_upload_path(raw).unwrap()
    }

    #[test]
    fn collage_name_embeds_version_and_hash() {
        assert_eq!(
            collage_filename("v2", "0123456789ab"),
            "identity-collage-v2-0123456789ab.jpg"
        );
    }

    #[test]
    fn sanitized_name_from_jpeg() {
        assert_eq!(sanitized_filename(&upload("/uploads/dawn.jpg")), "dawn.scene-noface.jpg");
    }

    #[test]
    fn sanitized_name_normalizes_extension() {
        assert_eq!(sanitized_filename(&upload("uploads/dawn.PNG")), "dawn.scene-noface.jpg");
        assert_eq!(sanitized_filename(&upload("uploads/dawn.webp")), "dawn.scene-noface.jpg");
    }

    #[test]
    fn sanitized_name_without_extension() {
        assert_eq!(sanitized_filename(&upload("uploads/raw")), "raw.scene-noface.jpg");
    }

    #[test]
    fn marker_detection() {
        assert!(is_sanitized(&upload("/uploads/dawn.scene-noface.jpg")));
        assert!(!is_sanitized(&upload("/uploads/dawn.jpg")));
        assert!(!is_sanitized(&upload("/uploads/scene-noface.jpg")));
    }

    #[test]
    fn sanitizing_a_sanitized_name_is_detectable() {
        let first = upload("/uploads/dawn.jpg");
        let derived = UploadPath::from_file_name(&sanitized_filename(&first)).unwrap();
        assert!(is_sanitized(&derived));
    }
}
