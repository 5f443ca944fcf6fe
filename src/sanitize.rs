//! Scene face sanitizer.
//!
//! Scene reference images must not leak anyone's face into a generated
//! image. The sanitizer writes a copy of each scene image with every
//! detected face blurred and outlined, numbered `S1`, `S2`, …, and hands back
//! the path of that copy.
//!
//! ## Decision table
//!
//! | input | result | status |
//! |---|---|---|
//! | not an upload path | original string | [`Passthrough`](SanitizeStatus::Passthrough) |
//! | already `*.scene-noface.*` | public form | [`AlreadySanitized`](SanitizeStatus::AlreadySanitized) |
//! | source missing or unreadable | original string | [`Passthrough`](SanitizeStatus::Passthrough) |
//! | fresh derived file exists | derived path | [`Cached`](SanitizeStatus::Cached) |
//! | no faces, or detector unavailable | byte copy | [`Copied`](SanitizeStatus::Copied) |
//! | faces found | blurred JPEG | [`Blurred`](SanitizeStatus::Blurred) |
//!
//! Detection is best-effort. A detector that times out, crashes, or is not
//! available on this platform is treated as "no faces", so the pipeline
//! always yields a usable image. Compositing and write failures are `Err`
//! from [`FaceSanitizer::sanitize`]; [`warm`](FaceSanitizer::warm) and
//! [`sanitize_batch`](FaceSanitizer::sanitize_batch) log them and fall back
//! to the original path.

use crate::cache::is_fresh;
use crate::config::SanitizerConfig;
use crate::detect::FaceDetector;
use crate::error::Result;
use crate::imaging::{FaceBlurParams, ImageBackend, PixelRect, face_rect};
use crate::naming::{is_sanitized, sanitized_filename};
use crate::storage::{StorageConfig, UPLOADS_DIR, is_file, normalize_upload_path, write_atomic};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What [`FaceSanitizer::sanitize_with_outcome`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizeStatus {
    /// Input returned unchanged.
    Passthrough,
    /// Input already names a sanitized file.
    AlreadySanitized,
    /// A fresh sanitized file already existed.
    Cached,
    /// No faces: the source was copied byte for byte.
    Copied,
    /// Faces were blurred and annotated.
    Blurred { faces: usize },
}

impl fmt::Display for SanitizeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passthrough => f.write_str("passthrough"),
            Self::AlreadySanitized => f.write_str("already sanitized"),
            Self::Cached => f.write_str("cached"),
            Self::Copied => f.write_str("copied, no faces"),
            Self::Blurred { faces: 1 } => f.write_str("blurred 1 face"),
            Self::Blurred { faces } => write!(f, "blurred {faces} faces"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizeOutcome {
    /// Path to use downstream: the sanitized file's public path, or the
    /// caller's original string.
    pub path: String,
    pub status: SanitizeStatus,
}

impl SanitizeOutcome {
    fn passthrough(raw: &str) -> Self {
        Self {
            path: raw.to_string(),
            status: SanitizeStatus::Passthrough,
        }
    }
}

/// Produces face-free copies of scene images in the uploads directory.
pub struct FaceSanitizer {
    storage: StorageConfig,
    config: SanitizerConfig,
    backend: Arc<dyn ImageBackend>,
    detector: Arc<dyn FaceDetector>,
}

impl FaceSanitizer {
    pub fn new(
        storage: StorageConfig,
        config: SanitizerConfig,
        backend: Arc<dyn ImageBackend>,
        detector: Arc<dyn FaceDetector>,
    ) -> Self {
        Self {
            storage,
            config,
            backend,
            detector,
        }
    }

    /// Path of the face-free variant of `raw`, or `raw` itself when there is
    /// nothing to sanitize.
    pub async fn sanitize(&self, raw: &str) -> Result<String> {
        Ok(self.sanitize_with_outcome(raw).await?.path)
    }

    #[instrument(skip(self))]
    pub async fn sanitize_with_outcome(&self, raw: &str) -> Result<SanitizeOutcome> {
        let Some(source) = normalize_upload_path(raw) else {
            debug!("not an upload path");
            return Ok(SanitizeOutcome::passthrough(raw));
        };
        if is_sanitized(&source) {
            return Ok(SanitizeOutcome {
                path: source.public(),
                status: SanitizeStatus::AlreadySanitized,
            });
        }
        let source_path = self.storage.resolve(&source);
        if !is_file(&source_path).await {
            debug!("source missing");
            return Ok(SanitizeOutcome::passthrough(raw));
        }

        self.storage.ensure_uploads_dir().await?;
        let file_name = sanitized_filename(&source);
        let target = self.storage.uploads_dir().join(&file_name);
        let public = format!("/{UPLOADS_DIR}/{file_name}");
        let done = |status| SanitizeOutcome {
            path: public.clone(),
            status,
        };

        if is_fresh(&target, &[source_path.as_path()]).await? {
            debug!(path = %public, "sanitized cache hit");
            return Ok(done(SanitizeStatus::Cached));
        }

        let bytes = match tokio::fs::read(&source_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("cannot read source: {e}");
                return Ok(SanitizeOutcome::passthrough(raw));
            }
        };
        let backend = Arc::clone(&self.backend);
        let (bytes, dims) = tokio::task::spawn_blocking(move || {
            let dims = backend.identify(&bytes);
            (bytes, dims)
        })
        .await?;
        let dims = dims?;
        if dims.width == 0 || dims.height == 0 {
            debug!("source has no pixels");
            return Ok(SanitizeOutcome::passthrough(raw));
        }

        let faces = self
            .detector
            .detect(&absolute(&source_path))
            .await
            .map(|detection| detection.faces)
            .unwrap_or_default();
        if faces.is_empty() {
            write_atomic(&target, bytes).await?;
            debug!(path = %public, "no faces, copied source");
            return Ok(done(SanitizeStatus::Copied));
        }

        let regions: Vec<PixelRect> = faces
            .iter()
            .filter_map(|face| face_rect(face, dims.width, dims.height, self.config.padding_ratio))
            .collect();
        if regions.is_empty() {
            write_atomic(&target, bytes).await?;
            debug!(path = %public, detected = faces.len(), "every face region degenerate, wrote source");
            return Ok(done(SanitizeStatus::Copied));
        }

        let count = regions.len();
        let params = FaceBlurParams {
            source: bytes,
            regions,
            sigma: self.config.blur_sigma,
            quality: self.config.jpeg_quality(),
        };
        let backend = Arc::clone(&self.backend);
        let encoded = tokio::task::spawn_blocking(move || backend.blur_faces(&params)).await??;
        write_atomic(&target, encoded).await?;

        info!(path = %public, faces = count, "blurred faces");
        Ok(done(SanitizeStatus::Blurred { faces: count }))
    }

    /// Pre-populate the cache for `raw`. Never fails.
    pub async fn warm(&self, raw: Option<&str>) {
        let Some(raw) = raw else { return };
        if let Err(e) = self.sanitize(raw).await {
            warn!(path = raw, "warming sanitized image failed: {e}");
        }
    }

    /// Sanitize each path in order. A path that fails is kept as given, so the
    /// result always lines up with the input.
    pub async fn sanitize_batch(&self, paths: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(paths.len());
        for raw in paths {
            let path = match self.sanitize(raw).await {
                Ok(path) => path,
                Err(e) => {
                    warn!(path = %raw, "sanitizing failed, using original: {e}");
                    raw.clone()
                }
            };
            out.push(path);
        }
        out
    }
}

/// The detector helper runs with its own working directory.
fn absolute(path: &Path) -> std::path::PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
