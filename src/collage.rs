//! Identity reference collage.
//!
//! Several reference photos of the same subject are arranged into one
//! labeled grid image, so a generation model sees them as a single input.
//!
//! ## Pipeline
//!
//! ```text
//! items ──► normalize + existence check ──► cache key ──► fresh? ──► path
//!                                                           │
//!                                                           ▼
//!                                      read sources ──► render ──► write
//! ```
//!
//! Unusable requests (too few items, a path outside `uploads/`, a missing
//! source) produce `Ok(None)`, and the caller proceeds without a collage.
//! Only compositing and write failures are errors.
//!
//! The output name is `identity-collage-<version>-<hash>.jpg`, where the hash
//! covers the ordered `(index, role, path)` triples. Reordering the items
//! therefore produces a different collage.

use crate::cache::{CacheKey, CacheOutcome, is_fresh};
use crate::config::CollageConfig;
use crate::error::Result;
use crate::imaging::{CollageParams, ImageBackend, TileSource};
use crate::naming::collage_filename;
use crate::storage::{
    StorageConfig, UPLOADS_DIR, UploadPath, is_file, normalize_upload_path, write_atomic,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// One reference photo and its place in the collage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceItem {
    /// Number shown on the tile badge.
    pub index: u32,
    /// Optional role shown after the number, e.g. `identity`.
    pub role: Option<String>,
    /// Upload path as supplied by the caller.
    pub image: String,
}

impl ReferenceItem {
    pub fn new(index: u32, role: Option<&str>, image: impl Into<String>) -> Self {
        Self {
            index,
            role: role.map(str::to_string),
            image: image.into(),
        }
    }

    fn role(&self) -> Option<&str> {
        self.role.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }

    /// Badge text: `#<index> <role>` or `#<index>`.
    pub fn label(&self) -> String {
        match self.role() {
            Some(role) => format!("#{} {role}", self.index),
            None => format!("#{}", self.index),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseReferenceError {
    #[error("expected INDEX[:ROLE]=PATH, got {0:?}")]
    Shape(String),
    #[error("invalid index {0:?}")]
    Index(String),
}

/// Parses the CLI form `INDEX[:ROLE]=PATH`, e.g. `1:identity=/uploads/a.jpg`.
impl FromStr for ReferenceItem {
    type Err = ParseReferenceError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (head, image) = s
            .split_once('=')
            .filter(|(_, image)| !image.is_empty())
            .ok_or_else(|| ParseReferenceError::Shape(s.to_string()))?;
        let (index, role) = match head.split_once(':') {
            Some((index, role)) => (index, Some(role)),
            None => (head, None),
        };
        let index = index
            .trim()
            .parse()
            .map_err(|_| ParseReferenceError::Index(index.to_string()))?;
        Ok(Self::new(index, role, image))
    }
}

/// Result of a successful [`CollageBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollageOutcome {
    /// Public path, `/uploads/identity-collage-…jpg`.
    pub path: String,
    /// [`CacheOutcome::Hit`] or [`CacheOutcome::Rendered`].
    pub status: CacheOutcome,
}

struct ResolvedItem<'a> {
    item: &'a ReferenceItem,
    upload: UploadPath,
    path: PathBuf,
}

/// Builds identity collages into the uploads directory.
pub struct CollageBuilder {
    storage: StorageConfig,
    config: CollageConfig,
    backend: Arc<dyn ImageBackend>,
}

impl CollageBuilder {
    pub fn new(storage: StorageConfig, config: CollageConfig, backend: Arc<dyn ImageBackend>) -> Self {
        Self {
            storage,
            config,
            backend,
        }
    }

    /// Return the public path of the collage for `items`, building it if
    /// needed. `None` means the request is not usable.
    pub async fn get_or_create(&self, items: &[ReferenceItem]) -> Result<Option<String>> {
        Ok(self.build(items).await?.map(|outcome| outcome.path))
    }

    /// Like [`get_or_create`](Self::get_or_create), also reporting whether
    /// the collage was reused or rendered.
    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn build(&self, items: &[ReferenceItem]) -> Result<Option<CollageOutcome>> {
        if items.len() < self.config.min_items {
            debug!(min = self.config.min_items, "too few reference items for a collage");
            return Ok(None);
        }
        let Some(resolved) = self.resolve_items(items).await else {
            return Ok(None);
        };

        let key = resolved.iter().fold(CacheKey::new(&self.config.version), |key, r| {
            key.line(&[
                r.item.index.to_string().as_str(),
                r.item.role().unwrap_or(""),
                r.upload.relative().as_str(),
            ])
        });
        let file_name = collage_filename(&self.config.version, &key.finish());
        let target = self.storage.uploads_dir().join(&file_name);
        let public = format!("/{UPLOADS_DIR}/{file_name}");

        self.storage.ensure_uploads_dir().await?;
        let sources: Vec<&Path> = resolved.iter().map(|r| r.path.as_path()).collect();
        if is_fresh(&target, &sources).await? {
            debug!(path = %public, "collage cache hit");
            return Ok(Some(CollageOutcome {
                path: public,
                status: CacheOutcome::Hit,
            }));
        }

        let mut tiles = Vec::with_capacity(resolved.len());
        for r in &resolved {
            tiles.push(TileSource {
                bytes: tokio::fs::read(&r.path).await?,
                label: r.item.label(),
            });
        }
        let params = CollageParams {
            tiles,
            layout: self.config.layout(),
            quality: self.config.jpeg_quality(),
        };
        let backend = Arc::clone(&self.backend);
        let encoded = tokio::task::spawn_blocking(move || backend.render_collage(&params)).await??;
        write_atomic(&target, encoded).await?;

        info!(path = %public, tiles = resolved.len(), "rendered identity collage");
        Ok(Some(CollageOutcome {
            path: public,
            status: CacheOutcome::Rendered,
        }))
    }

    /// Normalize every item and check its source exists. `None` as soon as
    /// one item is unusable.
    async fn resolve_items<'a>(&self, items: &'a [ReferenceItem]) -> Option<Vec<ResolvedItem<'a>>> {
        let mut resolved = Vec::with_capacity(items.len());
        for item in items {
            let Some(upload) = normalize_upload_path(&item.image) else {
                debug!(image = %item.image, "reference is not an upload path");
                return None;
            };
            let path = self.storage.resolve(&upload);
            if !is_file(&path).await {
                debug!(image = %item.image, "reference source missing");
                return None;
            }
            resolved.push(ResolvedItem { item, upload, path });
        }
        Some(resolved)
    }
}
