//! Upload storage layout and the upload-path allow-list.
//!
//! Every image the pipeline touches lives in one flat directory,
//! `<root>/uploads/`. Callers hand us paths in the public form the web layer
//! serves (`/uploads/<file>`) or the relative storage form (`uploads/<file>`).
//! Anything else (OS paths, URLs, nested or traversing paths) is refused, and
//! the caller keeps using its original value.
//!
//! ```text
//! "/uploads/a.jpg"        → Some(uploads/a.jpg)
//! "  uploads/a.jpg  "     → Some(uploads/a.jpg)
//! "/var/data/a.jpg"       → None
//! "uploads/../secret"     → None
//! "https://cdn/x.jpg"     → None
//! ```

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Name of the uploads directory under the data root.
pub const UPLOADS_DIR: &str = "uploads";

/// Default data root when neither `DATA_DIR` nor a config value is given.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Where the pipeline reads sources and writes derived artifacts.
///
/// Constructed once at startup and passed to each builder; nothing in the
/// pipeline reads the environment on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub root_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Absolute-or-relative path of the uploads directory.
    pub fn uploads_dir(&self) -> PathBuf {
        self.root_dir.join(UPLOADS_DIR)
    }

    /// Filesystem location of a canonical upload path.
    pub fn resolve(&self, path: &UploadPath) -> PathBuf {
        self.root_dir.join(path.relative())
    }

    /// Create `<root>/uploads/` if it does not exist yet. Idempotent.
    pub async fn ensure_uploads_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(self.uploads_dir()).await
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

/// A validated path of the form `uploads/<filename>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadPath {
    file_name: String,
}

impl UploadPath {
    /// Build from a bare filename. Returns `None` unless the name is a single
    /// plain path segment.
    pub fn from_file_name(name: &str) -> Option<Self> {
        is_plain_segment(name).then(|| Self {
            file_name: name.to_string(),
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Filename without its final extension (`a.b.png` → `a.b`).
    pub fn stem(&self) -> &str {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.file_name)
    }

    /// Storage-relative form: `uploads/<filename>`.
    pub fn relative(&self) -> String {
        format!("{UPLOADS_DIR}/{}", self.file_name)
    }

    /// Public form served by the web layer: `/uploads/<filename>`.
    pub fn public(&self) -> String {
        format!("/{UPLOADS_DIR}/{}", self.file_name)
    }
}

impl fmt::Display for UploadPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.relative())
    }
}

/// Normalize an externally supplied path into a canonical upload path.
///
/// Accepts `/uploads/<name>` and `uploads/<name>` after trimming
/// whitespace. This is an allow-list: every other shape returns `None`.
pub fn normalize_upload_path(raw: &str) -> Option<UploadPath> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let without_slash = trimmed.strip_prefix('/').unwrap_or(trimmed);
    let name = without_slash.strip_prefix("uploads/")?;
    UploadPath::from_file_name(name)
}

/// Whether `path` names an existing regular file.
pub async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

/// Replace `target` with `bytes` so readers see either the old file or the
/// complete new one, never a partial write.
///
/// The bytes go to a hidden temp file in the same directory, which is then
/// renamed over `target`. Concurrent writers each use their own temp file and
/// the last rename wins.
pub async fn write_atomic(target: &Path, bytes: Vec<u8>) -> io::Result<()> {
    let target = target.to_path_buf();
    tokio::task::spawn_blocking(move || -> io::Result<()> {
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::Builder::new()
            .prefix(".studio-refs-")
            .suffix(".part")
            .tempfile_in(dir)?;
        tmp.write_all(&bytes)?;
        // Temp files start out owner-only; derived images are served like uploads.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o644))?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(io::Error::other)?
}

fn is_plain_segment(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
