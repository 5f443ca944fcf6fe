//! Cache keys and freshness checks for derived artifacts.
//!
//! There is no manifest. A derived file's *name* encodes its declared
//! inputs, and its *modification time* says whether it is still valid.
//!
//! ## Cache keys
//!
//! [`CacheKey`] hashes a pipeline version marker followed by one line per
//! input item, fields joined by `|`:
//!
//! ```text
//! v2\n
//! 1|identity|uploads/a.jpg\n
//! 2|scene|uploads/b.jpg\n
//! ```
//!
//! The first 12 hex characters of the SHA-256 digest become part of the
//! filename. Bumping the version marker changes every key, so old artifacts
//! are simply never referenced again. Item order is part of the key because
//! it is layout position.
//!
//! ## Freshness
//!
//! Keys do not cover source *content*. Edits to a source image are caught by
//! [`is_fresh`]: a derived file is valid only while its mtime is at least the
//! newest source mtime.

use sha2::{Digest, Sha256};
use std::fmt;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Number of hex characters kept from the digest.
pub const KEY_LEN: usize = 12;

/// Incremental builder for a short, deterministic cache key.
#[derive(Clone)]
pub struct CacheKey {
    hasher: Sha256,
}

impl CacheKey {
    /// Start a key with the pipeline version marker line.
    pub fn new(version: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(version.as_bytes());
        hasher.update(b"\n");
        Self { hasher }
    }

    /// Feed one input item as a `|`-joined line.
    pub fn line<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                self.hasher.update(b"|");
            }
            self.hasher.update(field.as_ref().as_bytes());
        }
        self.hasher.update(b"\n");
        self
    }

    /// Hex prefix of the digest, [`KEY_LEN`] characters long.
    pub fn finish(self) -> String {
        let mut hex = format!("{:x}", self.hasher.finalize());
        hex.truncate(KEY_LEN);
        hex
    }
}

/// Whether `derived` exists and is at least as new as every source.
///
/// A missing derived file is simply stale (`Ok(false)`). A missing source
/// is an error: the caller must not judge freshness on a partial set.
pub async fn is_fresh(derived: &Path, sources: &[&Path]) -> io::Result<bool> {
    let derived_mtime = match tokio::fs::metadata(derived).await {
        Ok(meta) => meta.modified()?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    let mut newest_source = SystemTime::UNIX_EPOCH;
    for source in sources {
        let modified = tokio::fs::metadata(source).await?.modified()?;
        newest_source = newest_source.max(modified);
    }
    Ok(derived_mtime >= newest_source)
}

/// What a pipeline call did to produce its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// A fresh derived file already existed.
    Hit,
    /// The source was copied byte for byte.
    Copied,
    /// New pixels were composed and encoded.
    Rendered,
}

impl fmt::Display for CacheOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hit => f.write_str("cached"),
            Self::Copied => f.write_str("copied"),
            Self::Rendered => f.write_str("rendered"),
        }
    }
}
