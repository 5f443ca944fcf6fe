//! Shared test utilities.
//!
//! Synthetic images are generated in memory with the `image` encoders, so
//! tests need no fixture files. Storage roots live in a [`TempDir`].
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let (tmp, storage) = temp_storage();
//! write_jpeg(&storage, "dawn.jpg", 64, 48);
//! ```

use crate::storage::StorageConfig;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage};
use std::fs::{self, OpenOptions};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::TempDir;

// =========================================================================
// Synthetic images
// =========================================================================

/// A diagonal gradient, so blurs and crops visibly change pixels.
pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    })
}

/// JPEG-encoded gradient.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 90)
        .encode_image(&gradient(width, height))
        .unwrap();
    out
}

/// PNG-encoded gradient.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    gradient(width, height)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

// =========================================================================
// Storage fixtures
// =========================================================================

/// A storage root in a fresh temp directory, with `uploads/` created.
pub fn temp_storage() -> (TempDir, StorageConfig) {
    let tmp = TempDir::new().unwrap();
    let storage = StorageConfig::new(tmp.path());
    fs::create_dir_all(storage.uploads_dir()).unwrap();
    (tmp, storage)
}

/// Write a JPEG gradient to `uploads/<name>` and return its filesystem path.
pub fn write_jpeg(storage: &StorageConfig, name: &str, width: u32, height: u32) -> PathBuf {
    let path = storage.uploads_dir().join(name);
    fs::write(&path, jpeg_bytes(width, height)).unwrap();
    path
}

/// Set a file's modification time.
pub fn set_mtime(path: &Path, time: SystemTime) {
    OpenOptions::new()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

/// A file's modification time.
pub fn mtime(path: &Path) -> SystemTime {
    fs::metadata(path).unwrap().modified().unwrap()
}
