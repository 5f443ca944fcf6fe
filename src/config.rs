//! Pipeline configuration.
//!
//! Handles loading, validating, and merging a `studio-refs.toml` file. Stock
//! defaults are the base layer; a user file overrides just the keys it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! data_dir = "./data"          # Root holding uploads/ (DATA_DIR / --data-dir win)
//!
//! [collage]
//! version = "v2"               # Pipeline version marker, part of every collage key
//! tile_size = 448              # Square tile edge in pixels
//! gap = 16                     # Space between tiles
//! outer_margin = 20            # Space around the grid
//! quality = 90                 # JPEG quality (1-100)
//! min_items = 2                # Fewer usable items produce no collage
//!
//! [sanitizer]
//! blur_sigma = 28.0            # Gaussian sigma for face regions
//! padding_ratio = 0.2          # Face box growth on each side, fraction of box size
//! quality = 88                 # JPEG quality (1-100)
//!
//! [detector]
//! mode = "auto"                # auto | helper | disabled
//! program = "swift"
//! script = "scripts/detect-faces.swift"  # Relative to this file
//! timeout_ms = 7000
//! max_output_bytes = 1048576
//!
//! [processing]
//! max_threads = 4              # Tile decode workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.
//!
//! A relative `detector.script` is resolved against the directory of the
//! config file that sets it. The stock script is looked up next to the
//! executable, then in the source tree the binary was built from.

use crate::imaging::{CollageLayout, Quality};
use crate::storage::{DEFAULT_DATA_DIR, UploadPath};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from TOML.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Data root; `uploads/` lives directly under it.
    pub data_dir: PathBuf,
    pub collage: CollageConfig,
    pub sanitizer: SanitizerConfig,
    pub detector: DetectorConfig,
    pub processing: ProcessingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            collage: CollageConfig::default(),
            sanitizer: SanitizerConfig::default(),
            detector: DetectorConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.collage.quality) {
            return Err(ConfigError::Validation(
                "collage.quality must be 1-100".into(),
            ));
        }
        if !(1..=100).contains(&self.sanitizer.quality) {
            return Err(ConfigError::Validation(
                "sanitizer.quality must be 1-100".into(),
            ));
        }
        if self.collage.tile_size == 0 {
            return Err(ConfigError::Validation(
                "collage.tile_size must be non-zero".into(),
            ));
        }
        if self.collage.min_items == 0 {
            return Err(ConfigError::Validation(
                "collage.min_items must be at least 1".into(),
            ));
        }
        // The version ends up inside a filename.
        let version_ok = !self.collage.version.is_empty()
            && !self.collage.version.contains(['.', '-'])
            && UploadPath::from_file_name(&self.collage.version).is_some();
        if !version_ok {
            return Err(ConfigError::Validation(format!(
                "collage.version {:?} must be a non-empty name without '.', '-' or separators",
                self.collage.version
            )));
        }
        if !(self.sanitizer.blur_sigma > 0.0 && self.sanitizer.blur_sigma.is_finite()) {
            return Err(ConfigError::Validation(
                "sanitizer.blur_sigma must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.sanitizer.padding_ratio) {
            return Err(ConfigError::Validation(
                "sanitizer.padding_ratio must be within 0-1".into(),
            ));
        }
        if self.detector.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "detector.timeout_ms must be non-zero".into(),
            ));
        }
        if self.detector.max_output_bytes == 0 {
            return Err(ConfigError::Validation(
                "detector.max_output_bytes must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Identity collage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollageConfig {
    /// Pipeline version marker. Bump to orphan every existing collage.
    pub version: String,
    pub tile_size: u32,
    pub gap: u32,
    pub outer_margin: u32,
    /// JPEG encoding quality (1 = worst, 100 = best).
    pub quality: u32,
    /// Minimum number of usable items for a collage to be worth building.
    pub min_items: usize,
}

impl Default for CollageConfig {
    fn default() -> Self {
        Self {
            version: "v2".to_string(),
            tile_size: 448,
            gap: 16,
            outer_margin: 20,
            quality: 90,
            min_items: 2,
        }
    }
}

impl CollageConfig {
    pub fn layout(&self) -> CollageLayout {
        CollageLayout {
            tile_size: self.tile_size,
            gap: self.gap,
            outer: self.outer_margin,
        }
    }

    pub fn jpeg_quality(&self) -> Quality {
        Quality::new(self.quality)
    }
}

/// Scene face sanitizer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SanitizerConfig {
    pub blur_sigma: f32,
    /// Growth of each detected box on every side, as a fraction of its size.
    pub padding_ratio: f64,
    pub quality: u32,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 28.0,
            padding_ratio: 0.2,
            quality: 88,
        }
    }
}

impl SanitizerConfig {
    pub fn jpeg_quality(&self) -> Quality {
        Quality::new(self.quality)
    }
}

/// How the face detector is chosen at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorMode {
    /// Helper on macOS when its script exists, otherwise no detection.
    #[default]
    Auto,
    /// Always run the helper.
    Helper,
    /// Never detect; every image is treated as face-free.
    Disabled,
}

/// External face detector helper settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorConfig {
    pub mode: DetectorMode,
    /// Executable to run.
    pub program: PathBuf,
    /// Script passed to `program` before the image path, if any.
    /// Relative paths are anchored by [`load_config`], not the working directory.
    pub script: Option<PathBuf>,
    pub timeout_ms: u64,
    pub max_output_bytes: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            mode: DetectorMode::Auto,
            program: PathBuf::from("swift"),
            script: Some(PathBuf::from("scripts/detect-faces.swift")),
            timeout_ms: 7000,
            max_output_bytes: 1024 * 1024,
        }
    }
}

impl DetectorConfig {
    /// Make a relative `script` absolute against `base`.
    pub fn anchor_script(&mut self, base: &Path) {
        self.script = self.script.take().map(|script| {
            if script.is_relative() {
                base.join(script)
            } else {
                script
            }
        });
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of tile-decoding workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_threads: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_threads.map(|n| n.clamp(1, cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(PipelineConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file, or stock defaults when `path` is `None`.
///
/// An explicitly named file that does not exist is an error. A relative
/// `detector.script` set in the file is anchored to the file's directory;
/// the stock script is anchored by [`default_script_base`].
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    let (overlay, config_dir) = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            let dir = std::path::absolute(path)?
                .parent()
                .map(Path::to_path_buf);
            (Some(toml::from_str::<toml::Value>(&content)?), dir)
        }
        None => (None, None),
    };
    let names_script = overlay
        .as_ref()
        .and_then(|value| value.get("detector"))
        .is_some_and(|detector| detector.get("script").is_some());

    let mut config = resolve_config(overlay)?;
    let base = match config_dir {
        Some(dir) if names_script => Some(dir),
        _ => config.detector.script.as_deref().and_then(default_script_base),
    };
    if let Some(base) = base {
        config.detector.anchor_script(&base);
    }
    Ok(config)
}

/// Where a relative helper script lives when no config file names a base:
/// the executable's directory, unless the script is only present in the
/// source tree this binary was built from.
pub fn default_script_base(script: &Path) -> Option<PathBuf> {
    let exe_dir = std::env::current_exe().ok()?.parent()?.to_path_buf();
    let source_tree = Path::new(env!("CARGO_MANIFEST_DIR"));
    if !exe_dir.join(script).exists() && source_tree.join(script).exists() {
        return Some(source_tree.to_path_buf());
    }
    Some(exe_dir)
}

/// Returns a fully-commented stock `studio-refs.toml` with all keys.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# studio-refs configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Root holding the uploads/ directory.
# The DATA_DIR environment variable and --data-dir take precedence.
data_dir = "./data"

# ---------------------------------------------------------------------------
# Identity reference collage
# ---------------------------------------------------------------------------
[collage]
# Version marker hashed into every collage filename.
# Bump it after changing the layout to stop reusing old collages.
version = "v2"

# Square tile edge, spacing between tiles, and margin around the grid (px).
tile_size = 448
gap = 16
outer_margin = 20

# JPEG quality (1 = worst, 100 = best).
quality = 90

# Requests with fewer usable items produce no collage.
min_items = 2

# ---------------------------------------------------------------------------
# Scene face sanitizer
# ---------------------------------------------------------------------------
[sanitizer]
# Gaussian blur strength applied to each face region.
blur_sigma = 28.0

# Each detected face box grows by this fraction of its size on every side.
padding_ratio = 0.2

# JPEG quality (1 = worst, 100 = best).
quality = 88

# ---------------------------------------------------------------------------
# Face detector helper
# ---------------------------------------------------------------------------
[detector]
# auto     - use the helper on macOS when the script exists
# helper   - always use the helper
# disabled - never detect faces
mode = "auto"

# The helper is run as: <program> <script> <absolute image path>
# A relative script path is resolved against this file's directory.
program = "swift"
script = "scripts/detect-faces.swift"

# Kill the helper after this long and treat the image as face-free.
timeout_ms = 7000

# Larger helper output is discarded.
max_output_bytes = 1048576

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel tile-decoding workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_threads = 4
"##
}
