//! Parameter types for image operations.
//!
//! These structs describe *what* to render, not *how*. They are the
//! interface between the pipelines ([`collage`](crate::collage),
//! [`sanitize`](crate::sanitize)), which decide what to produce, and the
//! [`backend`](super::backend), which does the pixel work. Swapping in a
//! recording mock backend therefore needs no change to pipeline logic.
//!
//! ## Types
//!
//! - [`Quality`] — JPEG quality (1–100, default 90). Clamped on construction.
//! - [`CollageLayout`] — tile size, gap, and outer margin of the grid.
//! - [`CollageParams`] — source bytes and labels for every tile.
//! - [`FaceBlurParams`] — source bytes, pixel regions to blur, blur sigma.

use super::calculations::PixelRect;

/// Quality setting for JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Grid geometry of a collage, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollageLayout {
    /// Edge length of every square tile.
    pub tile_size: u32,
    /// Space between neighbouring tiles.
    pub gap: u32,
    /// Margin between the canvas edge and the outermost tiles.
    pub outer: u32,
}

impl Default for CollageLayout {
    fn default() -> Self {
        Self {
            tile_size: 448,
            gap: 16,
            outer: 20,
        }
    }
}

/// One collage tile: encoded source bytes plus the badge label.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSource {
    pub bytes: Vec<u8>,
    pub label: String,
}

/// Full specification of a collage render.
#[derive(Debug, Clone, PartialEq)]
pub struct CollageParams {
    /// Tiles in layout order (row-major).
    pub tiles: Vec<TileSource>,
    pub layout: CollageLayout,
    pub quality: Quality,
}

/// Full specification of a face-blur render.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceBlurParams {
    pub source: Vec<u8>,
    /// Pixel regions to blur, already padded and clamped to the image.
    pub regions: Vec<PixelRect>,
    /// Gaussian blur standard deviation.
    pub sigma: f32,
    pub quality: Quality,
}
