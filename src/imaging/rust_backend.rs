//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) + EXIF orientation | `image` (`ImageDecoder::orientation`, `apply_orientation`) |
//! | Tile cover-fit | `image::DynamicImage::resize_to_fill` (Lanczos3) |
//! | Face blur | `image::imageops::blur` on a cropped patch |
//! | Frames and badges | `imageproc::drawing` + built-in bitmap font |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//!
//! Collage tiles are decoded and resized in parallel on the rayon pool.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::operations::{
    annotate_faces, blur_region, build_collage_canvas, decode_oriented, encode_jpeg, identify,
    resize_to_tile,
};
use super::params::{CollageParams, FaceBlurParams};
use image::RgbImage;
use rayon::prelude::*;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
        identify(bytes)
    }

    fn render_collage(&self, params: &CollageParams) -> Result<Vec<u8>, BackendError> {
        let size = params.layout.tile_size;
        let tiles: Vec<RgbImage> = params
            .tiles
            .par_iter()
            .map(|tile| decode_oriented(&tile.bytes).map(|img| resize_to_tile(&img, size)))
            .collect::<Result<_, _>>()?;
        let labels: Vec<String> = params.tiles.iter().map(|t| t.label.clone()).collect();
        let canvas = build_collage_canvas(&tiles, &labels, &params.layout);
        encode_jpeg(&canvas, params.quality)
    }

    fn blur_faces(&self, params: &FaceBlurParams) -> Result<Vec<u8>, BackendError> {
        let mut img = decode_oriented(&params.source)?.to_rgb8();
        for region in &params.regions {
            blur_region(&mut img, *region, params.sigma);
        }
        annotate_faces(&mut img, &params.regions);
        encode_jpeg(&img, params.quality)
    }
}
