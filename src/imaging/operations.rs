//! Stateless pixel operations.
//!
//! These functions combine the pure [`calculations`](super::calculations)
//! with actual pixel work. Each one takes decoded buffers and returns new or
//! modified buffers; encoding and decoding sit at the edges
//! ([`decode_oriented`], [`encode_jpeg`]).

use super::backend::{BackendError, Dimensions};
use super::calculations::{PixelRect, canvas_size, grid_shape, tile_origin};
use super::overlay::{ANNOTATION_RED, draw_badge, draw_centered_badge, draw_frame};
use super::params::{CollageLayout, Quality};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::metadata::Orientation;
use image::{DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageReader, Rgb, RgbImage};
use std::io::Cursor;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Canvas background behind the collage tiles.
pub const CANVAS_BACKGROUND: Rgb<u8> = Rgb([0xff, 0xff, 0xff]);

/// Collage tile frame thickness.
const TILE_STROKE: u32 = 5;
/// Collage label badge: max width, height, text inset.
const TILE_BADGE_MAX_W: u32 = 180;
const TILE_BADGE_H: u32 = 36;
const TILE_BADGE_PADDING: u32 = 10;

/// Face frame thickness and the badge placed just above each face.
const FACE_STROKE: u32 = 4;
const FACE_BADGE_W: u32 = 48;
const FACE_BADGE_H: u32 = 30;

fn processing_failed(what: &str, e: impl std::fmt::Display) -> BackendError {
    BackendError::ProcessingFailed(format!("{what}: {e}"))
}

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(BackendError::Io)
}

fn swaps_axes(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH
    )
}

/// Decode an image and apply its embedded EXIF orientation.
pub fn decode_oriented(bytes: &[u8]) -> Result<DynamicImage> {
    let mut decoder = reader(bytes)?
        .into_decoder()
        .map_err(|e| processing_failed("Failed to decode", e))?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img =
        DynamicImage::from_decoder(decoder).map_err(|e| processing_failed("Failed to decode", e))?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Display dimensions without decoding pixel data.
pub fn identify(bytes: &[u8]) -> Result<Dimensions> {
    let mut decoder = reader(bytes)?
        .into_decoder()
        .map_err(|e| processing_failed("Failed to read dimensions", e))?;
    let (width, height) = decoder.dimensions();
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    Ok(if swaps_axes(orientation) {
        Dimensions {
            width: height,
            height: width,
        }
    } else {
        Dimensions { width, height }
    })
}

/// Cover-fit `img` into an exact `size × size` square.
///
/// Scales so the square is completely filled, then center-crops the
/// overflow. No letterboxing.
pub fn resize_to_tile(img: &DynamicImage, size: u32) -> RgbImage {
    img.resize_to_fill(size, size, FilterType::Lanczos3).to_rgb8()
}

/// Lay out square tiles on a white canvas and annotate each one.
///
/// Tiles must already be `layout.tile_size` square and are placed
/// row-major. Every tile gets a red frame and a badge with its label in the
/// top-left corner.
pub fn build_collage_canvas(tiles: &[RgbImage], labels: &[String], layout: &CollageLayout) -> RgbImage {
    let count = tiles.len() as u32;
    let (width, height) = canvas_size(count, layout);
    let columns = grid_shape(count).columns;
    let mut canvas = RgbImage::from_pixel(width, height, CANVAS_BACKGROUND);

    for (i, tile) in tiles.iter().enumerate() {
        let (left, top) = tile_origin(i as u32, columns, layout);
        imageops::replace(&mut canvas, tile, left as i64, top as i64);
    }

    // Overlay pass: frames and badges sit on top of every tile.
    for (i, label) in labels.iter().enumerate().take(tiles.len()) {
        let (left, top) = tile_origin(i as u32, columns, layout);
        let area = PixelRect {
            left,
            top,
            width: layout.tile_size,
            height: layout.tile_size,
        };
        draw_frame(&mut canvas, area, TILE_STROKE, ANNOTATION_RED);
        let badge = PixelRect {
            left,
            top,
            width: TILE_BADGE_MAX_W.min(layout.tile_size),
            height: TILE_BADGE_H.min(layout.tile_size),
        };
        draw_badge(&mut canvas, badge, TILE_BADGE_PADDING, label);
    }
    canvas
}

/// Gaussian-blur one rectangle of `img` in place.
///
/// The region is clipped to the image first; an empty intersection is a
/// no-op.
pub fn blur_region(img: &mut RgbImage, region: PixelRect, sigma: f32) {
    let (img_w, img_h) = img.dimensions();
    if region.left >= img_w || region.top >= img_h {
        return;
    }
    let width = region.width.min(img_w - region.left);
    let height = region.height.min(img_h - region.top);
    if width == 0 || height == 0 {
        return;
    }
    let patch = imageops::crop_imm(&*img, region.left, region.top, width, height).to_image();
    let blurred = imageops::blur(&patch, sigma);
    imageops::replace(img, &blurred, region.left as i64, region.top as i64);
}

/// Frame every blurred face and number it `S1`, `S2`, … in a badge placed
/// above the frame (or at the top edge when there is no room).
pub fn annotate_faces(img: &mut RgbImage, regions: &[PixelRect]) {
    for (i, region) in regions.iter().enumerate() {
        draw_frame(img, *region, FACE_STROKE, ANNOTATION_RED);
        let badge = PixelRect {
            left: region.left,
            top: region.top.saturating_sub(FACE_BADGE_H),
            width: FACE_BADGE_W,
            height: FACE_BADGE_H,
        };
        draw_centered_badge(img, badge, &format!("S{}", i + 1));
    }
}

/// Encode an RGB buffer as baseline JPEG.
pub fn encode_jpeg(img: &RgbImage, quality: Quality) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.value() as u8)
        .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgb8)
        .map_err(|e| processing_failed("JPEG encode failed", e))?;
    Ok(out)
}
