//! Pure geometry for collages and face regions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::CollageLayout;
use crate::detect::FaceBox;

/// Number of columns and rows in a collage grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    pub columns: u32,
    pub rows: u32,
}

/// Grid shape for `count` tiles.
///
/// One or two tiles sit in a single row; three or more use two columns and
/// as many rows as needed.
///
/// ```
/// # use studio_refs::imaging::{GridShape, grid_shape};
/// assert_eq!(grid_shape(2), GridShape { columns: 2, rows: 1 });
/// assert_eq!(grid_shape(5), GridShape { columns: 2, rows: 3 });
/// ```
pub fn grid_shape(count: u32) -> GridShape {
    let columns = count.min(2);
    let rows = if columns == 0 {
        0
    } else {
        count.div_ceil(columns)
    };
    GridShape { columns, rows }
}

/// Length of one canvas axis holding `cells` tiles.
fn axis_length(cells: u32, layout: &CollageLayout) -> u32 {
    layout.outer * 2 + cells * layout.tile_size + cells.saturating_sub(1) * layout.gap
}

/// Canvas `(width, height)` for `count` tiles.
///
/// ```
/// # use studio_refs::imaging::{CollageLayout, canvas_size};
/// // 2 × 448 tiles, 16px gap, 20px margin on each side
/// assert_eq!(canvas_size(2, &CollageLayout::default()), (952, 488));
/// ```
pub fn canvas_size(count: u32, layout: &CollageLayout) -> (u32, u32) {
    let shape = grid_shape(count);
    (
        axis_length(shape.columns, layout),
        axis_length(shape.rows, layout),
    )
}

/// Top-left pixel of tile `index` in a grid with `columns` columns.
pub fn tile_origin(index: u32, columns: u32, layout: &CollageLayout) -> (u32, u32) {
    let columns = columns.max(1);
    let col = index % columns;
    let row = index / columns;
    let step = layout.tile_size + layout.gap;
    (layout.outer + col * step, layout.outer + row * step)
}

/// An axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Convert a normalized face box into the pixel region to blur.
///
/// The box grows by `padding_ratio` of its own width/height on every side,
/// is scaled to the `width × height` image (floor for the leading edge, ceil
/// for the trailing edge), and is clamped to the image. Regions one pixel
/// wide or tall, or entirely outside the image, yield `None`.
pub fn face_rect(face: &FaceBox, width: u32, height: u32, padding_ratio: f64) -> Option<PixelRect> {
    if width == 0 || height == 0 {
        return None;
    }
    let (w, h) = (width as f64, height as f64);
    let pad_x = face.width * padding_ratio;
    let pad_y = face.height * padding_ratio;

    let left = ((face.x - pad_x) * w).floor().clamp(0.0, w - 1.0);
    let top = ((face.y - pad_y) * h).floor().clamp(0.0, h - 1.0);
    let right = ((face.x + face.width + pad_x) * w).ceil().clamp(1.0, w);
    let bottom = ((face.y + face.height + pad_y) * h).ceil().clamp(1.0, h);

    let rect_w = right - left;
    let rect_h = bottom - top;
    if !(rect_w > 1.0 && rect_h > 1.0) {
        return None;
    }
    Some(PixelRect {
        left: left as u32,
        top: top as u32,
        width: rect_w as u32,
        height: rect_h as u32,
    })
}
