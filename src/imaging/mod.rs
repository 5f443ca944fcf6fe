//! Image processing — pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image` decoder header + EXIF orientation |
//! | **Collage** | `resize_to_fill` tiles on a white canvas + frames and badges |
//! | **Face blur** | `imageops::blur` on padded face regions + numbered badges |
//! | **Encode** | JPEG via `image::codecs::jpeg` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for grid and face-region geometry (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Overlay**: Frame, badge, and bitmap-text drawing
//! - **Operations**: Stateless pixel functions combining calculations and overlays
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
pub mod operations;
pub mod overlay;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{GridShape, PixelRect, canvas_size, face_rect, grid_shape, tile_origin};
pub use params::{CollageLayout, CollageParams, FaceBlurParams, Quality, TileSource};
pub use rust_backend::RustBackend;
