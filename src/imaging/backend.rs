//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations the pipelines
//! need: identify, render a collage, and blur faces.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend) — pure Rust, built on
//! the `image` and `imageproc` crates. Backends work on in-memory bytes;
//! reading sources and writing results is the pipelines' job.

use super::params::{CollageParams, FaceBlurParams};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Implementations must be `Send + Sync`: pipelines share one backend
/// across concurrent requests and call it from the blocking thread pool.
pub trait ImageBackend: Send + Sync {
    /// Display dimensions of an encoded image (after EXIF orientation).
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError>;

    /// Render a labeled collage and return the encoded JPEG.
    fn render_collage(&self, params: &CollageParams) -> Result<Vec<u8>, BackendError>;

    /// Blur and annotate face regions and return the encoded JPEG.
    fn blur_faces(&self, params: &FaceBlurParams) -> Result<Vec<u8>, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::calculations::PixelRect;
    use crate::imaging::params::{CollageLayout, Quality, TileSource};
    use std::sync::Mutex;

    /// Bytes every mock render returns.
    pub const MOCK_OUTPUT: &[u8] = b"mock-jpeg";

    /// Mock backend that records operations without executing them.
    /// Uses Mutex (not RefCell) so it is Sync and can cross into
    /// `spawn_blocking`.
    #[derive(Default)]
    pub struct MockBackend {
        pub identify_results: Mutex<Vec<Dimensions>>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(usize),
        RenderCollage {
            labels: Vec<String>,
            tile_size: u32,
            quality: u32,
        },
        BlurFaces {
            regions: Vec<PixelRect>,
            sigma: f32,
            quality: u32,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_dimensions(dims: Vec<Dimensions>) -> Self {
            Self {
                identify_results: Mutex::new(dims),
                operations: Mutex::new(Vec::new()),
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(bytes.len()));

            self.identify_results
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| BackendError::ProcessingFailed("No mock dimensions".to_string()))
        }

        fn render_collage(&self, params: &CollageParams) -> Result<Vec<u8>, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::RenderCollage {
                labels: params.tiles.iter().map(|t| t.label.clone()).collect(),
                tile_size: params.layout.tile_size,
                quality: params.quality.value(),
            });
            Ok(MOCK_OUTPUT.to_vec())
        }

        fn blur_faces(&self, params: &FaceBlurParams) -> Result<Vec<u8>, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::BlurFaces {
                regions: params.regions.clone(),
                sigma: params.sigma,
                quality: params.quality.value(),
            });
            Ok(MOCK_OUTPUT.to_vec())
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::with_dimensions(vec![Dimensions {
            width: 800,
            height: 600,
        }]);

        let result = backend.identify(b"abc").unwrap();
        assert_eq!(result.width, 800);
        assert_eq!(result.height, 600);

        let ops = backend.get_operations();
        assert_eq!(ops, vec![RecordedOp::Identify(3)]);
    }

    #[test]
    fn mock_identify_without_dimensions_errors() {
        let backend = MockBackend::new();
        assert!(backend.identify(b"abc").is_err());
    }

    #[test]
    fn mock_records_collage() {
        let backend = MockBackend::new();
        let out = backend
            .render_collage(&CollageParams {
                tiles: vec![
                    TileSource {
                        bytes: vec![1],
                        label: "#1 identity".into(),
                    },
                    TileSource {
                        bytes: vec![2],
                        label: "#2".into(),
                    },
                ],
                layout: CollageLayout::default(),
                quality: Quality::new(90),
            })
            .unwrap();
        assert_eq!(out, MOCK_OUTPUT);
        assert!(matches!(
            &backend.get_operations()[0],
            RecordedOp::RenderCollage { labels, tile_size: 448, quality: 90 }
                if labels == &["#1 identity".to_string(), "#2".to_string()]
        ));
    }

    #[test]
    fn mock_records_blur() {
        let backend = MockBackend::new();
        let region = PixelRect {
            left: 1,
            top: 2,
            width: 3,
            height: 4,
        };
        backend
            .blur_faces(&FaceBlurParams {
                source: vec![0; 4],
                regions: vec![region],
                sigma: 28.0,
                quality: Quality::new(88),
            })
            .unwrap();
        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::BlurFaces {
                regions: vec![region],
                sigma: 28.0,
                quality: 88,
            }]
        );
    }
}
