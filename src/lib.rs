//! # studio-refs
//!
//! Prepares user-uploaded reference photos before they are sent to an
//! image-generation model. Two pipelines write derived images next to their
//! sources in `<data-dir>/uploads/`:
//!
//! ```text
//! identity refs ──► CollageBuilder ──► identity-collage-v2-<hash>.jpg
//! scene image   ──► FaceSanitizer  ──► <stem>.scene-noface.jpg
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`storage`] | Data root, uploads directory, and the upload-path allow-list |
//! | [`naming`] | Filenames of derived artifacts |
//! | [`cache`] | Content-addressed cache keys and mtime freshness checks |
//! | [`detect`] | Face detection through an external helper process |
//! | [`imaging`] | Pure-Rust compositing: collage grid, face blur, overlays |
//! | [`collage`] | Identity reference collage pipeline |
//! | [`sanitize`] | Scene face sanitizer pipeline |
//! | [`config`] | `studio-refs.toml` loading, validation, and merging |
//! | [`output`] | CLI output formatting |
//! | [`error`] | Error type shared by both pipelines |
//!
//! # Design Decisions
//!
//! ## The Filesystem Is the Cache
//!
//! There is no database and no manifest. A derived file's name is a pure
//! function of its declared inputs (plus a pipeline version marker), and its
//! modification time says whether it is still valid: it is reused while it is
//! at least as new as every source. Stale files are overwritten in place.
//! Concurrent requests for the same artifact may both render; the output is
//! deterministic, so the last writer wins harmlessly. Artifacts are renamed
//! into place from a temp file, so a fresh-looking file is always complete.
//!
//! ## Degrade, Don't Fail
//!
//! Both pipelines sit in front of a generation request that should go ahead
//! even when preparation cannot. Unusable inputs produce `None` (collage) or
//! the caller's original path (sanitizer). Face detection is best-effort: a
//! missing, slow, or crashing helper counts as "no faces". Only compositing
//! and write failures surface as errors, and the batch entry points turn
//! those into per-item fallbacks.
//!
//! ## Capabilities Chosen at Startup
//!
//! The pipelines receive their [`storage::StorageConfig`], an
//! [`imaging::ImageBackend`], and a [`detect::FaceDetector`] explicitly.
//! Nothing reads the environment or checks the platform mid-request, and
//! tests swap in a recording backend and a scripted detector.

pub mod cache;
pub mod collage;
pub mod config;
pub mod detect;
pub mod error;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod sanitize;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_helpers;
