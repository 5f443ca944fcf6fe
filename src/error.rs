//! Error type shared by the collage and sanitizer pipelines.
//!
//! Invalid input paths and missing sources are not errors: the pipelines
//! answer those with `None` or a passthrough. What remains are real
//! failures the caller should hear about.

use crate::imaging::BackendError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Imaging error: {0}")]
    Imaging(#[from] BackendError),
    #[error("Render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
