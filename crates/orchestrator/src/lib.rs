//! Pipeline orchestration for sketch-to-form conversion
//!
//! For each uploaded image:
//!
//! 1. Object and text detection run concurrently
//! 2. Results are unified, rounded, leveled (Y, optionally X) and grouped
//! 3. The grouped predictions are handed to the form classifier
//!
//! Every stage is audited through an [`EventSink`](sketchform_events::EventSink).
//! Collaborators are injected as trait objects, so the same pipeline runs
//! against live services, JSON fixtures or test fakes.

use thiserror::Error;

pub mod config;
pub mod jobs;
pub mod pipeline;

pub use config::{load_config, AppConfig, PipelineConfig};
pub use jobs::{JobHandle, JobRegistry};
pub use pipeline::{Pipeline, PipelineRun, UploadedImage};

/// Pipeline errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Processing of image {0} was cancelled")]
    Cancelled(String),
}

/// Result type for pipeline runs
pub type Result<T> = std::result::Result<T, PipelineError>;
