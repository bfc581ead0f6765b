//! Detectors that replay recorded predictions
//!
//! Used to run the pipeline offline and as fakes in tests. File-backed
//! fixtures are read on every call, so a missing or broken file surfaces as
//! a detector failure, just like an unreachable service.

use crate::{ObjectDetector, Result, TextDetector};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use sketchform_common::{ObjectDetection, TextDetection};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
enum Source<T> {
    File(PathBuf),
    Inline(Vec<T>),
}

impl<T: DeserializeOwned + Clone> Source<T> {
    async fn load(&self) -> Result<Vec<T>> {
        match self {
            Self::File(path) => {
                debug!("Loading fixture {}", path.display());
                let contents = tokio::fs::read_to_string(path).await?;
                Ok(serde_json::from_str(&contents)?)
            }
            Self::Inline(detections) => Ok(detections.clone()),
        }
    }
}

/// Object detector returning predictions from a JSON file or memory.
///
/// File format: `[{"class": "checkbox", "coordinates": [x0, y0, x1, y1]}, ...]`
#[derive(Debug, Clone)]
pub struct FixtureObjectDetector {
    source: Source<ObjectDetection>,
}

impl FixtureObjectDetector {
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        Self {
            source: Source::File(path.as_ref().to_path_buf()),
        }
    }

    #[must_use]
    pub fn from_detections(detections: Vec<ObjectDetection>) -> Self {
        Self {
            source: Source::Inline(detections),
        }
    }
}

#[async_trait]
impl ObjectDetector for FixtureObjectDetector {
    fn name(&self) -> &str {
        "object fixture"
    }

    async fn detect_objects(&self, _image_url: &str) -> Result<Vec<ObjectDetection>> {
        self.source.load().await
    }
}

/// Text detector returning predictions from a JSON file or memory.
///
/// File format: `[{"text": "Email", "coordinates": [x0, y0, x1, y1]}, ...]`
#[derive(Debug, Clone)]
pub struct FixtureTextDetector {
    source: Source<TextDetection>,
}

impl FixtureTextDetector {
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        Self {
            source: Source::File(path.as_ref().to_path_buf()),
        }
    }

    #[must_use]
    pub fn from_detections(detections: Vec<TextDetection>) -> Self {
        Self {
            source: Source::Inline(detections),
        }
    }
}

#[async_trait]
impl TextDetector for FixtureTextDetector {
    fn name(&self) -> &str {
        "text fixture"
    }

    async fn detect_text(&self, _image_url: &str) -> Result<Vec<TextDetection>> {
        self.source.load().await
    }
}
