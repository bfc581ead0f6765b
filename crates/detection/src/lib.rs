//! Detector collaborators
//!
//! Two independent services look at an uploaded sketch:
//! - an object detector that finds shapes (inputs, checkboxes, buttons, ...)
//! - an OCR service that reads lines of text
//!
//! Both are reached through async traits so the pipeline can be driven by
//! real HTTP clients, JSON fixtures, or test fakes. Clients validate every
//! box they receive; malformed boxes are dropped with a warning so the
//! geometric stages only ever see valid geometry.

use async_trait::async_trait;
use sketchform_common::{ObjectDetection, TextDetection};
use thiserror::Error;

pub mod azure;
pub mod fixture;
pub mod object;

pub use azure::{AzureReadConfig, AzureReadDetector};
pub use fixture::{FixtureObjectDetector, FixtureTextDetector};
pub use object::{HttpObjectDetector, HttpObjectDetectorConfig};

/// Detector errors
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} responded with status {status}")]
    Status { service: &'static str, status: u16 },

    #[error("Text recognition response has no Operation-Location header")]
    MissingOperationLocation,

    #[error("Text recognition operation ended with status '{0}'")]
    OperationFailed(String),

    #[error("Text recognition still running after {0} polls")]
    PollLimitExceeded(u32),

    #[error("Detector not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid detector response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for detector operations
pub type Result<T> = std::result::Result<T, DetectionError>;

/// Finds UI shapes in an image
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Detect shapes in the image at `image_url`
    async fn detect_objects(&self, image_url: &str) -> Result<Vec<ObjectDetection>>;
}

/// Reads lines of text in an image
#[async_trait]
pub trait TextDetector: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Detect text lines in the image at `image_url`
    async fn detect_text(&self, image_url: &str) -> Result<Vec<TextDetection>>;
}

/// Non-success statuses are reported with the service name
pub(crate) fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(DetectionError::Status {
            service,
            status: status.as_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DetectionError::Status {
            service: "object detector",
            status: 503,
        };
        assert_eq!(err.to_string(), "object detector responded with status 503");
        assert_eq!(
            DetectionError::PollLimitExceeded(3).to_string(),
            "Text recognition still running after 3 polls"
        );
    }
}
