//! Audit trail for pipeline runs
//!
//! Every stage of a run records one [`ImageEvent`] for the owning image.
//! Payloads are three-state:
//! - no record: the stage has not run
//! - `None`: the stage ran and failed
//! - `Some(..)`: the stage succeeded
//!
//! Records are upserted by (image, stage), so a re-run replaces earlier
//! results instead of accumulating them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sketchform_classifier::ClassifiedForm;
use sketchform_common::{ObjectDetection, TextDetection};
use sketchform_layout::{GroupedPredictions, UnifiedPrediction};
use thiserror::Error;

pub mod sink;
pub mod status;

pub use sink::{EventSink, FanOutSink, JsonLinesEventSink, MemoryEventSink};
pub use status::{StageStatus, StatusReport};

/// Audit errors
#[derive(Error, Debug)]
pub enum EventError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed audit log line {line}: {source}")]
    MalformedLine {
        line: usize,
        source: serde_json::Error,
    },
}

/// Result type for audit operations
pub type Result<T> = std::result::Result<T, EventError>;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    ObjectDetectionResponseReceived,
    TextDetectionResponseReceived,
    DetectionsUnified,
    UnifiedPredictionCoordinatesRounded,
    UnifiedPredictionsLeveledInYAxis,
    UnifiedPredictionsLeveledInXAxis,
    PredictionsGrouped,
    FormComponentsCreated,
}

impl Stage {
    /// Every stage, in execution order
    pub const ALL: [Stage; 8] = [
        Stage::ObjectDetectionResponseReceived,
        Stage::TextDetectionResponseReceived,
        Stage::DetectionsUnified,
        Stage::UnifiedPredictionCoordinatesRounded,
        Stage::UnifiedPredictionsLeveledInYAxis,
        Stage::UnifiedPredictionsLeveledInXAxis,
        Stage::PredictionsGrouped,
        Stage::FormComponentsCreated,
    ];

    /// Get the event name recorded for this stage
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::ObjectDetectionResponseReceived => "ObjectDetectionResponseReceived",
            Self::TextDetectionResponseReceived => "TextDetectionResponseReceived",
            Self::DetectionsUnified => "DetectionsUnified",
            Self::UnifiedPredictionCoordinatesRounded => "UnifiedPredictionCoordinatesRounded",
            Self::UnifiedPredictionsLeveledInYAxis => "UnifiedPredictionsLeveledInYAxis",
            Self::UnifiedPredictionsLeveledInXAxis => "UnifiedPredictionsLeveledInXAxis",
            Self::PredictionsGrouped => "PredictionsGrouped",
            Self::FormComponentsCreated => "FormComponentsCreated",
        }
    }
}

/// One stage outcome. `None` payloads mean the stage failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "payload")]
pub enum ImageEvent {
    ObjectDetectionResponseReceived(Option<Vec<ObjectDetection>>),
    TextDetectionResponseReceived(Option<Vec<TextDetection>>),
    DetectionsUnified(Option<Vec<UnifiedPrediction>>),
    UnifiedPredictionCoordinatesRounded(Option<Vec<UnifiedPrediction>>),
    UnifiedPredictionsLeveledInYAxis(Option<Vec<UnifiedPrediction>>),
    UnifiedPredictionsLeveledInXAxis(Option<Vec<UnifiedPrediction>>),
    PredictionsGrouped(Option<GroupedPredictions>),
    FormComponentsCreated(Option<ClassifiedForm>),
}

impl ImageEvent {
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::ObjectDetectionResponseReceived(_) => Stage::ObjectDetectionResponseReceived,
            Self::TextDetectionResponseReceived(_) => Stage::TextDetectionResponseReceived,
            Self::DetectionsUnified(_) => Stage::DetectionsUnified,
            Self::UnifiedPredictionCoordinatesRounded(_) => {
                Stage::UnifiedPredictionCoordinatesRounded
            }
            Self::UnifiedPredictionsLeveledInYAxis(_) => Stage::UnifiedPredictionsLeveledInYAxis,
            Self::UnifiedPredictionsLeveledInXAxis(_) => Stage::UnifiedPredictionsLeveledInXAxis,
            Self::PredictionsGrouped(_) => Stage::PredictionsGrouped,
            Self::FormComponentsCreated(_) => Stage::FormComponentsCreated,
        }
    }

    /// Whether the stage produced output
    #[must_use]
    pub fn succeeded(&self) -> bool {
        match self {
            Self::ObjectDetectionResponseReceived(payload) => payload.is_some(),
            Self::TextDetectionResponseReceived(payload) => payload.is_some(),
            Self::DetectionsUnified(payload)
            | Self::UnifiedPredictionCoordinatesRounded(payload)
            | Self::UnifiedPredictionsLeveledInYAxis(payload)
            | Self::UnifiedPredictionsLeveledInXAxis(payload) => payload.is_some(),
            Self::PredictionsGrouped(payload) => payload.is_some(),
            Self::FormComponentsCreated(payload) => payload.is_some(),
        }
    }
}

/// An event as persisted for one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub image_id: String,
    pub recorded_at: DateTime<Utc>,
    pub event: ImageEvent,
}

impl AuditRecord {
    #[must_use]
    pub fn new(image_id: impl Into<String>, event: ImageEvent) -> Self {
        Self {
            image_id: image_id.into(),
            recorded_at: Utc::now(),
            event,
        }
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.event.stage()
    }
}
