//! Unified predictions and the unify/round stages

use serde::{Deserialize, Serialize};
use sketchform_common::{BBox, ObjectDetection, TextDetection};
use std::num::NonZeroU32;
use tracing::debug;

/// Text values treated as hand-drawn check marks
const CHECK_MARKS: [&str; 2] = ["v", "V"];

/// What a unified prediction represents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredictionKind {
    /// Shape from the object detector
    Object { class: String },
    /// Line of text from OCR
    Text { text: String },
}

/// A single detection from either source, with a stable per-run id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedPrediction {
    /// Position in the unified sequence. Only meaningful within one run.
    pub id: usize,
    #[serde(flatten)]
    pub kind: PredictionKind,
    #[serde(rename = "box")]
    pub bbox: BBox,
}

impl UnifiedPrediction {
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self.kind, PredictionKind::Text { .. })
    }

    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self.kind, PredictionKind::Object { .. })
    }

    /// Detector class for objects, recognized text for texts
    #[must_use]
    pub fn label(&self) -> &str {
        match &self.kind {
            PredictionKind::Object { class } => class,
            PredictionKind::Text { text } => text,
        }
    }

    /// Same prediction with a different box
    #[must_use]
    pub fn with_bbox(&self, bbox: BBox) -> Self {
        Self {
            id: self.id,
            kind: self.kind.clone(),
            bbox,
        }
    }
}

/// Options for [`unify`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnifyOptions {
    /// Drop text predictions that are exactly "v" or "V".
    ///
    /// Set when those texts are check marks inside checkboxes rather than
    /// standalone words.
    #[serde(default)]
    pub exclude_check_marks: bool,
}

/// Merge detector outputs into one sequence: objects first, then texts.
///
/// Each prediction's id is its position in the returned sequence.
#[must_use]
pub fn unify(
    objects: &[ObjectDetection],
    texts: &[TextDetection],
    options: &UnifyOptions,
) -> Vec<UnifiedPrediction> {
    let object_kinds = objects.iter().map(|object| {
        (
            PredictionKind::Object {
                class: object.class.clone(),
            },
            object.bbox,
        )
    });
    let text_kinds = texts
        .iter()
        .filter(|text| !(options.exclude_check_marks && CHECK_MARKS.contains(&text.text.as_str())))
        .map(|text| {
            (
                PredictionKind::Text {
                    text: text.text.clone(),
                },
                text.bbox,
            )
        });

    let unified: Vec<UnifiedPrediction> = object_kinds
        .chain(text_kinds)
        .enumerate()
        .map(|(id, (kind, bbox))| UnifiedPrediction { id, kind, bbox })
        .collect();

    debug!(
        "Unified {} objects and {} texts into {} predictions",
        objects.len(),
        texts.len(),
        unified.len()
    );
    unified
}

/// Snap every prediction's box to `grid`, keeping order and ids
#[must_use]
pub fn round_predictions(
    predictions: &[UnifiedPrediction],
    grid: NonZeroU32,
) -> Vec<UnifiedPrediction> {
    predictions
        .iter()
        .map(|prediction| prediction.with_bbox(prediction.bbox.rounded(grid)))
        .collect()
}
