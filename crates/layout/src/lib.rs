//! Layout normalization - unify, round, level and group predictions
//!
//! Takes the two independent, noisy prediction streams produced for a sketch
//! (shapes from the object detector, lines from OCR) and turns them into one
//! row-grouped structure that reads top-to-bottom, left-to-right.
//!
//! ## Stages
//!
//! 1. **Unify**: merge objects and texts into one sequence with stable ids
//! 2. **Round**: snap every coordinate to a grid to absorb detector jitter
//! 3. **Level**: pull predictions whose start edge lies inside another
//!    prediction's span onto that prediction's start edge
//! 4. **Group**: bucket predictions by top Y, each row sorted by left X
//!
//! Every stage borrows its input and returns a new snapshot.
//!
//! ## Example
//!
//! ```rust
//! use sketchform_common::{Axis, BBox, ObjectDetection, TextDetection, DEFAULT_GRID};
//! use sketchform_layout::{group_by_rows, level, round_predictions, unify, UnifyOptions};
//!
//! let objects = vec![ObjectDetection {
//!     class: "checkbox".to_string(),
//!     bbox: BBox::new(100.0, 200.0, 130.0, 230.0).unwrap(),
//! }];
//! let texts = vec![TextDetection {
//!     text: "Remember me".to_string(),
//!     bbox: BBox::new(140.0, 205.0, 260.0, 225.0).unwrap(),
//! }];
//!
//! let unified = unify(&objects, &texts, &UnifyOptions::default());
//! let rounded = round_predictions(&unified, DEFAULT_GRID);
//! let leveled = level(&rounded, Axis::Y);
//! let grouped = group_by_rows(&leveled);
//!
//! let row = grouped.row(200.0).unwrap();
//! assert_eq!(row.len(), 2);
//! assert_eq!(row[0].label(), "checkbox");
//! ```

pub mod grouping;
pub mod leveling;
pub mod prediction;

pub use grouping::{group_by_rows, GroupedPredictions};
pub use leveling::level;
pub use prediction::{
    round_predictions, unify, PredictionKind, UnifiedPrediction, UnifyOptions,
};

/// Output of [`round_predictions`]
pub type RoundedPredictions = Vec<UnifiedPrediction>;

/// Output of [`level`]
pub type LeveledPredictions = Vec<UnifiedPrediction>;
