//! Axis leveling
//!
//! Detector and OCR jitter often put a box's start edge a few pixels inside
//! another box's span, e.g. a label sitting slightly below the top of the
//! checkbox it belongs to. Leveling slides such a box back so its start edge
//! lines up with the enclosing box, keeping its extent. Without it the two
//! predictions would land in different rows when grouping.

use crate::prediction::UnifiedPrediction;
use sketchform_common::{Axis, BBox};
use std::collections::HashMap;
use tracing::debug;

/// Level predictions along `axis`.
///
/// References are visited in ascending order of their start edge (ties by
/// id). For each reference `R` that was not itself moved, every other
/// prediction `T` whose start lies strictly inside `R`'s span
/// (`R.start < T.start < R.end`) is slid back so its start equals
/// `R.start` exactly, keeping its extent.
///
/// Comparisons use the input boxes, not already moved ones. When several
/// references enclose the same prediction, the last reference in sort order
/// wins.
///
/// Returns a new sequence in input order with the same ids; only boxes
/// differ.
#[must_use]
pub fn level(predictions: &[UnifiedPrediction], axis: Axis) -> Vec<UnifiedPrediction> {
    let mut order: Vec<usize> = (0..predictions.len()).collect();
    order.sort_by(|&a, &b| {
        let (start_a, _) = predictions[a].bbox.span(axis);
        let (start_b, _) = predictions[b].bbox.span(axis);
        start_a
            .total_cmp(&start_b)
            .then_with(|| predictions[a].id.cmp(&predictions[b].id))
    });

    // input position -> moved box
    let mut moved: HashMap<usize, BBox> = HashMap::with_capacity(predictions.len());

    for &reference in &order {
        if moved.contains_key(&reference) {
            continue;
        }
        let (reference_start, reference_end) = predictions[reference].bbox.span(axis);

        for &test in &order {
            if test == reference {
                continue;
            }
            let (test_start, _) = predictions[test].bbox.span(axis);
            if test_start > reference_start && test_start < reference_end {
                let delta = test_start - reference_start;
                debug!(
                    "Prediction {} nested in {}: moved {:.1} along {} axis",
                    predictions[test].id,
                    predictions[reference].id,
                    delta,
                    axis.name()
                );
                moved.insert(test, predictions[test].bbox.aligned_to(axis, reference_start));
            }
        }
    }

    predictions
        .iter()
        .enumerate()
        .map(|(position, prediction)| match moved.get(&position) {
            Some(bbox) => prediction.with_bbox(*bbox),
            None => prediction.clone(),
        })
        .collect()
}
