//! Label mapping and component assembly
//!
//! The chat model answers with pairs `[textId, target]` where the target is
//! an object id, `null` (the text stands on its own) or `"checkbox"` (the
//! text is a check mark drawn inside a checkbox). Turning those pairs into
//! components is deterministic and lives here.

use crate::{ComponentKind, FormComponent};
use serde::Deserialize;
use sketchform_layout::{PredictionKind, UnifiedPrediction};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Label given to shapes no text was mapped to
pub const NO_LABEL: &str = "No Label";

/// What a text was mapped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Option<RawTarget>")]
pub enum MappingTarget {
    /// The text labels the object with this id
    Component(usize),
    /// The text is a standalone label
    Standalone,
    /// The text is a check mark and produces no component
    CheckMark,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTarget {
    Id(usize),
    Text(String),
}

impl TryFrom<Option<RawTarget>> for MappingTarget {
    type Error = String;

    fn try_from(raw: Option<RawTarget>) -> Result<Self, Self::Error> {
        match raw {
            None => Ok(Self::Standalone),
            Some(RawTarget::Id(id)) => Ok(Self::Component(id)),
            Some(RawTarget::Text(text)) if text == "checkbox" => Ok(Self::CheckMark),
            Some(RawTarget::Text(text)) => text
                .parse()
                .map(Self::Component)
                .map_err(|_| format!("unknown mapping target '{text}'")),
        }
    }
}

/// Model answer: `{"mappedIds": [[textId, target], ...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LabelMapping {
    #[serde(rename = "mappedIds", default)]
    pub mapped_ids: Vec<(usize, MappingTarget)>,
}

struct Candidate<'a> {
    top: f64,
    class: &'a str,
    label: &'a str,
}

/// Build form components from predictions and the model's label mapping.
///
/// - a text mapped to an object becomes a component of the object's kind
///   labelled with the text
/// - a text mapped to nothing becomes a label
/// - a check mark produces nothing
/// - objects no text was mapped to get the label "No Label"
/// - texts the model did not mention become labels
///
/// Pairs referring to unknown ids, or to an id of the wrong kind, are
/// ignored. Components are ordered by top Y (ties keep the order above) and
/// classes without a form counterpart are dropped before numbering.
#[must_use]
pub fn assemble_components(
    predictions: &[UnifiedPrediction],
    mapping: &LabelMapping,
) -> Vec<FormComponent> {
    let by_id: HashMap<usize, &UnifiedPrediction> =
        predictions.iter().map(|p| (p.id, p)).collect();
    let text_of = |id: usize| {
        by_id.get(&id).and_then(|p| match &p.kind {
            PredictionKind::Text { text } => Some((*p, text.as_str())),
            PredictionKind::Object { .. } => None,
        })
    };
    let class_of = |id: usize| {
        by_id.get(&id).and_then(|p| match &p.kind {
            PredictionKind::Object { class } => Some((*p, class.as_str())),
            PredictionKind::Text { .. } => None,
        })
    };

    let mut mapped_texts = HashSet::new();
    let mut mapped_objects = HashSet::new();
    let mut candidates = Vec::with_capacity(predictions.len());

    for &(text_id, target) in &mapping.mapped_ids {
        let Some((text_prediction, text)) = text_of(text_id) else {
            warn!("Ignoring mapping for unknown text id {}", text_id);
            continue;
        };
        match target {
            MappingTarget::Component(object_id) => {
                let Some((object, class)) = class_of(object_id) else {
                    warn!(
                        "Ignoring mapping of text {} to unknown object id {}",
                        text_id, object_id
                    );
                    continue;
                };
                candidates.push(Candidate {
                    top: object.bbox.y0(),
                    class,
                    label: text,
                });
                mapped_objects.insert(object_id);
            }
            MappingTarget::Standalone => candidates.push(Candidate {
                top: text_prediction.bbox.y0(),
                class: "label",
                label: text,
            }),
            MappingTarget::CheckMark => debug!("Text {} is a check mark", text_id),
        }
        mapped_texts.insert(text_id);
    }

    for prediction in predictions {
        match &prediction.kind {
            PredictionKind::Object { class } if !mapped_objects.contains(&prediction.id) => {
                candidates.push(Candidate {
                    top: prediction.bbox.y0(),
                    class,
                    label: NO_LABEL,
                });
            }
            PredictionKind::Text { text } if !mapped_texts.contains(&prediction.id) => {
                candidates.push(Candidate {
                    top: prediction.bbox.y0(),
                    class: "label",
                    label: text,
                });
            }
            _ => {}
        }
    }

    candidates.sort_by(|a, b| a.top.total_cmp(&b.top));

    candidates
        .into_iter()
        .filter_map(|candidate| {
            let kind = ComponentKind::from_detector_class(candidate.class);
            if kind.is_none() {
                debug!("Dropping unsupported class '{}'", candidate.class);
            }
            kind.map(|kind| (kind, candidate.label))
        })
        .enumerate()
        .map(|(order, (kind, label))| FormComponent {
            kind,
            label: label.to_string(),
            order,
        })
        .collect()
}
