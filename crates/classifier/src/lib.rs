//! Form classification
//!
//! Turns row-grouped predictions into typed form components. The heavy
//! lifting (deciding which text labels which shape) is delegated to a chat
//! model through the [`FormClassifier`] trait; this crate owns the typed
//! result and the deterministic assembly of components from the model's
//! label mapping.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sketchform_layout::GroupedPredictions;
use thiserror::Error;

pub mod chat;
pub mod mapping;

pub use chat::{ChatClassifierConfig, ChatFormClassifier};
pub use mapping::{assemble_components, LabelMapping, MappingTarget};

/// Name given to every classified form
pub const DEFAULT_FORM_NAME: &str = "Form";

/// Classifier errors
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Classifier responded with status {0}")]
    Status(u16),

    #[error("Classifier returned no message content")]
    EmptyResponse,

    #[error("Unparsable classifier output: {0}")]
    UnparsableResponse(String),

    #[error("Classifier not configured: {0}")]
    NotConfigured(String),
}

/// Result type for classifier operations
pub type Result<T> = std::result::Result<T, ClassifierError>;

/// Recognized form component kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    TextField,
    Checkbox,
    Toggle,
    Button,
    Image,
    Label,
}

impl ComponentKind {
    /// Map a detector class to a component kind.
    ///
    /// Returns `None` for classes that have no form counterpart.
    #[must_use]
    pub fn from_detector_class(class: &str) -> Option<Self> {
        match class {
            "input" => Some(Self::TextField),
            "checkbox" => Some(Self::Checkbox),
            "toggle" => Some(Self::Toggle),
            "button" => Some(Self::Button),
            "image" => Some(Self::Image),
            "label" => Some(Self::Label),
            _ => None,
        }
    }

    /// Get human-readable kind name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::TextField => "text field",
            Self::Checkbox => "checkbox",
            Self::Toggle => "toggle",
            Self::Button => "button",
            Self::Image => "image",
            Self::Label => "label",
        }
    }
}

/// A typed form component with its position in the form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormComponent {
    pub kind: ComponentKind,
    pub label: String,
    /// 0-based position, top to bottom
    pub order: usize,
}

/// Classification result for one image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedForm {
    pub name: String,
    pub components: Vec<FormComponent>,
}

impl ClassifiedForm {
    /// Form with no components, the result for an empty grouping
    #[must_use]
    pub fn empty() -> Self {
        Self {
            name: DEFAULT_FORM_NAME.to_string(),
            components: Vec::new(),
        }
    }
}

/// Maps grouped predictions to typed form components
#[async_trait]
pub trait FormClassifier: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Classify grouped predictions, optionally guided by a free-text
    /// description of the scene.
    ///
    /// An empty grouping yields [`ClassifiedForm::empty`].
    async fn classify(
        &self,
        grouped: &GroupedPredictions,
        scene_description: Option<&str>,
    ) -> Result<ClassifiedForm>;
}
