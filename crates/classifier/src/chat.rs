//! Chat-completions label-mapping classifier

use crate::mapping::{assemble_components, LabelMapping};
use crate::{ClassifiedForm, ClassifierError, FormClassifier, Result, DEFAULT_FORM_NAME};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sketchform_layout::{GroupedPredictions, PredictionKind, UnifiedPrediction};
use std::time::Duration;
use tracing::{debug, info};

const SYSTEM_PROMPT: &str = "\
You receive texts as [id, text, box] and form components as [id, type, box].
Every box is [topLeftX, topLeftY, bottomRightX, bottomRightY].
Decide for each text whether it labels a nearby component or stands on its own.
Use positions (same row, overlapping, inside) and meaning: \"I agree\" next to a checkbox labels it, text inside a button labels the button.
Answer with a JSON object with a single key \"mappedIds\" holding a list of [textId, componentId] pairs.
Use null as componentId when the text is not a label of any component.
A text \"v\" or \"V\" is usually a check mark inside a checkbox; use \"checkbox\" as componentId for it.";

/// Chat classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatClassifierConfig {
    /// API base URL, without the `/chat/completions` suffix
    pub api_base: String,

    /// Bearer token
    pub api_key: String,

    /// Chat model; must support JSON response format
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ChatClassifierConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            model: "gpt-3.5-turbo-1106".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Form classifier backed by an OpenAI-compatible chat completions API
pub struct ChatFormClassifier {
    client: Client,
    config: ChatClassifierConfig,
}

impl ChatFormClassifier {
    /// Create a classifier with its own HTTP client
    pub fn new(config: ChatClassifierConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &ChatClassifierConfig {
        &self.config
    }

    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'));
        let body = json!({
            "model": self.config.model,
            "response_format": { "type": "json_object" },
            "messages": messages,
        });

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClassifierError::Status(response.status().as_u16()));
        }

        let completion: ChatCompletion = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ClassifierError::EmptyResponse)
    }
}

/// Texts as `[id, text, box]`, objects as `[id, class, box]`
fn build_messages(
    predictions: &[UnifiedPrediction],
    scene_description: Option<&str>,
) -> Vec<ChatMessage> {
    let mut texts = Vec::new();
    let mut objects = Vec::new();
    for prediction in predictions {
        let entry = json!([prediction.id, prediction.label(), prediction.bbox]);
        match prediction.kind {
            PredictionKind::Text { .. } => texts.push(entry),
            PredictionKind::Object { .. } => objects.push(entry),
        }
    }

    let mut user = format!(
        "Texts: {}\nForm components: {}\n",
        Value::Array(texts),
        Value::Array(objects)
    );
    if let Some(scene) = scene_description.filter(|s| !s.trim().is_empty()) {
        user.push_str(&format!("The drawing shows: {}\n", scene.trim()));
    }
    user.push_str("Create the JSON.");

    vec![
        ChatMessage {
            role: "system",
            content: SYSTEM_PROMPT.to_string(),
        },
        ChatMessage {
            role: "user",
            content: user,
        },
    ]
}

#[async_trait]
impl FormClassifier for ChatFormClassifier {
    fn name(&self) -> &str {
        "chat classifier"
    }

    async fn classify(
        &self,
        grouped: &GroupedPredictions,
        scene_description: Option<&str>,
    ) -> Result<ClassifiedForm> {
        if grouped.is_empty() {
            debug!("Nothing to classify");
            return Ok(ClassifiedForm::empty());
        }
        if self.config.api_key.is_empty() {
            return Err(ClassifierError::NotConfigured(
                "classifier api_key is empty".to_string(),
            ));
        }

        let predictions: Vec<UnifiedPrediction> = grouped.predictions().cloned().collect();
        info!(
            "Requesting label mapping for {} predictions in {} rows",
            predictions.len(),
            grouped.len()
        );

        let content = self
            .complete(build_messages(&predictions, scene_description))
            .await?;
        let mapping: LabelMapping = serde_json::from_str(&content)
            .map_err(|e| ClassifierError::UnparsableResponse(format!("{e}: {content}")))?;
        debug!("Model mapped {} texts", mapping.mapped_ids.len());

        Ok(ClassifiedForm {
            name: DEFAULT_FORM_NAME.to_string(),
            components: assemble_components(&predictions, &mapping),
        })
    }
}
