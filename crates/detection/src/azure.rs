//! Azure Computer Vision Read client
//!
//! Text recognition is asynchronous on the service side:
//! 1. `POST {endpoint}/vision/v3.1/read/analyze` with `{"url": ...}`
//! 2. Read the `Operation-Location` response header
//! 3. Poll that URL until the status leaves `notStarted`/`running`
//!
//! Every line of every page becomes one text detection. Line polygons
//! (four corners, eight numbers) are reduced to their enclosing box.

use crate::{check_status, DetectionError, Result, TextDetector};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sketchform_common::{BBox, TextDetection};
use std::time::Duration;
use tracing::{debug, info, warn};

const SERVICE: &str = "text detector";
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION_HEADER: &str = "Operation-Location";

/// OCR service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureReadConfig {
    /// Cognitive Services resource endpoint, e.g.
    /// `https://<resource>.cognitiveservices.azure.com/`
    pub endpoint: String,

    /// Resource subscription key
    pub subscription_key: String,

    /// Delay between two polls of the read operation
    pub poll_interval_ms: u64,

    /// Give up after this many polls
    pub max_polls: u32,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for AzureReadConfig {
    fn default() -> Self {
        Self {
            endpoint: std::env::var("AZURE_VISION_ENDPOINT").unwrap_or_default(),
            subscription_key: std::env::var("AZURE_VISION_KEY").unwrap_or_default(),
            poll_interval_ms: 1000,
            max_polls: 30,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadOperation {
    status: String,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResult {
    #[serde(default)]
    read_results: Vec<ReadResult>,
}

#[derive(Debug, Deserialize)]
struct ReadResult {
    #[serde(default)]
    lines: Vec<ReadLine>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadLine {
    text: String,
    bounding_box: Vec<f64>,
}

/// Text detector backed by the Azure Read API
pub struct AzureReadDetector {
    client: Client,
    config: AzureReadConfig,
}

impl AzureReadDetector {
    /// Create a detector with its own HTTP client
    pub fn new(config: AzureReadConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &AzureReadConfig {
        &self.config
    }

    fn analyze_url(&self) -> String {
        let endpoint = self.config.endpoint.trim_end_matches('/');
        format!("{endpoint}/vision/v3.1/read/analyze")
    }

    /// Submit the image and return the operation URL to poll
    async fn submit(&self, image_url: &str) -> Result<String> {
        let response = self
            .client
            .post(self.analyze_url())
            .header(SUBSCRIPTION_KEY_HEADER, &self.config.subscription_key)
            .json(&serde_json::json!({ "url": image_url }))
            .send()
            .await?;
        let response = check_status(SERVICE, response)?;

        response
            .headers()
            .get(OPERATION_LOCATION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or(DetectionError::MissingOperationLocation)
    }

    async fn fetch_operation(&self, operation_url: &str) -> Result<ReadOperation> {
        let response = self
            .client
            .get(operation_url)
            .header(SUBSCRIPTION_KEY_HEADER, &self.config.subscription_key)
            .send()
            .await?;
        let response = check_status(SERVICE, response)?;
        Ok(response.json().await?)
    }
}

/// Flatten all pages into text detections, dropping lines whose polygon
/// cannot form a valid box
fn lines_to_detections(result: AnalyzeResult) -> Vec<TextDetection> {
    result
        .read_results
        .into_iter()
        .flat_map(|page| page.lines)
        .filter_map(|line| match BBox::from_polygon(&line.bounding_box) {
            Ok(bbox) => Some(TextDetection {
                text: line.text,
                bbox,
            }),
            Err(e) => {
                warn!("Dropping text line '{}': {}", line.text, e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl TextDetector for AzureReadDetector {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn detect_text(&self, image_url: &str) -> Result<Vec<TextDetection>> {
        if self.config.endpoint.is_empty() {
            return Err(DetectionError::NotConfigured(
                "text detector endpoint is empty".to_string(),
            ));
        }

        info!("Submitting {} for text recognition", image_url);
        let operation_url = self.submit(image_url).await?;
        let interval = Duration::from_millis(self.config.poll_interval_ms);

        for attempt in 1..=self.config.max_polls {
            if attempt > 1 {
                tokio::time::sleep(interval).await;
            }
            let operation = self.fetch_operation(&operation_url).await?;
            match operation.status.as_str() {
                "notStarted" | "running" => {
                    debug!("Text recognition {} (poll {})", operation.status, attempt);
                }
                "succeeded" => {
                    let result = operation.analyze_result.ok_or_else(|| {
                        DetectionError::InvalidResponse(
                            "succeeded operation without analyzeResult".to_string(),
                        )
                    })?;
                    let detections = lines_to_detections(result);
                    info!("Recognized {} text lines", detections.len());
                    return Ok(detections);
                }
                other => return Err(DetectionError::OperationFailed(other.to_string())),
            }
        }

        Err(DetectionError::PollLimitExceeded(self.config.max_polls))
    }
}
