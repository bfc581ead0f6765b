//! HTTP client for the shape detection service

use crate::{check_status, ObjectDetector, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sketchform_common::{BBox, ObjectDetection};
use std::time::Duration;
use tracing::{debug, info, warn};

const SERVICE: &str = "object detector";

/// Class the detector emits for handwritten text regions
const LABEL_CLASS: &str = "label";

/// Shape detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpObjectDetectorConfig {
    /// Prediction endpoint; receives `image_url` and `model_name` as query
    /// parameters
    pub endpoint: String,

    /// Model served by the endpoint
    pub model_name: String,

    /// Drop predictions of class "label". OCR already covers text.
    pub exclude_labels: bool,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HttpObjectDetectorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8001/llm/predict".to_string(),
            model_name: "roboflow".to_string(),
            exclude_labels: true,
            timeout_secs: 60,
        }
    }
}

/// One prediction as returned by the service. Extra fields (confidence,
/// class id, center/size form) are ignored.
#[derive(Debug, Deserialize)]
struct RawObject {
    class: String,
    coordinates: Vec<f64>,
}

/// Shape detector reached over HTTP
pub struct HttpObjectDetector {
    client: Client,
    config: HttpObjectDetectorConfig,
}

impl HttpObjectDetector {
    /// Create a detector with its own HTTP client
    pub fn new(config: HttpObjectDetectorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &HttpObjectDetectorConfig {
        &self.config
    }

    fn convert(&self, raw: Vec<RawObject>) -> Vec<ObjectDetection> {
        let total = raw.len();
        let detections: Vec<ObjectDetection> = raw
            .into_iter()
            .filter(|object| !(self.config.exclude_labels && object.class == LABEL_CLASS))
            .filter_map(|object| {
                let bbox = <[f64; 4]>::try_from(object.coordinates.as_slice())
                    .ok()
                    .and_then(|coordinates| BBox::try_from(coordinates).ok());
                match bbox {
                    Some(bbox) => Some(ObjectDetection {
                        class: object.class,
                        bbox,
                    }),
                    None => {
                        warn!(
                            "Dropping '{}' prediction with malformed box {:?}",
                            object.class, object.coordinates
                        );
                        None
                    }
                }
            })
            .collect();
        debug!("Kept {} of {} object predictions", detections.len(), total);
        detections
    }
}

#[async_trait]
impl ObjectDetector for HttpObjectDetector {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn detect_objects(&self, image_url: &str) -> Result<Vec<ObjectDetection>> {
        info!("Requesting object predictions for {}", image_url);

        let response = self
            .client
            .post(&self.config.endpoint)
            .query(&[
                ("image_url", image_url),
                ("model_name", self.config.model_name.as_str()),
            ])
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .send()
            .await?;
        let response = check_status(SERVICE, response)?;

        let raw: Vec<RawObject> = response.json().await?;
        Ok(self.convert(raw))
    }
}
