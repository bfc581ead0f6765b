//! Per-image pipeline run

use crate::config::PipelineConfig;
use crate::jobs::{JobHandle, JobRegistry};
use crate::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use sketchform_classifier::{ClassifiedForm, FormClassifier};
use sketchform_common::Axis;
use sketchform_detection::{ObjectDetector, TextDetector};
use sketchform_events::{AuditRecord, EventSink, ImageEvent, Stage, StatusReport};
use sketchform_layout::{
    group_by_rows, level, round_predictions, unify, GroupedPredictions, LeveledPredictions,
    RoundedPredictions, UnifiedPrediction, UnifyOptions,
};
use std::sync::Arc;
use tracing::{info, warn};

/// An uploaded sketch to process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedImage {
    pub id: String,
    pub url: String,
    /// Free-text hint passed to the classifier
    #[serde(default)]
    pub scene_description: Option<String>,
}

/// Every snapshot produced by one run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub image_id: String,
    pub unified: Vec<UnifiedPrediction>,
    pub rounded: RoundedPredictions,
    pub leveled: LeveledPredictions,
    pub grouped: GroupedPredictions,
    /// `None` when classification failed
    pub form: Option<ClassifiedForm>,
}

/// Runs detection, layout normalization and classification for uploaded
/// images, auditing every stage.
#[derive(Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    object_detector: Arc<dyn ObjectDetector>,
    text_detector: Arc<dyn TextDetector>,
    classifier: Arc<dyn FormClassifier>,
    sink: Arc<dyn EventSink>,
    jobs: JobRegistry,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        object_detector: Arc<dyn ObjectDetector>,
        text_detector: Arc<dyn TextDetector>,
        classifier: Arc<dyn FormClassifier>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            object_detector,
            text_detector,
            classifier,
            sink,
            jobs: JobRegistry::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    /// Stages a run of this pipeline records, in order
    #[must_use]
    pub fn expected_stages(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|stage| {
                self.config.level_x_axis || *stage != Stage::UnifiedPredictionsLeveledInXAxis
            })
            .collect()
    }

    /// Per-stage status of an image from its audit records
    #[must_use]
    pub fn status_report(&self, image_id: &str, records: &[AuditRecord]) -> StatusReport {
        StatusReport::new(image_id, &self.expected_stages(), records)
    }

    /// Cancel the run for an image, e.g. because the image was deleted.
    ///
    /// Calls already in flight complete, but their results are discarded
    /// and nothing more is audited for the run.
    pub async fn cancel(&self, image_id: &str) -> bool {
        self.jobs.cancel(image_id).await
    }

    /// Process one image.
    ///
    /// Detector failures degrade to empty prediction lists and a classifier
    /// failure leaves the form empty; both are audited as failed stages.
    /// The only error is cancellation.
    pub async fn process(&self, image: &UploadedImage) -> Result<PipelineRun> {
        let job = self.jobs.register(&image.id).await;
        let result = self.run(image, &job).await;
        self.jobs.finish(&image.id, &job).await;
        result
    }

    async fn run(&self, image: &UploadedImage, job: &JobHandle) -> Result<PipelineRun> {
        info!("Processing image {} ({})", image.id, image.url);

        let (objects, texts) = tokio::join!(
            self.object_detector.detect_objects(&image.url),
            self.text_detector.detect_text(&image.url),
        );

        let objects = match objects {
            Ok(objects) => {
                info!("{} returned {} objects", self.object_detector.name(), objects.len());
                self.audit(
                    job,
                    &image.id,
                    ImageEvent::ObjectDetectionResponseReceived(Some(objects.clone())),
                )
                .await?;
                objects
            }
            Err(e) => {
                warn!("{} failed for {}: {}", self.object_detector.name(), image.id, e);
                self.audit(job, &image.id, ImageEvent::ObjectDetectionResponseReceived(None))
                    .await?;
                Vec::new()
            }
        };

        let texts = match texts {
            Ok(texts) => {
                info!("{} returned {} texts", self.text_detector.name(), texts.len());
                self.audit(
                    job,
                    &image.id,
                    ImageEvent::TextDetectionResponseReceived(Some(texts.clone())),
                )
                .await?;
                texts
            }
            Err(e) => {
                warn!("{} failed for {}: {}", self.text_detector.name(), image.id, e);
                self.audit(job, &image.id, ImageEvent::TextDetectionResponseReceived(None))
                    .await?;
                Vec::new()
            }
        };

        let options = UnifyOptions {
            exclude_check_marks: self.config.exclude_check_marks,
        };
        let unified = unify(&objects, &texts, &options);
        self.audit(job, &image.id, ImageEvent::DetectionsUnified(Some(unified.clone())))
            .await?;

        let rounded = round_predictions(&unified, self.config.grid);
        self.audit(
            job,
            &image.id,
            ImageEvent::UnifiedPredictionCoordinatesRounded(Some(rounded.clone())),
        )
        .await?;

        let mut leveled = level(&rounded, Axis::Y);
        self.audit(
            job,
            &image.id,
            ImageEvent::UnifiedPredictionsLeveledInYAxis(Some(leveled.clone())),
        )
        .await?;

        if self.config.level_x_axis {
            leveled = level(&leveled, Axis::X);
            self.audit(
                job,
                &image.id,
                ImageEvent::UnifiedPredictionsLeveledInXAxis(Some(leveled.clone())),
            )
            .await?;
        }

        let grouped = group_by_rows(&leveled);
        info!(
            "Grouped {} predictions into {} rows",
            grouped.prediction_count(),
            grouped.len()
        );
        self.audit(job, &image.id, ImageEvent::PredictionsGrouped(Some(grouped.clone())))
            .await?;

        ensure_active(job, &image.id)?;
        let form = match self
            .classifier
            .classify(&grouped, image.scene_description.as_deref())
            .await
        {
            Ok(form) => {
                info!("Classified {} components", form.components.len());
                Some(form)
            }
            Err(e) => {
                warn!("{} failed for {}: {}", self.classifier.name(), image.id, e);
                None
            }
        };
        self.audit(job, &image.id, ImageEvent::FormComponentsCreated(form.clone()))
            .await?;

        info!("Finished image {}", image.id);
        Ok(PipelineRun {
            image_id: image.id.clone(),
            unified,
            rounded,
            leveled,
            grouped,
            form,
        })
    }

    /// Record a stage event unless the run was cancelled. The write holds the
    /// job's write gate, so a concurrent cancel waits for it. Sink failures
    /// are logged and do not stop the run.
    async fn audit(&self, job: &JobHandle, image_id: &str, event: ImageEvent) -> Result<()> {
        let Some(_write) = job.begin_write().await else {
            info!("Discarding results for cancelled image {}", image_id);
            return Err(PipelineError::Cancelled(image_id.to_string()));
        };
        let stage = event.stage();
        if let Err(e) = self.sink.record(image_id, event).await {
            warn!("Failed to audit {} for {}: {}", stage.name(), image_id, e);
        }
        Ok(())
    }
}

fn ensure_active(job: &JobHandle, image_id: &str) -> Result<()> {
    if job.is_cancelled() {
        info!("Discarding results for cancelled image {}", image_id);
        return Err(PipelineError::Cancelled(image_id.to_string()));
    }
    Ok(())
}
