//! Event sinks

use crate::{AuditRecord, EventError, ImageEvent, Result, Stage};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Destination for stage events
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Record `event` for `image_id`, replacing any earlier record of the
    /// same stage
    async fn record(&self, image_id: &str, event: ImageEvent) -> Result<()>;
}

type ImageRecords = BTreeMap<Stage, AuditRecord>;

/// In-memory audit trail, keyed by image then stage
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSink {
    records: Arc<RwLock<HashMap<String, ImageRecords>>>,
}

impl MemoryEventSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records of one image, in stage order
    pub async fn records(&self, image_id: &str) -> Vec<AuditRecord> {
        let records = self.records.read().await;
        records
            .get(image_id)
            .map(|stages| stages.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Event of one stage, if the stage has run
    pub async fn event(&self, image_id: &str, stage: Stage) -> Option<ImageEvent> {
        let records = self.records.read().await;
        records
            .get(image_id)
            .and_then(|stages| stages.get(&stage))
            .map(|record| record.event.clone())
    }

    /// Forget every record of an image
    pub async fn remove(&self, image_id: &str) {
        self.records.write().await.remove(image_id);
    }

    /// Number of images with at least one record
    pub async fn image_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn record(&self, image_id: &str, event: ImageEvent) -> Result<()> {
        let record = AuditRecord::new(image_id, event);
        let mut records = self.records.write().await;
        records
            .entry(image_id.to_string())
            .or_default()
            .insert(record.stage(), record);
        Ok(())
    }
}

/// Append-only JSON-lines audit log.
///
/// Each call appends one [`AuditRecord`] line. Upsert semantics are applied
/// when reading the log back with [`JsonLinesEventSink::load`]: the last
/// line for an (image, stage) pair wins.
#[derive(Debug)]
pub struct JsonLinesEventSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesEventSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a log back, keeping the latest record per (image, stage).
    ///
    /// Records are returned grouped by image id, each image in stage order.
    pub async fn load(path: impl AsRef<Path>) -> Result<BTreeMap<String, Vec<AuditRecord>>> {
        let contents = tokio::fs::read_to_string(path.as_ref()).await?;
        let mut latest: BTreeMap<String, ImageRecords> = BTreeMap::new();

        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: AuditRecord = serde_json::from_str(line)
                .map_err(|source| EventError::MalformedLine {
                    line: index + 1,
                    source,
                })?;
            latest
                .entry(record.image_id.clone())
                .or_default()
                .insert(record.stage(), record);
        }

        Ok(latest
            .into_iter()
            .map(|(image_id, stages)| (image_id, stages.into_values().collect()))
            .collect())
    }
}

#[async_trait]
impl EventSink for JsonLinesEventSink {
    async fn record(&self, image_id: &str, event: ImageEvent) -> Result<()> {
        let record = AuditRecord::new(image_id, event);
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        debug!(
            "Appended {} for {} to {}",
            record.stage().name(),
            image_id,
            self.path.display()
        );
        Ok(())
    }
}

/// Forwards every event to several sinks.
///
/// All sinks are attempted; the first error is returned.
#[derive(Clone, Default)]
pub struct FanOutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanOutSink {
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl EventSink for FanOutSink {
    async fn record(&self, image_id: &str, event: ImageEvent) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.record(image_id, event.clone()).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_upserts_by_stage() {
        let sink = MemoryEventSink::new();
        sink.record("img-1", ImageEvent::DetectionsUnified(None))
            .await
            .unwrap();
        sink.record("img-1", ImageEvent::DetectionsUnified(Some(Vec::new())))
            .await
            .unwrap();
        sink.record("img-2", ImageEvent::PredictionsGrouped(None))
            .await
            .unwrap();

        let records = sink.records("img-1").await;
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].event,
            ImageEvent::DetectionsUnified(Some(Vec::new()))
        );
        assert_eq!(sink.image_count().await, 2);
    }

    #[tokio::test]
    async fn test_memory_sink_keeps_stage_order() {
        let sink = MemoryEventSink::new();
        sink.record("img", ImageEvent::FormComponentsCreated(None))
            .await
            .unwrap();
        sink.record("img", ImageEvent::ObjectDetectionResponseReceived(None))
            .await
            .unwrap();

        let stages: Vec<Stage> = sink.records("img").await.iter().map(AuditRecord::stage).collect();
        assert_eq!(
            stages,
            vec![
                Stage::ObjectDetectionResponseReceived,
                Stage::FormComponentsCreated
            ]
        );
    }

    #[tokio::test]
    async fn test_absent_stage_distinct_from_failed() {
        let sink = MemoryEventSink::new();
        sink.record("img", ImageEvent::TextDetectionResponseReceived(None))
            .await
            .unwrap();

        assert_eq!(
            sink.event("img", Stage::TextDetectionResponseReceived).await,
            Some(ImageEvent::TextDetectionResponseReceived(None))
        );
        assert_eq!(sink.event("img", Stage::DetectionsUnified).await, None);

        sink.remove("img").await;
        assert!(sink.records("img").await.is_empty());
    }

    #[tokio::test]
    async fn test_fan_out_reaches_every_sink() {
        let first = MemoryEventSink::new();
        let second = MemoryEventSink::new();
        let fan_out = FanOutSink::new(vec![Arc::new(first.clone()), Arc::new(second.clone())]);

        fan_out
            .record("img", ImageEvent::PredictionsGrouped(None))
            .await
            .unwrap();
        assert_eq!(first.records("img").await.len(), 1);
        assert_eq!(second.records("img").await.len(), 1);
    }
}
