//! Per-stage status derived from the audit trail

use crate::{AuditRecord, Stage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// User-visible state of one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// Not run yet
    Loading,
    /// Ran without output
    Error,
    /// Ran with output
    Success,
}

impl StageStatus {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Loading => "loading",
            Self::Error => "error",
            Self::Success => "success",
        }
    }
}

/// Status of each expected stage for one image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub image_id: String,
    pub stages: BTreeMap<Stage, StageStatus>,
}

impl StatusReport {
    /// Build a report over `expected` stages. Stages without a record are
    /// reported as loading; records of unexpected stages are ignored.
    #[must_use]
    pub fn new(image_id: impl Into<String>, expected: &[Stage], records: &[AuditRecord]) -> Self {
        let mut stages: BTreeMap<Stage, StageStatus> = expected
            .iter()
            .map(|stage| (*stage, StageStatus::Loading))
            .collect();
        for record in records {
            if let Some(status) = stages.get_mut(&record.stage()) {
                *status = if record.event.succeeded() {
                    StageStatus::Success
                } else {
                    StageStatus::Error
                };
            }
        }
        Self {
            image_id: image_id.into(),
            stages,
        }
    }

    #[must_use]
    pub fn status(&self, stage: Stage) -> Option<StageStatus> {
        self.stages.get(&stage).copied()
    }

    /// Every expected stage has run
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.stages
            .values()
            .all(|status| *status != StageStatus::Loading)
    }
}
