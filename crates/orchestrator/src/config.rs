//! Configuration loading

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sketchform_classifier::ChatClassifierConfig;
use sketchform_common::DEFAULT_GRID;
use sketchform_detection::{AzureReadConfig, HttpObjectDetectorConfig};
use std::num::NonZeroU32;
use std::path::Path;

/// Geometric stage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Rounding grid in pixels
    pub grid: NonZeroU32,

    /// Run the X-axis leveling stage after the Y-axis one
    pub level_x_axis: bool,

    /// Drop "v"/"V" texts before unification
    pub exclude_check_marks: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            grid: DEFAULT_GRID,
            level_x_axis: false,
            exclude_check_marks: false,
        }
    }
}

/// Complete application configuration. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub object_detector: HttpObjectDetectorConfig,

    #[serde(default)]
    pub text_detector: AzureReadConfig,

    #[serde(default)]
    pub classifier: ChatClassifierConfig,
}

/// Load configuration from a TOML file. A missing file yields defaults.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: AppConfig =
        toml::from_str(&contents).context("Failed to parse config file as TOML")?;
    Ok(config)
}
