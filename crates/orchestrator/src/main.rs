//! `sketchform` command line entry point

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use sketchform_classifier::ChatFormClassifier;
use sketchform_detection::{
    AzureReadDetector, FixtureObjectDetector, FixtureTextDetector, HttpObjectDetector,
    ObjectDetector, TextDetector,
};
use sketchform_events::{EventSink, FanOutSink, JsonLinesEventSink, MemoryEventSink};
use sketchform_orchestrator::{load_config, AppConfig, Pipeline, UploadedImage};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sketchform")]
#[command(about = "Turn a photographed UI sketch into a structured form definition", long_about = None)]
#[command(version)]
struct Cli {
    /// Publicly reachable URL of the sketch image
    #[arg(long)]
    image_url: String,

    /// Image identifier used in the audit trail (random if omitted)
    #[arg(long)]
    image_id: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Free-text description of the sketch, passed to the classifier
    #[arg(long)]
    scene: Option<String>,

    /// Replay object predictions from a JSON file instead of calling the detector
    #[arg(long, requires = "texts")]
    objects: Option<PathBuf>,

    /// Replay text predictions from a JSON file instead of calling OCR
    #[arg(long, requires = "objects")]
    texts: Option<PathBuf>,

    /// Append audit records to this JSON-lines file
    #[arg(long)]
    audit_log: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        "sketchform=debug"
    } else {
        "sketchform=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn detectors(
    cli: &Cli,
    config: &AppConfig,
) -> Result<(Arc<dyn ObjectDetector>, Arc<dyn TextDetector>)> {
    if let (Some(objects), Some(texts)) = (&cli.objects, &cli.texts) {
        info!(
            "Replaying fixtures {} and {}",
            objects.display(),
            texts.display()
        );
        return Ok((
            Arc::new(FixtureObjectDetector::from_file(objects)),
            Arc::new(FixtureTextDetector::from_file(texts)),
        ));
    }

    let object_detector = HttpObjectDetector::new(config.object_detector.clone())
        .context("Failed to create object detector client")?;
    let text_detector = AzureReadDetector::new(config.text_detector.clone())
        .context("Failed to create text detector client")?;
    Ok((Arc::new(object_detector), Arc::new(text_detector)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    let (object_detector, text_detector) = detectors(&cli, &config)?;
    let classifier = ChatFormClassifier::new(config.classifier.clone())
        .context("Failed to create classifier client")?;

    let memory = MemoryEventSink::new();
    let sink: Arc<dyn EventSink> = match &cli.audit_log {
        Some(path) => Arc::new(FanOutSink::new(vec![
            Arc::new(memory.clone()),
            Arc::new(JsonLinesEventSink::new(path)),
        ])),
        None => Arc::new(memory.clone()),
    };

    let pipeline = Pipeline::new(
        config.pipeline.clone(),
        object_detector,
        text_detector,
        Arc::new(classifier),
        sink,
    );

    let image = UploadedImage {
        id: cli
            .image_id
            .clone()
            .unwrap_or_else(|| format!("image-{}", uuid::Uuid::new_v4())),
        url: cli.image_url.clone(),
        scene_description: cli.scene.clone(),
    };

    let run = pipeline
        .process(&image)
        .await
        .with_context(|| format!("Failed to process image {}", image.id))?;

    let records = memory.records(&image.id).await;
    let status = pipeline.status_report(&image.id, &records);

    let output = json!({
        "image_id": run.image_id,
        "form": run.form,
        "status": status.stages,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("Failed to serialize output")?
    );

    Ok(())
}
