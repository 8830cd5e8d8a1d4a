//! detect_to_json - run detection once and write the response to a JSON file

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use detection_service::{build_dispatcher, config, pipeline::DetectionRequest};
use std::{fs::File, io::BufWriter, time::Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
#[command(group(ArgGroup::new("source").required(true).args(["file", "files", "folder"])))]
struct Args {
    /// Single image; the output holds only its detections.
    #[arg(long)]
    file: Option<String>,
    /// Several images, written as a batch ordered by frame number.
    #[arg(long, num_args = 1..)]
    files: Vec<String>,
    /// Directory or glob pattern, e.g. `frames/*.jpg`.
    #[arg(long)]
    folder: Option<String>,
    /// Minimum confidence; defaults to `pipeline.default_threshold`.
    #[arg(long)]
    threshold: Option<f32>,
    /// Output file path.
    #[arg(long, default_value = "detections.json")]
    output: String,
}

impl Args {
    fn request(&self) -> DetectionRequest {
        if let Some(path) = &self.file {
            DetectionRequest::SingleFile { path: path.clone() }
        } else if let Some(pattern) = &self.folder {
            DetectionRequest::Directory {
                pattern: pattern.clone(),
            }
        } else {
            DetectionRequest::MultipleFiles {
                paths: self.files.clone(),
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = config::get_configuration()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},ort=info", config.log_level.as_str()).into()),
        )
        .with(tracing_subscriber::fmt::layer().json().with_level(true))
        .init();

    let dispatcher = build_dispatcher(&config)?;
    let threshold = args.threshold.unwrap_or(config.pipeline.default_threshold);

    let started = Instant::now();
    let dispatched = dispatcher.dispatch(args.request(), threshold).await?;
    tracing::info!(
        "Processed {} frames ({} skipped) in {:.2?}",
        dispatched.stats.frames,
        dispatched.stats.skipped_frames,
        started.elapsed()
    );

    let file = File::create(&args.output)
        .with_context(|| format!("failed to create {}", args.output))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &dispatched.response)?;
    tracing::info!("Wrote {}", args.output);

    Ok(())
}
