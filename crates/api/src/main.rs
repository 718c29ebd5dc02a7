//! Drowsiness Monitor - Main Entry Point

use std::io::BufReader;
use std::path::PathBuf;

use alerting::AlertDispatcher;
use anyhow::Context;
use api::watch::{self, WatchOptions};
use api::{init_logging, replay, run_server, AppState, Settings};
use camera_capture::{CameraConfig, ImageSequenceSource};
use clap::{Parser, Subcommand};
use dms::pipeline::PipelineOptions;
use dms::FaceMeshDetector;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "drowsy-monitor", version, about = "Eye-closure drowsiness monitor")]
struct Cli {
    /// Settings file (defaults to ./drowsy.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Eye openness below which a frame counts as closed
    #[arg(long, global = true)]
    threshold: Option<f32>,

    /// Consecutive closed frames before alerting
    #[arg(long, global = true)]
    frames_required: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        #[arg(long)]
        addr: Option<String>,
    },
    /// Monitor a directory of frames with the face mesh model
    Watch {
        #[arg(long)]
        frames: PathBuf,
        #[arg(long)]
        model: Option<PathBuf>,
        #[arg(long)]
        fps: Option<u32>,
        /// Write annotated frames here
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replay recorded landmark frames (JSON lines) and print frame reports
    Replay {
        #[arg(long)]
        landmarks: PathBuf,
        #[arg(long, default_value_t = 30)]
        fps: u32,
    },
    /// Present a test alert through the configured channels
    TestAlert,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let settings = Settings::load(cli.config.as_deref())
        .context("Failed to load settings")?
        .with_overrides(cli.threshold, cli.frames_required)?;

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| settings.server.addr.clone());
            let mut state = AppState::new(&settings)?;
            match PrometheusBuilder::new().install_recorder() {
                Ok(handle) => state = state.with_metrics(handle),
                Err(e) => warn!("Metrics disabled: {}", e),
            }
            run_server(&addr, state).await?;
        }
        Command::Watch {
            frames,
            model,
            fps,
            out,
        } => {
            let mut model_config = settings.model.clone();
            if model.is_some() {
                model_config.path = model;
            }
            let detector = FaceMeshDetector::new(&model_config)?;

            let camera = CameraConfig {
                realtime: true,
                ..CameraConfig::offline(fps.unwrap_or(settings.capture.fps))
            };
            let source = ImageSequenceSource::open(&frames, &camera)?;
            let dispatcher = AlertDispatcher::spawn(settings.alerts.build_chain()?);

            let options = WatchOptions {
                detection: settings.detection,
                pipeline: PipelineOptions {
                    mirror: settings.capture.mirror,
                    annotate: out.is_some(),
                },
                out_dir: out,
            };
            let summary = watch::run(source, camera, detector, options, Some(&dispatcher)).await?;
            dispatcher.shutdown().await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Replay { landmarks, fps } => {
            let file = std::fs::File::open(&landmarks)
                .with_context(|| format!("Failed to open {}", landmarks.display()))?;
            let stdout = std::io::stdout();
            replay::run(BufReader::new(file), stdout.lock(), &settings.detection, fps)?;
        }
        Command::TestAlert => {
            let alerts = settings.alerts.clone();
            let delivery = tokio::task::spawn_blocking(move || alerts.test_alert()).await??;
            println!("Test alert presented via {}", delivery.channel);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_test_alert_subcommand() {
        let cli = Cli::try_parse_from(["drowsy-monitor", "-v", "test-alert"]).unwrap();
        assert!(matches!(cli.command, Command::TestAlert));
        assert_eq!(cli.verbose, 1);
    }
}
