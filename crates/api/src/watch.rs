//! Desktop monitoring loop over a capture source

use std::path::PathBuf;

use alerting::AlertDispatcher;
use anyhow::Context;
use camera_capture::{CameraConfig, CaptureService, FrameSource};
use chrono::{Duration, Utc};
use dms::pipeline::PipelineOptions;
use dms::{DetectionConfig, FramePipeline, LandmarkDetector, SharedStatus, StatusSnapshot};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Options for one watch run
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub detection: DetectionConfig,
    pub pipeline: PipelineOptions,
    /// Directory for annotated frames
    pub out_dir: Option<PathBuf>,
}

/// Totals for one watch run
#[derive(Debug, Clone, Serialize)]
pub struct WatchSummary {
    pub status: StatusSnapshot,
    pub frames_written: u64,
    /// Frames dropped because detection failed on them
    pub frames_skipped: u64,
}

/// Drive `source` through the pipeline until it runs dry.
///
/// Detection runs on the runtime via `block_in_place`, so a multi-threaded
/// runtime is required.
pub async fn run<S, D>(
    source: S,
    camera: CameraConfig,
    detector: D,
    options: WatchOptions,
    dispatcher: Option<&AlertDispatcher>,
) -> anyhow::Result<WatchSummary>
where
    S: FrameSource + 'static,
    D: LandmarkDetector,
{
    if let Some(dir) = &options.out_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    let mut capture = CaptureService::spawn(source, camera);
    let mut pipeline = FramePipeline::new(detector, options.pipeline);
    let status = SharedStatus::new();
    let started = Utc::now();
    let mut frames_written = 0;
    let mut frames_skipped = 0;
    let mut was_alerting = false;
    let mut had_face = false;

    info!(
        "Watching with threshold {:.2}, {} frames required",
        options.detection.threshold, options.detection.consecutive_frames
    );

    while let Some(frame) = capture.next().await {
        let sequence = frame.sequence;
        let now = started + Duration::nanoseconds(frame.timestamp_ns as i64);
        let result =
            tokio::task::block_in_place(|| pipeline.process(frame, &options.detection, now));
        let processed = match result {
            Ok(processed) => processed,
            Err(e) => {
                warn!("Frame {} skipped: {}", sequence, e);
                frames_skipped += 1;
                continue;
            }
        };
        let report = &processed.report;
        status.publish(report);

        if report.face_detected != had_face {
            let change = if report.face_detected { "found" } else { "lost" };
            info!("Frame {}: face {}", sequence, change);
            had_face = report.face_detected;
        }
        if report.alert_active != was_alerting {
            if report.alert_active {
                warn!("Frame {}: eyes closed for {} frames", sequence, report.closed_counter);
            } else {
                info!("Frame {}: eyes open again", sequence);
            }
            was_alerting = report.alert_active;
        }

        for event in report.alerts() {
            info!("Alert! EAR: {:.3}, Frames: {}", event.score, event.closed_frames);
            if let Some(dispatcher) = dispatcher {
                dispatcher.send(*event);
            }
        }

        if let Some(dir) = &options.out_dir {
            let path = dir.join(format!("frame_{:06}.png", sequence));
            processed
                .frame
                .to_image()?
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            frames_written += 1;
        }

        debug!("Frame {} processed: {:?}", sequence, status.snapshot());
    }

    let summary = WatchSummary {
        status: status.snapshot(),
        frames_written,
        frames_skipped,
    };
    info!(
        "Watch finished: {} frames, {} skipped, {} alerts",
        summary.status.frames_seen, summary.frames_skipped, summary.status.alerts_fired
    );
    Ok(summary)
}
