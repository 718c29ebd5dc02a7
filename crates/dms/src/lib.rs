//! Driver Monitoring System (DMS)
//!
//! Eye-closure drowsiness detection for a single camera stream:
//! - Eye openness (eye aspect ratio) from six contour landmarks per eye
//! - Consecutive-closure run tracking against a tunable threshold
//! - Cooldown-debounced alert events plus a level-triggered alert flag
//! - Frame pipeline gluing a landmark detector, the above, and annotation

pub mod analysis;
pub mod config;
pub mod debounce;
pub mod detector;
pub mod geometry;
pub mod landmarks;
pub mod overlay;
pub mod pipeline;
pub mod state;
pub mod status;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use analysis::{FaceReading, FrameReport};
pub use config::{ConfigError, ControlUpdate, DetectionConfig};
pub use debounce::{AlertDebouncer, AlertEvent};
pub use detector::{FaceMeshConfig, FaceMeshDetector, LandmarkDetector, ScriptedDetector};
pub use geometry::{eye_openness, face_openness, FaceOpenness, OPEN_EYE_FALLBACK};
pub use landmarks::{EyeIndexSet, FaceLandmarks, LandmarkPoint, LEFT_EYE, RIGHT_EYE};
pub use overlay::Overlay;
pub use pipeline::{FramePipeline, ProcessedFrame};
pub use state::{ClosurePhase, ClosureRunState, ClosureStateMachine, ClosureStep};
pub use status::{SharedStatus, StatusSnapshot};

use camera_capture::CameraError;
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use thiserror::Error;
use tracing::{debug, info};

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),
}

/// Drowsiness decision core for one stream.
///
/// Owns the stream's [`ClosureRunState`]; configuration is passed on every
/// call so live control changes apply from the next frame.
#[derive(Debug, Default)]
pub struct DrowsinessMonitor {
    state: ClosureRunState,
}

impl DrowsinessMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one frame's faces through openness, closure tracking, and debouncing.
    ///
    /// No faces leaves the state untouched: the run is paused, not reset.
    pub fn observe(
        &mut self,
        faces: &[FaceLandmarks],
        config: &DetectionConfig,
        now: DateTime<Utc>,
    ) -> FrameReport {
        counter!("dms_frames_total").increment(1);

        if faces.is_empty() {
            counter!("dms_frames_without_face_total").increment(1);
            return FrameReport {
                face_detected: false,
                readings: Vec::new(),
                closed_counter: self.state.closed_counter,
                alert_active: self.state.alert_active,
            };
        }

        let mut readings = Vec::with_capacity(faces.len());

        for face in faces {
            let run_before = self.state.closed_counter;
            let openness = face_openness(face);
            let step = ClosureStateMachine::update(openness.average, config, &mut self.state);
            let alert = AlertDebouncer::maybe_fire(
                step.is_alerting,
                openness.average,
                now,
                &mut self.state,
                config,
            );

            if step.just_crossed_threshold {
                debug!("Closed run reached {} frames", config.consecutive_frames);
            }
            if let Some(event) = &alert {
                counter!("dms_alerts_fired_total").increment(1);
                info!("Alert! EAR: {:.3}, Frames: {}", event.score, event.closed_frames);
            }

            let opened = run_before > 0 && self.state.closed_counter == 0;
            let ended_run = opened.then_some(run_before);
            if let Some(frames) = ended_run {
                info!("Eyes opened. Was closed for {} frames", frames);
            }

            gauge!("dms_eye_openness").set(openness.average as f64);
            readings.push(FaceReading {
                openness,
                closed_counter: self.state.closed_counter,
                step,
                ended_run,
                alert,
            });
        }

        gauge!("dms_closed_counter").set(self.state.closed_counter as f64);

        FrameReport {
            face_detected: true,
            readings,
            closed_counter: self.state.closed_counter,
            alert_active: self.state.alert_active,
        }
    }

    /// Current closure state
    pub fn state(&self) -> &ClosureRunState {
        &self.state
    }
}
