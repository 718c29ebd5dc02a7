//! Per-frame analysis results

use serde::{Deserialize, Serialize};

use crate::debounce::AlertEvent;
use crate::geometry::FaceOpenness;
use crate::state::ClosureStep;

/// Result for one detected face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceReading {
    /// Eye openness for this face
    pub openness: FaceOpenness,
    /// Closed-run length after this face was applied
    pub closed_counter: u32,
    /// State-machine outcome
    pub step: ClosureStep,
    /// Length of the closed run this face ended, if it opened the eyes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_run: Option<u32>,
    /// Alert event fired by this face, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<AlertEvent>,
}

/// Complete per-frame result handed to presentation collaborators
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    /// Whether the detector returned any face
    pub face_detected: bool,
    /// One reading per face, in detector order
    pub readings: Vec<FaceReading>,
    /// Closed-run length after the frame
    pub closed_counter: u32,
    /// Level-triggered alert flag after the frame
    pub alert_active: bool,
}

impl FrameReport {
    /// Reading of the last face processed
    pub fn latest(&self) -> Option<&FaceReading> {
        self.readings.last()
    }

    /// Average openness of the last face processed
    pub fn avg_score(&self) -> Option<f32> {
        self.latest().map(|r| r.openness.average)
    }

    /// Alert events fired during this frame
    pub fn alerts(&self) -> impl Iterator<Item = &AlertEvent> {
        self.readings.iter().filter_map(|r| r.alert.as_ref())
    }

    /// Length of the last closed run that ended during this frame
    pub fn ended_run(&self) -> Option<u32> {
        self.readings.iter().rev().find_map(|r| r.ended_run)
    }

    /// Check if any alert fired this frame
    pub fn has_alerts(&self) -> bool {
        self.alerts().next().is_some()
    }

    /// Any face is closed and past the required count
    pub fn is_alerting(&self) -> bool {
        self.readings.iter().any(|r| r.step.is_alerting)
    }
}
