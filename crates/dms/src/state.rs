//! Eye-closure run tracking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DetectionConfig;

/// Closure phase of the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClosurePhase {
    #[default]
    Open,
    ClosedBelowRequired,
    ClosedAlerting,
}

/// Per-session closure state, mutated in place once per frame.
///
/// Owned by whoever owns the stream; never shared between sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClosureRunState {
    /// Consecutive frames below threshold
    pub closed_counter: u32,
    /// Current run has reached the required frame count
    pub alert_active: bool,
    /// Most recent alert event; `None` means never fired
    pub last_alert_time: Option<DateTime<Utc>>,
}

impl ClosureRunState {
    /// Phase under the given config
    pub fn phase(&self, config: &DetectionConfig) -> ClosurePhase {
        if self.closed_counter == 0 {
            ClosurePhase::Open
        } else if self.closed_counter >= config.consecutive_frames {
            ClosurePhase::ClosedAlerting
        } else {
            ClosurePhase::ClosedBelowRequired
        }
    }
}

/// Outcome of one state-machine step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClosureStep {
    /// Score was below threshold
    pub is_closed_frame: bool,
    /// This frame is the one where the run first reached the required count
    pub just_crossed_threshold: bool,
    /// Closed and at or past the required count
    pub is_alerting: bool,
}

/// Closure state machine
pub struct ClosureStateMachine;

impl ClosureStateMachine {
    /// Advance `state` by one frame.
    ///
    /// Config is read at call time; a changed `consecutive_frames` applies to
    /// the counter already accumulated.
    pub fn update(
        avg_score: f32,
        config: &DetectionConfig,
        state: &mut ClosureRunState,
    ) -> ClosureStep {
        let is_closed_frame = avg_score < config.threshold;

        if is_closed_frame {
            state.closed_counter = state.closed_counter.saturating_add(1);
            state.alert_active = state.closed_counter >= config.consecutive_frames;
        } else {
            state.closed_counter = 0;
            state.alert_active = false;
        }

        ClosureStep {
            is_closed_frame,
            just_crossed_threshold: is_closed_frame
                && state.closed_counter == config.consecutive_frames,
            is_alerting: is_closed_frame && state.closed_counter >= config.consecutive_frames,
        }
    }
}
