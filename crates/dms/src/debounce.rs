//! Alert debouncing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DetectionConfig;
use crate::state::ClosureRunState;

/// Momentary "eyes closed too long" event, consumed by presentation channels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    /// When the alert fired
    pub timestamp: DateTime<Utc>,
    /// Average openness on the firing frame
    pub score: f32,
    /// Length of the closed run when it fired
    pub closed_frames: u32,
}

impl AlertEvent {
    /// Event raised by hand to check that alert channels work
    pub fn manual(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            score: 0.0,
            closed_frames: 0,
        }
    }
}

/// Rate-limits alert events while a closed run continues
pub struct AlertDebouncer;

impl AlertDebouncer {
    /// Emit an event when alerting and the cooldown since the previous event
    /// has strictly elapsed.
    ///
    /// Never clears `alert_active`; only an open frame does that.
    pub fn maybe_fire(
        is_alerting_state: bool,
        score: f32,
        now: DateTime<Utc>,
        state: &mut ClosureRunState,
        config: &DetectionConfig,
    ) -> Option<AlertEvent> {
        if !is_alerting_state {
            return None;
        }

        if let Some(last) = state.last_alert_time {
            let since = seconds_between(last, now);
            if since <= config.alert_cooldown_seconds {
                debug!(
                    "Alert suppressed: {:.3}s since last, cooldown {:.3}s",
                    since, config.alert_cooldown_seconds
                );
                return None;
            }
        }

        state.last_alert_time = Some(now);
        state.alert_active = true;

        Some(AlertEvent {
            timestamp: now,
            score,
            closed_frames: state.closed_counter,
        })
    }
}

fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let delta = later.signed_duration_since(earlier);
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}
