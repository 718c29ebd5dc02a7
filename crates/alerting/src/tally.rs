//! Per-session alert bookkeeping

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::AlertEvent;

/// Count and latest alert for one session. Nothing is persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertTally {
    /// Alerts fired since the session started
    pub fire_count: u64,
    pub last_alert: Option<AlertEvent>,
    /// Cleared by every new alert
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl AlertTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: &AlertEvent) {
        self.fire_count += 1;
        self.last_alert = Some(*event);
        self.acknowledged = false;
        self.acknowledged_at = None;
    }

    /// Acknowledge the latest alert. Returns false when there is nothing to acknowledge.
    pub fn acknowledge(&mut self, now: DateTime<Utc>) -> bool {
        if self.last_alert.is_none() || self.acknowledged {
            return false;
        }
        self.acknowledged = true;
        self.acknowledged_at = Some(now);
        info!("Alert acknowledged after {} alerts", self.fire_count);
        true
    }

    pub fn pending(&self) -> bool {
        self.last_alert.is_some() && !self.acknowledged
    }
}
