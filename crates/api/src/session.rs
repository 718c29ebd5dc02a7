//! Monitoring sessions driven by remote landmark frames

use std::time::Duration;

use alerting::AlertTally;
use chrono::{DateTime, TimeZone, Utc};
use dms::{
    AlertEvent, ClosurePhase, ControlUpdate, DetectionConfig, DrowsinessMonitor, FaceLandmarks,
    FrameReport,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ApiError;

const ALERT_CHANNEL_CAPACITY: usize = 32;

/// One frame of landmarks produced by a client-side detector
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameInput {
    /// Capture time in Unix milliseconds; server time when absent
    #[serde(default)]
    pub timestamp_ms: Option<i64>,
    #[serde(default)]
    pub faces: Vec<FaceLandmarks>,
}

impl FrameInput {
    pub fn timestamp(&self) -> Result<Option<DateTime<Utc>>, ApiError> {
        self.timestamp_ms
            .map(|ms| {
                Utc.timestamp_millis_opt(ms)
                    .single()
                    .ok_or_else(|| ApiError::Invalid(format!("timestamp_ms out of range: {}", ms)))
            })
            .transpose()
    }
}

/// Alert pushed to stream listeners
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertNotice {
    #[serde(flatten)]
    pub alert: AlertEvent,
    /// Sent by hand to check the listener's audio, not by the detector
    #[serde(default)]
    pub test: bool,
}

/// Externally visible session state
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub config: DetectionConfig,
    pub closed_counter: u32,
    pub alert_active: bool,
    pub phase: ClosurePhase,
    pub last_score: Option<f32>,
    pub alert_count: u64,
    pub last_alert: Option<AlertEvent>,
    pub acknowledged: bool,
}

struct SessionInner {
    config: DetectionConfig,
    monitor: DrowsinessMonitor,
    tally: AlertTally,
    last_score: Option<f32>,
    last_active: Instant,
}

/// A single monitored stream. Frames are processed one at a time.
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    inner: Mutex<SessionInner>,
    alerts: broadcast::Sender<AlertNotice>,
}

impl Session {
    pub fn new(config: DetectionConfig) -> Self {
        let (alerts, _) = broadcast::channel(ALERT_CHANNEL_CAPACITY);
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            inner: Mutex::new(SessionInner {
                config,
                monitor: DrowsinessMonitor::new(),
                tally: AlertTally::new(),
                last_score: None,
                last_active: Instant::now(),
            }),
            alerts,
        }
    }

    pub async fn ingest(&self, input: &FrameInput) -> Result<FrameReport, ApiError> {
        let now = input.timestamp()?.unwrap_or_else(Utc::now);

        let mut inner = self.inner.lock().await;
        let SessionInner {
            config,
            monitor,
            tally,
            last_score,
            last_active,
        } = &mut *inner;
        *last_active = Instant::now();

        let report = monitor.observe(&input.faces, config, now);
        if let Some(score) = report.avg_score() {
            *last_score = Some(score);
        }

        for event in report.alerts() {
            tally.record(event);
            let notice = AlertNotice {
                alert: *event,
                test: false,
            };
            // no subscribers is fine
            let receivers = self.alerts.send(notice).unwrap_or(0);
            info!(
                "Session {} alert #{} sent to {} listeners",
                self.id, tally.fire_count, receivers
            );
        }

        debug!(
            "Session {} frame: {} faces, counter {}",
            self.id,
            input.faces.len(),
            report.closed_counter
        );
        Ok(report)
    }

    /// Apply a live control change; takes effect from the next frame
    pub async fn update_config(&self, update: &ControlUpdate) -> DetectionConfig {
        let mut inner = self.inner.lock().await;
        inner.last_active = Instant::now();
        inner.config.apply_controls(update);
        info!(
            "Session {} config: threshold {:.2}, frames {}",
            self.id, inner.config.threshold, inner.config.consecutive_frames
        );
        inner.config
    }

    pub async fn acknowledge(&self) -> bool {
        self.inner.lock().await.tally.acknowledge(Utc::now())
    }

    /// Push a manual alert to listeners without touching the closure state
    /// or the alert count. Returns how many listeners received it.
    pub async fn send_test_alert(&self) -> usize {
        self.inner.lock().await.last_active = Instant::now();
        let notice = AlertNotice {
            alert: AlertEvent::manual(Utc::now()),
            test: true,
        };
        let receivers = self.alerts.send(notice).unwrap_or(0);
        info!("Session {} test alert sent to {} listeners", self.id, receivers);
        receivers
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertNotice> {
        self.alerts.subscribe()
    }

    /// No frames or control changes for `ttl`, and nobody listening for alerts
    pub async fn is_idle(&self, ttl: Duration) -> bool {
        self.alerts.receiver_count() == 0 && self.inner.lock().await.last_active.elapsed() >= ttl
    }

    pub async fn status(&self) -> SessionStatus {
        let inner = self.inner.lock().await;
        let state = inner.monitor.state();
        SessionStatus {
            id: self.id,
            created_at: self.created_at,
            config: inner.config,
            closed_counter: state.closed_counter,
            alert_active: state.alert_active,
            phase: state.phase(&inner.config),
            last_score: inner.last_score,
            alert_count: inner.tally.fire_count,
            last_alert: inner.tally.last_alert,
            acknowledged: inner.tally.acknowledged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::testing::face_with_ear;

    fn frame(ms: i64, ear: f32) -> FrameInput {
        FrameInput {
            timestamp_ms: Some(ms),
            faces: vec![face_with_ear(ear)],
        }
    }

    #[tokio::test]
    async fn test_alert_recorded_and_broadcast() {
        let session = Session::new(DetectionConfig::default());
        let mut rx = session.subscribe();

        for i in 0..5 {
            session.ingest(&frame(1_700_000_000_000 + i * 33, 0.1)).await.unwrap();
        }

        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.alert.closed_frames, 5);
        assert!(!notice.test);

        let status = session.status().await;
        assert_eq!(status.alert_count, 1);
        assert!(status.alert_active);
        assert_eq!(status.phase, ClosurePhase::ClosedAlerting);
        assert!((status.last_score.unwrap() - 0.1).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_config_update_is_clamped() {
        let session = Session::new(DetectionConfig::default());
        let config = session
            .update_config(&ControlUpdate {
                threshold: Some(0.9),
                consecutive_frames: Some(1),
                ..Default::default()
            })
            .await;

        assert!((config.threshold - 0.40).abs() < 1e-6);
        assert_eq!(config.consecutive_frames, 3);
    }

    #[tokio::test]
    async fn test_acknowledge() {
        let session = Session::new(DetectionConfig::default());
        assert!(!session.acknowledge().await);

        for i in 0..5 {
            session.ingest(&frame(i * 33, 0.1)).await.unwrap();
        }
        assert!(session.acknowledge().await);
        assert!(session.status().await.acknowledged);
    }

    #[tokio::test]
    async fn test_manual_alert_leaves_state_alone() {
        let session = Session::new(DetectionConfig::default());
        assert_eq!(session.send_test_alert().await, 0);

        let mut rx = session.subscribe();
        session.ingest(&frame(0, 0.1)).await.unwrap();
        assert_eq!(session.send_test_alert().await, 1);

        let notice = rx.try_recv().unwrap();
        assert!(notice.test);
        assert_eq!(notice.alert.closed_frames, 0);

        let status = session.status().await;
        assert_eq!(status.alert_count, 0);
        assert_eq!(status.closed_counter, 1);
        assert_eq!(status.phase, ClosurePhase::ClosedBelowRequired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_after_ttl_without_listeners() {
        let ttl = Duration::from_secs(600);
        let session = Session::new(DetectionConfig::default());
        assert!(!session.is_idle(ttl).await);

        tokio::time::advance(Duration::from_secs(601)).await;
        assert!(session.is_idle(ttl).await);

        // a frame counts as activity
        session.ingest(&frame(0, 0.3)).await.unwrap();
        assert!(!session.is_idle(ttl).await);

        // an open alert stream keeps the session alive
        let _rx = session.subscribe();
        tokio::time::advance(Duration::from_secs(601)).await;
        assert!(!session.is_idle(ttl).await);
    }

    #[test]
    fn test_notice_serializes_flat() {
        let notice = AlertNotice {
            alert: AlertEvent::manual(Utc::now()),
            test: true,
        };
        let value = serde_json::to_value(notice).unwrap();
        assert_eq!(value["closed_frames"], 0);
        assert_eq!(value["test"], true);
    }

    #[test]
    fn test_timestamp_out_of_range() {
        let input = FrameInput {
            timestamp_ms: Some(i64::MAX),
            faces: vec![],
        };
        assert!(matches!(input.timestamp(), Err(ApiError::Invalid(_))));
    }
}
