//! Lock-free status snapshot shared with display threads

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use serde::Serialize;

use crate::analysis::FrameReport;

/// Written by the pipeline thread after every frame, read by anyone.
///
/// Fields are updated independently; a reader may see values from two
/// adjacent frames.
#[derive(Debug)]
pub struct SharedStatus {
    closed_counter: AtomicU32,
    alert_active: AtomicBool,
    /// f32 bits of the last average score
    last_score_bits: AtomicU32,
    face_detected: AtomicBool,
    alerts_fired: AtomicU64,
    frames_seen: AtomicU64,
}

/// NaN bit pattern marking "no score yet"; real scores are always finite
const NO_SCORE: u32 = u32::MAX;

impl Default for SharedStatus {
    fn default() -> Self {
        Self {
            closed_counter: AtomicU32::new(0),
            alert_active: AtomicBool::new(false),
            last_score_bits: AtomicU32::new(NO_SCORE),
            face_detected: AtomicBool::new(false),
            alerts_fired: AtomicU64::new(0),
            frames_seen: AtomicU64::new(0),
        }
    }
}

/// Point-in-time copy of [`SharedStatus`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub closed_counter: u32,
    pub alert_active: bool,
    pub last_score: Option<f32>,
    pub face_detected: bool,
    pub alerts_fired: u64,
    pub frames_seen: u64,
}

impl SharedStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one frame
    pub fn publish(&self, report: &FrameReport) {
        self.closed_counter.store(report.closed_counter, Ordering::Relaxed);
        self.alert_active.store(report.alert_active, Ordering::Relaxed);
        self.face_detected.store(report.face_detected, Ordering::Relaxed);
        if let Some(score) = report.avg_score() {
            self.last_score_bits.store(score.to_bits(), Ordering::Relaxed);
        }
        let fired = report.alerts().count() as u64;
        if fired > 0 {
            self.alerts_fired.fetch_add(fired, Ordering::Relaxed);
        }
        self.frames_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let frames_seen = self.frames_seen.load(Ordering::Relaxed);
        let bits = self.last_score_bits.load(Ordering::Relaxed);
        StatusSnapshot {
            closed_counter: self.closed_counter.load(Ordering::Relaxed),
            alert_active: self.alert_active.load(Ordering::Relaxed),
            last_score: (bits != NO_SCORE).then(|| f32::from_bits(bits)),
            face_detected: self.face_detected.load(Ordering::Relaxed),
            alerts_fired: self.alerts_fired.load(Ordering::Relaxed),
            frames_seen,
        }
    }
}
