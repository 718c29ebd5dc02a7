//! Replay of recorded landmark frames
//!
//! Input is JSON lines, one [`FrameInput`] per line. Output is one
//! [`FrameReport`](dms::FrameReport) per input frame, also as JSON lines.

use std::io::{BufRead, Write};

use anyhow::Context;
use chrono::{DateTime, Duration, TimeZone, Utc};
use dms::{DetectionConfig, DrowsinessMonitor};
use serde::Serialize;
use tracing::{info, warn};

use crate::session::FrameInput;

/// Totals for one replay run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplaySummary {
    pub frames: u64,
    pub frames_with_face: u64,
    pub alerts: u64,
}

/// Feed every frame in `input` through a fresh monitor, writing reports to `output`.
///
/// Frames without a timestamp are placed `1/fps` apart from the Unix epoch.
pub fn run<R: BufRead, W: Write>(
    input: R,
    mut output: W,
    config: &DetectionConfig,
    fps: u32,
) -> anyhow::Result<ReplaySummary> {
    let mut monitor = DrowsinessMonitor::new();
    let mut summary = ReplaySummary::default();
    let frame_ms = 1_000.0 / fps.max(1) as f64;
    let mut was_alerting = false;

    for (index, line) in input.lines().enumerate() {
        let line = line.context("Failed to read landmark stream")?;
        if line.trim().is_empty() {
            continue;
        }

        let frame: FrameInput = serde_json::from_str(&line)
            .with_context(|| format!("Invalid landmark frame on line {}", index + 1))?;
        let now = match frame.timestamp()? {
            Some(ts) => ts,
            None => synthetic_time(summary.frames, frame_ms)?,
        };

        let report = monitor.observe(&frame.faces, config, now);
        summary.frames += 1;
        if report.face_detected {
            summary.frames_with_face += 1;
        }
        summary.alerts += report.alerts().count() as u64;

        if report.alert_active != was_alerting {
            if report.alert_active {
                warn!("Eyes closed for {} frames at {}", report.closed_counter, now);
            } else {
                let frames = report.ended_run().unwrap_or(report.closed_counter);
                info!("Eyes open again at {} after {} closed frames", now, frames);
            }
            was_alerting = report.alert_active;
        }

        serde_json::to_writer(&mut output, &report)?;
        writeln!(output)?;
    }

    output.flush()?;
    info!(
        "Replayed {} frames ({} with a face), {} alerts",
        summary.frames, summary.frames_with_face, summary.alerts
    );
    Ok(summary)
}

fn synthetic_time(frame: u64, frame_ms: f64) -> anyhow::Result<DateTime<Utc>> {
    let epoch = Utc
        .timestamp_millis_opt(0)
        .single()
        .context("Unix epoch not representable")?;
    Ok(epoch + Duration::microseconds((frame as f64 * frame_ms * 1_000.0).round() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::testing::face_with_ear;
    use dms::FrameReport;

    fn line(ear: Option<f32>) -> String {
        let frame = FrameInput {
            timestamp_ms: None,
            faces: ear.map(face_with_ear).into_iter().collect(),
        };
        serde_json::to_string(&frame).unwrap()
    }

    fn replay(lines: &[String], fps: u32) -> (ReplaySummary, Vec<FrameReport>) {
        let input = lines.join("\n");
        let mut out = Vec::new();
        let summary = run(input.as_bytes(), &mut out, &DetectionConfig::default(), fps).unwrap();
        let reports = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (summary, reports)
    }

    #[test]
    fn test_long_closure_refires_after_cooldown() {
        // 70 closed frames at 30 fps: alert at frame 5, again once 2 s have passed
        let lines: Vec<String> = (0..70).map(|_| line(Some(0.1))).collect();
        let (summary, reports) = replay(&lines, 30);

        assert_eq!(summary.frames, 70);
        assert_eq!(summary.alerts, 2);
        assert!(reports[4].has_alerts());
        assert_eq!(reports.iter().filter(|r| r.has_alerts()).count(), 2);
        assert!(reports.iter().skip(4).all(|r| r.alert_active));
    }

    #[test]
    fn test_missing_face_pauses_run() {
        let lines = vec![
            line(Some(0.1)),
            line(Some(0.1)),
            line(None),
            line(Some(0.1)),
            line(Some(0.3)),
        ];
        let (summary, reports) = replay(&lines, 30);

        assert_eq!(summary.frames_with_face, 4);
        assert_eq!(reports[2].closed_counter, 2);
        assert_eq!(reports[3].closed_counter, 3);
        assert_eq!(reports[4].closed_counter, 0);
        assert_eq!(reports[4].ended_run(), Some(3));
    }

    #[test]
    fn test_blank_lines_skipped_and_bad_lines_rejected() {
        let lines = vec![line(Some(0.3)), String::new(), line(Some(0.3))];
        let (summary, _) = replay(&lines, 30);
        assert_eq!(summary.frames, 2);

        let mut out = Vec::new();
        let err = run("{not json".as_bytes(), &mut out, &DetectionConfig::default(), 30)
            .unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
