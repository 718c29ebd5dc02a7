//! Per-frame orchestration: detect, decide, annotate

use camera_capture::frame::VideoFrame;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::FrameReport;
use crate::config::DetectionConfig;
use crate::detector::LandmarkDetector;
use crate::landmarks::FaceLandmarks;
use crate::overlay::{self, Overlay};
use crate::{DmsError, DrowsinessMonitor};

/// Pipeline options
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Mirror frames before detection (selfie view)
    pub mirror: bool,
    /// Paint the status overlay into the output frame
    pub annotate: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            mirror: true,
            annotate: true,
        }
    }
}

/// Output of one pipeline step
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    /// Mirrored and, when a face was found, annotated frame
    pub frame: VideoFrame,
    pub report: FrameReport,
    pub overlay: Option<Overlay>,
    pub faces: Vec<FaceLandmarks>,
}

/// Drives one stream. Frames must be processed one at a time, in order.
pub struct FramePipeline<D> {
    detector: D,
    monitor: DrowsinessMonitor,
    options: PipelineOptions,
}

impl<D: LandmarkDetector> FramePipeline<D> {
    pub fn new(detector: D, options: PipelineOptions) -> Self {
        Self {
            detector,
            monitor: DrowsinessMonitor::new(),
            options,
        }
    }

    /// Process one frame against the config current at call time.
    ///
    /// Detector failures are returned without touching the closure state.
    pub fn process(
        &mut self,
        mut frame: VideoFrame,
        config: &DetectionConfig,
        now: DateTime<Utc>,
    ) -> Result<ProcessedFrame, DmsError> {
        if self.options.mirror {
            frame.flip_horizontal();
        }

        let faces = self.detector.detect(&frame)?;
        let report = self.monitor.observe(&faces, config, now);
        let overlay = Overlay::from_report(&report, config);

        if let Some(overlay) = overlay.as_ref().filter(|_| self.options.annotate) {
            let mut image = frame.to_image()?;
            overlay::annotate(&mut image, overlay, &faces);
            frame.replace_image(image);
        }

        Ok(ProcessedFrame {
            frame,
            report,
            overlay,
            faces,
        })
    }

    pub fn monitor(&self) -> &DrowsinessMonitor {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut DrowsinessMonitor {
        &mut self.monitor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::ScriptedDetector;
    use crate::testing::face_with_ear;
    use chrono::{Duration, TimeZone};

    fn blank(width: u32, height: u32) -> VideoFrame {
        VideoFrame::new(vec![0; (width * height * 3) as usize], width, height, 0, 0)
    }

    fn at_ms(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    struct BrokenDetector;

    impl LandmarkDetector for BrokenDetector {
        fn detect(&mut self, _frame: &VideoFrame) -> Result<Vec<FaceLandmarks>, DmsError> {
            Err(DmsError::Inference("session lost".into()))
        }
    }

    #[test]
    fn test_no_face_passes_frame_through() {
        let mut pipeline =
            FramePipeline::new(ScriptedDetector::default(), PipelineOptions::default());
        let out = pipeline.process(blank(64, 48), &DetectionConfig::default(), at_ms(0)).unwrap();

        assert!(!out.report.face_detected);
        assert!(out.overlay.is_none());
        assert!(out.frame.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_alert_after_required_frames() {
        let config = DetectionConfig::default();
        let script = (0..5).map(|_| vec![face_with_ear(0.1)]);
        let mut pipeline =
            FramePipeline::new(ScriptedDetector::new(script), PipelineOptions::default());

        let mut last = None;
        for i in 0..5 {
            last = Some(pipeline.process(blank(64, 48), &config, at_ms(i * 33)).unwrap());
        }
        let last = last.unwrap();

        assert_eq!(last.report.closed_counter, 5);
        assert!(last.report.has_alerts());
        let overlay = last.overlay.unwrap();
        assert!(overlay.alerting);
        // banner painted red
        assert_eq!(last.frame.get_pixel(0, 0), Some(overlay::ALERT_RED));
    }

    #[test]
    fn test_annotation_can_be_disabled() {
        let options = PipelineOptions {
            mirror: false,
            annotate: false,
        };
        let detector = ScriptedDetector::new(vec![vec![face_with_ear(0.3)]]);
        let mut pipeline = FramePipeline::new(detector, options);
        let out = pipeline.process(blank(64, 48), &DetectionConfig::default(), at_ms(0)).unwrap();

        assert!(out.overlay.is_some());
        assert!(out.frame.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_detector_error_keeps_state() {
        let config = DetectionConfig::default();
        let mut pipeline = FramePipeline::new(BrokenDetector, PipelineOptions::default());
        pipeline.monitor_mut().observe(&[face_with_ear(0.1)], &config, at_ms(0));

        assert!(pipeline.process(blank(8, 8), &config, at_ms(33)).is_err());
        assert_eq!(pipeline.monitor().state().closed_counter, 1);
    }

    #[test]
    fn test_config_change_between_frames() {
        let script = (0..4).map(|_| vec![face_with_ear(0.2)]);
        let mut pipeline =
            FramePipeline::new(ScriptedDetector::new(script), PipelineOptions::default());
        let mut config = DetectionConfig::default();

        pipeline.process(blank(8, 8), &config, at_ms(0)).unwrap();
        pipeline.process(blank(8, 8), &config, at_ms(33)).unwrap();
        config.consecutive_frames = 3;
        let out = pipeline.process(blank(8, 8), &config, at_ms(66)).unwrap();
        assert!(out.report.has_alerts());

        config.threshold = 0.15;
        let out = pipeline.process(blank(8, 8), &config, at_ms(99)).unwrap();
        assert_eq!(out.report.closed_counter, 0);
        assert!(!out.report.alert_active);
    }
}
