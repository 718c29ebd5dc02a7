//! Status overlay for annotated frames

use ab_glyph::{FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use serde::Serialize;
use tracing::warn;

use crate::analysis::FrameReport;
use crate::config::DetectionConfig;
use crate::landmarks::{FaceLandmarks, LEFT_EYE, RIGHT_EYE};

pub const ALERT_RED: [u8; 3] = [255, 0, 0];
pub const OPEN_GREEN: [u8; 3] = [0, 255, 0];
pub const TEXT_WHITE: [u8; 3] = [255, 255, 255];
pub const COUNTER_CYAN: [u8; 3] = [0, 255, 255];

/// Pixel height of text drawn at scale 1.0
pub const TEXT_PX_PER_SCALE: f32 = 30.0;

static FONT: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

/// One line of status text for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayLine {
    pub text: String,
    pub color: [u8; 3],
    /// Baseline origin in pixels
    pub origin: (u32, u32),
    pub scale: f32,
}

/// Human-readable status for one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub lines: Vec<OverlayLine>,
    pub alerting: bool,
}

impl Overlay {
    /// Build the overlay; frames without a face get none
    pub fn from_report(report: &FrameReport, config: &DetectionConfig) -> Option<Self> {
        let score = report.avg_score()?;
        let alerting = report.has_alerts() || report.alert_active;

        let (status, status_color) = if alerting {
            ("ALERT! Eyes Closed", ALERT_RED)
        } else {
            ("Eyes Open", OPEN_GREEN)
        };

        let lines = vec![
            line(status, status_color, (30, 40), 0.8),
            line(&format!("EAR: {:.3}", score), TEXT_WHITE, (30, 70), 0.6),
            line(&format!("Frames: {}", report.closed_counter), COUNTER_CYAN, (30, 100), 0.6),
            line(&format!("Threshold: {:.2}", config.threshold), TEXT_WHITE, (30, 130), 0.6),
        ];

        Some(Self { lines, alerting })
    }

    pub fn status_color(&self) -> [u8; 3] {
        if self.alerting {
            ALERT_RED
        } else {
            OPEN_GREEN
        }
    }
}

fn line(text: &str, color: [u8; 3], origin: (u32, u32), scale: f32) -> OverlayLine {
    OverlayLine {
        text: text.to_string(),
        color,
        origin,
        scale,
    }
}

/// Paint a status banner, the overlay text, and eye-contour markers onto the frame
pub fn annotate(image: &mut RgbImage, overlay: &Overlay, faces: &[FaceLandmarks]) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let color = Rgb(overlay.status_color());
    let banner = (height / 40).max(4).min(height);
    draw_filled_rect_mut(image, Rect::at(0, 0).of_size(width, banner), color);

    match FontRef::try_from_slice(FONT) {
        Ok(font) => {
            for line in &overlay.lines {
                let px = line.scale * TEXT_PX_PER_SCALE;
                // origin is the baseline, imageproc wants the top edge
                let top = line.origin.1 as i32 - px.round() as i32;
                draw_text_mut(
                    image,
                    Rgb(line.color),
                    line.origin.0 as i32,
                    top,
                    PxScale::from(px),
                    &font,
                    &line.text,
                );
            }
        }
        Err(e) => warn!("Overlay font unusable, drawing without text: {}", e),
    }

    let radius = ((width.min(height) / 240) as i32).max(1);
    for face in faces {
        for indices in [&LEFT_EYE, &RIGHT_EYE] {
            let Some(points) = face.eye(indices) else {
                continue;
            };
            for point in points.iter().filter(|p| p.is_finite()) {
                let x = (point.x * width as f32).round() as i32;
                let y = (point.y * height as f32).round() as i32;
                draw_filled_circle_mut(image, (x, y), radius, color);
            }
        }
    }
}
