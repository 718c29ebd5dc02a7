//! Camera Capture Library for the Drowsiness Monitor
//!
//! Provides frame acquisition for the eye-closure pipeline:
//! - `VideoFrame`, the decoded RGB frame handed to the landmark detector
//! - `FrameSource` implementations (still-image sequences, in-memory frames)
//! - `CaptureService`, a dedicated worker thread pacing a source into a channel

pub mod frame;
pub mod service;
pub mod source;

pub use frame::VideoFrame;
pub use service::CaptureService;
pub use source::{FrameSource, ImageSequenceSource, MemorySource};

use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open source: {0}")]
    Open(String),

    #[error("Failed to decode frame {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid frame buffer: {0}")]
    Buffer(String),

    #[error("Streaming error: {0}")]
    Stream(String),
}

impl CameraError {
    /// Whether the failure is confined to one frame, so capture can go on
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CameraError::Decode { .. } | CameraError::Buffer(_))
    }
}

/// Capture configuration
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Target FPS used for pacing and synthetic timestamps
    pub fps: u32,
    /// Frames buffered between the capture thread and the consumer
    pub queue_depth: usize,
    /// Sleep between frames to emulate a live camera
    pub realtime: bool,
    /// Resize decoded frames to (width, height)
    pub resize: Option<(u32, u32)>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            queue_depth: 8,
            realtime: true,
            resize: None,
        }
    }
}

impl CameraConfig {
    /// Webcam-like capture (640x480 @ 30fps, paced)
    pub fn webcam() -> Self {
        Self {
            resize: Some((640, 480)),
            ..Default::default()
        }
    }

    /// Offline replay: no pacing, frames delivered as fast as the consumer drains them
    pub fn offline(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            realtime: false,
            ..Default::default()
        }
    }

    /// Nanoseconds between frames at the configured rate
    pub fn frame_interval_ns(&self) -> u64 {
        1_000_000_000 / self.fps.max(1) as u64
    }
}
