//! Frame sources

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use image::imageops;
use tracing::{debug, info};

use crate::{CameraConfig, CameraError, VideoFrame};

/// File extensions recognised as still frames
const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// A producer of frames. `Ok(None)` marks the end of the stream.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError>;
}

/// Reads a directory of still images in file-name order, one image per frame.
///
/// Timestamps are synthesised from the configured frame rate so that
/// time-based logic downstream sees the recording's own timeline.
pub struct ImageSequenceSource {
    paths: VecDeque<PathBuf>,
    interval_ns: u64,
    resize: Option<(u32, u32)>,
    sequence: u32,
}

impl ImageSequenceSource {
    /// Open a directory of frames
    pub fn open(dir: impl AsRef<Path>, config: &CameraConfig) -> Result<Self, CameraError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CameraError::Open(format!("{}: {}", dir.display(), e)))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_frame_file(path))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(CameraError::Open(format!(
                "{}: no image frames found",
                dir.display()
            )));
        }

        info!("Opened image sequence {} ({} frames)", dir.display(), paths.len());

        Ok(Self {
            paths: paths.into(),
            interval_ns: config.frame_interval_ns(),
            resize: config.resize,
            sequence: 0,
        })
    }

    /// Frames left to deliver
    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };

        // an undecodable file still takes its slot on the timeline
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        let decoded = image::open(&path).map_err(|source| CameraError::Decode {
            path: path.display().to_string(),
            source,
        })?;
        let mut rgb = decoded.to_rgb8();
        if let Some((width, height)) = self.resize {
            rgb = imageops::resize(&rgb, width, height, imageops::FilterType::Triangle);
        }
        debug!("Decoded frame {} from {}", sequence, path.display());

        Ok(Some(VideoFrame::from_image(
            rgb,
            sequence as u64 * self.interval_ns,
            sequence,
        )))
    }
}

/// Serves frames that are already in memory
#[derive(Debug, Default)]
pub struct MemorySource {
    frames: VecDeque<VideoFrame>,
}

impl MemorySource {
    pub fn new(frames: impl IntoIterator<Item = VideoFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        Ok(self.frames.pop_front())
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}
