//! Capture worker feeding frames to async consumers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{CameraConfig, FrameSource, VideoFrame};

/// Async capture service for tokio.
///
/// The source is driven on a dedicated OS thread so that blocking reads and
/// decoding never stall the runtime. Frames arrive strictly in order.
pub struct CaptureService {
    receiver: mpsc::Receiver<VideoFrame>,
    shutdown: Arc<AtomicBool>,
}

impl CaptureService {
    /// Spawn the capture thread for `source`
    pub fn spawn<S>(mut source: S, config: CameraConfig) -> Self
    where
        S: FrameSource + 'static,
    {
        let (tx, rx) = mpsc::channel::<VideoFrame>(config.queue_depth.max(1));
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        std::thread::spawn(move || {
            let interval = Duration::from_nanos(config.frame_interval_ns());
            info!("Capture thread started ({} fps, realtime={})", config.fps, config.realtime);

            while !shutdown_clone.load(Ordering::SeqCst) {
                let started = Instant::now();
                match source.next_frame() {
                    Ok(Some(frame)) => {
                        if tx.blocking_send(frame).is_err() {
                            debug!("Frame receiver dropped");
                            break;
                        }
                    }
                    Ok(None) => {
                        info!("Frame source exhausted");
                        break;
                    }
                    Err(e) if e.is_recoverable() => {
                        warn!("Skipping frame: {}", e);
                    }
                    Err(e) => {
                        error!("Frame capture failed: {}", e);
                        break;
                    }
                }

                if config.realtime {
                    if let Some(rest) = interval.checked_sub(started.elapsed()) {
                        std::thread::sleep(rest);
                    }
                }
            }
        });

        Self {
            receiver: rx,
            shutdown,
        }
    }

    /// Receive next frame; `None` once the source is exhausted or stopped
    pub async fn next(&mut self) -> Option<VideoFrame> {
        self.receiver.recv().await
    }

    /// Ask the capture thread to stop after the current frame
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

impl Drop for CaptureService {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CameraError, MemorySource};

    fn frames(count: u32) -> Vec<VideoFrame> {
        (0..count)
            .map(|i| VideoFrame::new(vec![0; 3], 1, 1, i as u64, i))
            .collect()
    }

    #[tokio::test]
    async fn test_frames_arrive_in_order() {
        let mut service =
            CaptureService::spawn(MemorySource::new(frames(5)), CameraConfig::offline(30));

        let mut seen = Vec::new();
        while let Some(frame) = service.next().await {
            seen.push(frame.sequence);
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    struct FailingSource;

    impl FrameSource for FailingSource {
        fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
            Err(CameraError::Stream("device unplugged".into()))
        }
    }

    /// Fails to decode every second frame
    struct GlitchySource {
        next: u32,
        total: u32,
    }

    impl FrameSource for GlitchySource {
        fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
            if self.next >= self.total {
                return Ok(None);
            }
            let sequence = self.next;
            self.next += 1;
            if sequence % 2 == 1 {
                return Err(CameraError::Buffer(format!("frame {} truncated", sequence)));
            }
            Ok(Some(VideoFrame::new(vec![0; 3], 1, 1, sequence as u64, sequence)))
        }
    }

    #[tokio::test]
    async fn test_bad_frame_is_skipped() {
        let source = GlitchySource { next: 0, total: 5 };
        let mut service = CaptureService::spawn(source, CameraConfig::offline(30));

        let mut seen = Vec::new();
        while let Some(frame) = service.next().await {
            seen.push(frame.sequence);
        }
        assert_eq!(seen, vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn test_source_error_ends_stream() {
        let mut service = CaptureService::spawn(FailingSource, CameraConfig::offline(30));
        assert!(service.next().await.is_none());
    }
}
