//! Landmark detection backends

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use camera_capture::frame::VideoFrame;
use image::imageops;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tract_onnx::prelude::*;

use crate::landmarks::{FaceLandmarks, LandmarkPoint, FACE_MESH_POINTS};
use crate::DmsError;

/// Turns a frame into zero or more faces of normalized landmarks
pub trait LandmarkDetector {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<FaceLandmarks>, DmsError>;
}

impl<D: LandmarkDetector + ?Sized> LandmarkDetector for Box<D> {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<FaceLandmarks>, DmsError> {
        (**self).detect(frame)
    }
}

/// Face-mesh model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceMeshConfig {
    /// ONNX model file
    pub path: Option<PathBuf>,
    /// Square input edge in pixels
    pub input_size: usize,
    /// Minimum face-presence probability
    pub min_detection_confidence: f32,
}

impl Default for FaceMeshConfig {
    fn default() -> Self {
        Self {
            path: None,
            input_size: 192,
            min_detection_confidence: 0.5,
        }
    }
}

/// Single-face mesh regressor run with tract.
///
/// Expects an NHWC float input in [0, 1], one output holding `N * 3`
/// landmark coordinates in input pixels (N >= 468) and optionally a
/// single-value face-presence logit.
pub struct FaceMeshDetector {
    model: TypedRunnableModel<TypedModel>,
    input_size: usize,
    min_confidence: f32,
}

impl FaceMeshDetector {
    pub fn new(config: &FaceMeshConfig) -> Result<Self, DmsError> {
        let path = config
            .path
            .as_deref()
            .ok_or_else(|| DmsError::ModelLoad("no face mesh model path configured".into()))?;
        Self::load(path, config.input_size, config.min_detection_confidence)
    }

    pub fn load(path: &Path, input_size: usize, min_confidence: f32) -> Result<Self, DmsError> {
        info!("Loading face mesh model from {}", path.display());

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|m| m.with_input_fact(0, f32::fact([1, input_size, input_size, 3]).into()))
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| DmsError::ModelLoad(format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            model,
            input_size,
            min_confidence,
        })
    }

    fn input_tensor(&self, frame: &VideoFrame) -> Result<Tensor, DmsError> {
        let image = frame
            .to_image()
            .map_err(|e| DmsError::ImageProcessing(e.to_string()))?;
        let size = self.input_size as u32;
        let resized = imageops::resize(&image, size, size, imageops::FilterType::Triangle);

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, self.input_size, self.input_size, 3),
            |(_, y, x, c)| resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0,
        );
        Ok(input.into())
    }
}

impl LandmarkDetector for FaceMeshDetector {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<FaceLandmarks>, DmsError> {
        let input = self.input_tensor(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| DmsError::Inference(e.to_string()))?;

        let mut coords: Option<&[f32]> = None;
        let mut presence_logit: Option<f32> = None;
        for output in outputs.iter() {
            let values = output
                .as_slice::<f32>()
                .map_err(|e| DmsError::Inference(e.to_string()))?;
            if values.len() == 1 {
                presence_logit = Some(values[0]);
            } else if values.len() >= FACE_MESH_POINTS * 3 && values.len() % 3 == 0 {
                coords = Some(values);
            }
        }

        let coords = coords.ok_or_else(|| {
            DmsError::Inference("model produced no landmark tensor".into())
        })?;

        if let Some(logit) = presence_logit {
            let confidence = sigmoid(logit);
            if confidence < self.min_confidence {
                debug!("Face presence {:.2} below {:.2}", confidence, self.min_confidence);
                return Ok(Vec::new());
            }
        }

        Ok(vec![decode_landmarks(coords, self.input_size as f32)])
    }
}

/// Convert flat `[x, y, z, x, y, z, ...]` pixel coordinates to normalized points
pub fn decode_landmarks(coords: &[f32], input_size: f32) -> FaceLandmarks {
    let points = coords
        .chunks_exact(3)
        .map(|xyz| LandmarkPoint::new(xyz[0] / input_size, xyz[1] / input_size))
        .collect();
    FaceLandmarks::new(points)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Replays landmark sets recorded elsewhere, one entry per frame.
/// An exhausted script reports no faces.
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    frames: VecDeque<Vec<FaceLandmarks>>,
}

impl ScriptedDetector {
    pub fn new(frames: impl IntoIterator<Item = Vec<FaceLandmarks>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn push(&mut self, faces: Vec<FaceLandmarks>) {
        self.frames.push_back(faces);
    }
}

impl LandmarkDetector for ScriptedDetector {
    fn detect(&mut self, _frame: &VideoFrame) -> Result<Vec<FaceLandmarks>, DmsError> {
        Ok(self.frames.pop_front().unwrap_or_default())
    }
}
