//! Facial landmark data supplied by the detector

use serde::{Deserialize, Serialize};

/// Normalized 2D landmark, (0,0) top-left and (1,1) bottom-right of the frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
}

impl LandmarkPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f32, f32)> for LandmarkPoint {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Six eye-contour landmark indices in role order:
/// outer corner, upper outer, upper inner, inner corner, lower inner, lower outer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeIndexSet(pub [usize; 6]);

/// Left eye on the MediaPipe face mesh (468/478 points)
pub const LEFT_EYE: EyeIndexSet = EyeIndexSet([362, 385, 387, 263, 373, 380]);

/// Right eye on the MediaPipe face mesh
pub const RIGHT_EYE: EyeIndexSet = EyeIndexSet([33, 160, 158, 133, 153, 144]);

/// Number of points in the base face mesh topology
pub const FACE_MESH_POINTS: usize = 468;

/// One detected face
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceLandmarks {
    pub points: Vec<LandmarkPoint>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<LandmarkPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, index: usize) -> Option<LandmarkPoint> {
        self.points.get(index).copied()
    }

    /// Gather the six role points of an eye, `None` if any index is missing
    pub fn eye(&self, indices: &EyeIndexSet) -> Option<[LandmarkPoint; 6]> {
        let mut gathered = [LandmarkPoint::default(); 6];
        for (slot, &index) in gathered.iter_mut().zip(indices.0.iter()) {
            *slot = self.point(index)?;
        }
        Some(gathered)
    }
}
