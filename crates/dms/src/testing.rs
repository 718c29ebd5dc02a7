//! Synthetic face meshes for tests

use crate::landmarks::{EyeIndexSet, FaceLandmarks, LandmarkPoint, FACE_MESH_POINTS};
use crate::{LEFT_EYE, RIGHT_EYE};

/// Eye of width 0.1 whose two vertical gaps are both `gap`
pub fn eye_with_gap(cx: f32, gap: f32) -> [LandmarkPoint; 6] {
    let half = gap / 2.0;
    [
        LandmarkPoint::new(cx - 0.05, 0.5),
        LandmarkPoint::new(cx - 0.02, 0.5 - half),
        LandmarkPoint::new(cx + 0.02, 0.5 - half),
        LandmarkPoint::new(cx + 0.05, 0.5),
        LandmarkPoint::new(cx + 0.02, 0.5 + half),
        LandmarkPoint::new(cx - 0.02, 0.5 + half),
    ]
}

/// Write `eye` into `points` at the slots named by `indices`
pub fn place(points: &mut [LandmarkPoint], indices: &EyeIndexSet, eye: [LandmarkPoint; 6]) {
    for (&index, point) in indices.0.iter().zip(eye) {
        points[index] = point;
    }
}

/// Full face mesh with both eyes set to the given openness
pub fn face_with_ear(ear: f32) -> FaceLandmarks {
    // width 0.1 => EAR = gap / 0.1
    let gap = ear * 0.1;
    let mut points = vec![LandmarkPoint::new(0.5, 0.5); FACE_MESH_POINTS];
    place(&mut points, &LEFT_EYE, eye_with_gap(0.65, gap));
    place(&mut points, &RIGHT_EYE, eye_with_gap(0.35, gap));
    FaceLandmarks::new(points)
}
