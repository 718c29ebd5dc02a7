//! Eye openness (eye aspect ratio) from contour landmarks

use serde::{Deserialize, Serialize};

use crate::landmarks::{FaceLandmarks, LandmarkPoint, LEFT_EYE, RIGHT_EYE};

/// Score reported when a measurement cannot be computed.
/// Reads as an open eye so that sensor faults never raise an alert.
pub const OPEN_EYE_FALLBACK: f32 = 0.3;

/// Eye aspect ratio of six role-ordered points:
/// `(|p2.y - p6.y| + |p3.y - p5.y|) / (2 * |p1.x - p4.x|)`.
///
/// Returns 0 when the corners share an x coordinate and
/// [`OPEN_EYE_FALLBACK`] for malformed input (wrong point count, NaN/inf).
pub fn eye_openness(points: &[LandmarkPoint]) -> f32 {
    let [p1, p2, p3, p4, p5, p6] = match points {
        [a, b, c, d, e, f] => [a, b, c, d, e, f],
        _ => return OPEN_EYE_FALLBACK,
    };
    if !points.iter().all(LandmarkPoint::is_finite) {
        return OPEN_EYE_FALLBACK;
    }

    let vertical_1 = (p2.y - p6.y).abs();
    let vertical_2 = (p3.y - p5.y).abs();
    let horizontal = (p1.x - p4.x).abs();

    if horizontal == 0.0 {
        return 0.0;
    }

    let ear = (vertical_1 + vertical_2) / (2.0 * horizontal);
    if ear.is_finite() {
        ear
    } else {
        OPEN_EYE_FALLBACK
    }
}

/// Per-face openness: both eyes plus the aggregate fed to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceOpenness {
    /// Left eye score, `None` when its landmarks were not available
    pub left: Option<f32>,
    /// Right eye score, `None` when its landmarks were not available
    pub right: Option<f32>,
    /// Mean of the available eyes
    pub average: f32,
}

/// Measure both eyes of a face.
///
/// With one eye missing the other is used alone; with both missing the
/// face reads as open.
pub fn face_openness(face: &FaceLandmarks) -> FaceOpenness {
    let left = face.eye(&LEFT_EYE).map(|points| eye_openness(&points));
    let right = face.eye(&RIGHT_EYE).map(|points| eye_openness(&points));

    let average = match (left, right) {
        (Some(l), Some(r)) => (l + r) / 2.0,
        (Some(only), None) | (None, Some(only)) => only,
        (None, None) => OPEN_EYE_FALLBACK,
    };

    FaceOpenness {
        left,
        right,
        average,
    }
}
