//! Gaze direction and eye contact

use serde::{Deserialize, Serialize};

use crate::detectors::blink::mean_ear;
use crate::landmarks::{FaceLandmarks, LandmarkSet, Point};

/// Iris contour points for the eye at mesh 33/133
pub const RIGHT_IRIS: [usize; 4] = [469, 470, 471, 472];
/// Iris contour points for the eye at mesh 263/362
pub const LEFT_IRIS: [usize; 4] = [474, 475, 476, 477];

/// (inner, outer) corners for the eye at mesh 33/133
const RIGHT_EYE_CORNERS: (usize, usize) = (133, 33);
/// (inner, outer) corners for the eye at mesh 263/362
const LEFT_EYE_CORNERS: (usize, usize) = (362, 263);

const MIN_EYE_SPAN: f64 = 1e-6;

/// Gaze reading for one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeReading {
    /// |ratio - 0.5| averaged across eyes; 0 means looking straight ahead
    pub offset: f64,
    pub ear: f64,
    pub eye_contact: bool,
}

/// Iris position ratio between the inner (0) and outer (1) eye corners
pub fn iris_ratio(face: &FaceLandmarks, iris: [usize; 4], corners: (usize, usize)) -> Option<f64> {
    let points: Vec<Point> = iris.iter().filter_map(|&i| face.point(i)).collect();
    if points.len() != iris.len() {
        return None;
    }
    let iris_x = points.iter().map(|p| p.x).sum::<f64>() / points.len() as f64;

    let inner = face.point(corners.0)?;
    let outer = face.point(corners.1)?;
    let span = outer.x - inner.x;
    if span.abs() < MIN_EYE_SPAN {
        return Some(0.5);
    }
    Some((iris_x - inner.x) / span)
}

/// Gaze offset averaged across eyes, or `None` without iris landmarks
pub fn gaze_offset(face: &FaceLandmarks) -> Option<f64> {
    let offsets: Vec<f64> = [
        iris_ratio(face, LEFT_IRIS, LEFT_EYE_CORNERS),
        iris_ratio(face, RIGHT_IRIS, RIGHT_EYE_CORNERS),
    ]
    .into_iter()
    .flatten()
    .map(|ratio| (ratio - 0.5).abs())
    .collect();

    if offsets.is_empty() {
        return None;
    }
    Some(offsets.iter().sum::<f64>() / offsets.len() as f64)
}

/// Stateless eye-contact estimator
pub struct GazeEstimator;

impl GazeEstimator {
    /// Estimate gaze for one frame.
    ///
    /// Contact requires open eyes and an offset under `offset_threshold`.
    pub fn estimate(
        landmarks: &LandmarkSet,
        eye_open_ear: f64,
        offset_threshold: f64,
    ) -> Option<GazeReading> {
        let face = landmarks.face.as_ref()?;
        let offset = gaze_offset(face)?;
        let ear = mean_ear(landmarks)?;

        Some(GazeReading {
            offset,
            ear,
            eye_contact: ear >= eye_open_ear && offset < offset_threshold,
        })
    }
}

/// Running eye-contact counters for a session
#[derive(Debug, Clone, Default)]
pub struct EyeContactCounter {
    pub frames_with_face: u64,
    pub frames_with_contact: u64,
}

impl EyeContactCounter {
    pub fn record(&mut self, contact: bool) {
        self.frames_with_face += 1;
        if contact {
            self.frames_with_contact += 1;
        }
    }

    /// Contact ratio in [0, 1]; 0 when no face frames were seen
    pub fn ratio(&self) -> f64 {
        if self.frames_with_face == 0 {
            return 0.0;
        }
        (self.frames_with_contact as f64 / self.frames_with_face as f64).clamp(0.0, 1.0)
    }
}
