//! Eye aspect ratio and blink counting

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::landmarks::{FaceLandmarks, LandmarkSet};

/// Eye contour indices in EAR order (p1..p6) for the eye at mesh 33/133
pub const RIGHT_EYE_CONTOUR: [usize; 6] = [33, 160, 158, 133, 153, 144];
/// Eye contour indices in EAR order (p1..p6) for the eye at mesh 263/362
pub const LEFT_EYE_CONTOUR: [usize; 6] = [263, 387, 385, 362, 380, 373];

/// Horizontal eye width below which EAR is reported as 0
const MIN_EYE_WIDTH: f64 = 1e-3;

/// Compute the eye aspect ratio for one eye.
///
/// `EAR = (|p2 - p6| + |p3 - p5|) / (2 * |p1 - p4|)`
pub fn eye_aspect_ratio(
    face: &FaceLandmarks,
    contour: [usize; 6],
    image_size: Option<(u32, u32)>,
) -> Option<f64> {
    let [p1, p2, p3, p4, p5, p6] = contour.map(|i| face.point(i));
    let (p1, p2, p3, p4, p5, p6) = (p1?, p2?, p3?, p4?, p5?, p6?);

    let vertical = p2.distance(&p6, image_size) + p3.distance(&p5, image_size);
    let horizontal = p1.distance(&p4, image_size);

    if horizontal < MIN_EYE_WIDTH {
        return Some(0.0);
    }
    Some(vertical / (2.0 * horizontal))
}

/// Mean EAR across both eyes, or the single available eye
pub fn mean_ear(landmarks: &LandmarkSet) -> Option<f64> {
    let face = landmarks.face.as_ref()?;
    let left = eye_aspect_ratio(face, LEFT_EYE_CONTOUR, landmarks.image_size);
    let right = eye_aspect_ratio(face, RIGHT_EYE_CONTOUR, landmarks.image_size);
    match (left, right) {
        (Some(l), Some(r)) => Some((l + r) / 2.0),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}

/// Eye state in the blink debounce machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EyeState {
    Open,
    Closed,
}

/// Debounced blink counter.
///
/// A run of closed frames counts as one blink. The eye must reopen past the
/// threshold plus hysteresis before another blink can be counted.
#[derive(Debug, Clone)]
pub struct BlinkDetector {
    threshold: f64,
    hysteresis: f64,
    state: EyeState,
    blink_count: u64,
    closed_frames: u32,
}

impl BlinkDetector {
    pub fn new(threshold: f64, hysteresis: f64) -> Self {
        Self {
            threshold,
            hysteresis,
            state: EyeState::Open,
            blink_count: 0,
            closed_frames: 0,
        }
    }

    /// Feed one EAR sample. Returns true when a blink starts on this frame.
    pub fn update(&mut self, ear: f64) -> bool {
        match self.state {
            EyeState::Open if ear < self.threshold => {
                self.state = EyeState::Closed;
                self.closed_frames = 1;
                self.blink_count += 1;
                debug!(ear, count = self.blink_count, "Blink detected");
                true
            }
            EyeState::Open => false,
            EyeState::Closed if ear >= self.threshold + self.hysteresis => {
                debug!(closed_frames = self.closed_frames, "Eyes reopened");
                self.state = EyeState::Open;
                self.closed_frames = 0;
                false
            }
            EyeState::Closed => {
                self.closed_frames += 1;
                false
            }
        }
    }

    pub fn state(&self) -> EyeState {
        self.state
    }

    pub fn blink_count(&self) -> u64 {
        self.blink_count
    }
}

/// Blinks per minute over the session duration. Zero when the duration is not positive.
pub fn blink_rate_per_minute(blink_count: u64, duration_seconds: f64) -> f64 {
    if duration_seconds > 0.0 {
        blink_count as f64 * 60.0 / duration_seconds
    } else {
        0.0
    }
}
