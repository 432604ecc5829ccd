//! Social gesture detection (pointing and waving)

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DetectorConfig;
use crate::landmarks::{HandLandmarks, Handedness, LandmarkSet};

/// (tip, pip) landmark pairs for index, middle, ring and pinky
const FINGERS: [(usize, usize); 4] = [(8, 6), (12, 10), (16, 14), (20, 18)];

/// Horizontal wrist deltas below this are ignored when counting wave reversals
const WAVE_MIN_STEP: f64 = 1e-3;
const WAVE_MIN_REVERSALS: u32 = 2;

/// A counted social gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    Pointing,
    Waving,
}

/// Static hand shape in a single frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandShape {
    Pointing,
    OpenPalm,
    Other,
}

/// Classify a hand shape from finger extension.
///
/// A finger is extended when its tip is above its PIP joint in the image.
pub fn classify_hand_shape(hand: &HandLandmarks) -> HandShape {
    let extended: Vec<bool> = FINGERS
        .iter()
        .map(|&(tip, pip)| match (hand.point(tip), hand.point(pip)) {
            (Some(t), Some(p)) => t.y < p.y,
            _ => false,
        })
        .collect();

    match extended.as_slice() {
        [true, false, false, false] => HandShape::Pointing,
        [true, true, true, true] => HandShape::OpenPalm,
        _ => HandShape::Other,
    }
}

fn count_reversals(xs: &VecDeque<f64>, min_step: f64) -> u32 {
    let mut reversals = 0;
    let mut last_sign = 0.0;
    for (a, b) in xs.iter().zip(xs.iter().skip(1)) {
        let delta = b - a;
        if delta.abs() < min_step {
            continue;
        }
        let sign = delta.signum();
        if last_sign != 0.0 && sign != last_sign {
            reversals += 1;
        }
        last_sign = sign;
    }
    reversals
}

#[derive(Debug, Clone, Default)]
struct HandGestureState {
    hold_frames: u32,
    cooldown: u32,
    wrist_x: VecDeque<f64>,
    last_wrist: Option<(f64, f64)>,
}

impl HandGestureState {
    fn reset(&mut self) {
        self.hold_frames = 0;
        self.wrist_x.clear();
        self.last_wrist = None;
    }

    fn update(&mut self, hand: &HandLandmarks, config: &DetectorConfig) -> Option<GestureKind> {
        let wrist = hand.wrist().map(|p| (p.x, p.y))?;
        let motion = self
            .last_wrist
            .map(|(lx, ly)| ((wrist.0 - lx).powi(2) + (wrist.1 - ly).powi(2)).sqrt())
            .unwrap_or(0.0);
        self.last_wrist = Some(wrist);

        self.wrist_x.push_back(wrist.0);
        while self.wrist_x.len() > config.wave_window {
            self.wrist_x.pop_front();
        }

        if self.cooldown > 0 {
            self.cooldown -= 1;
            self.hold_frames = 0;
            return None;
        }

        let gesture = match classify_hand_shape(hand) {
            HandShape::Pointing => {
                if motion <= config.gesture_max_motion {
                    self.hold_frames += 1;
                } else {
                    self.hold_frames = 0;
                }
                (self.hold_frames >= config.gesture_hold_frames).then_some(GestureKind::Pointing)
            }
            HandShape::OpenPalm => {
                self.hold_frames = 0;
                let max = self.wrist_x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let min = self.wrist_x.iter().copied().fold(f64::INFINITY, f64::min);
                let waving = max - min >= config.wave_min_range
                    && count_reversals(&self.wrist_x, WAVE_MIN_STEP) >= WAVE_MIN_REVERSALS;
                waving.then_some(GestureKind::Waving)
            }
            HandShape::Other => {
                self.hold_frames = 0;
                None
            }
        };

        if gesture.is_some() {
            self.hold_frames = 0;
            self.wrist_x.clear();
            self.cooldown = config.gesture_cooldown_frames;
        }
        gesture
    }
}

/// Per-session gesture counter
#[derive(Debug, Clone, Default)]
pub struct GestureDetector {
    left: HandGestureState,
    right: HandGestureState,
    pointing: u64,
    waving: u64,
}

impl GestureDetector {
    /// Process the hands in one frame and return gestures counted on it
    pub fn update(&mut self, landmarks: &LandmarkSet, config: &DetectorConfig) -> Vec<GestureKind> {
        let mut gestures = Vec::new();
        for handedness in [Handedness::Left, Handedness::Right] {
            let state = match handedness {
                Handedness::Left => &mut self.left,
                Handedness::Right => &mut self.right,
            };
            match landmarks.hand(handedness) {
                Some(hand) => {
                    if let Some(gesture) = state.update(hand, config) {
                        debug!(hand = ?handedness, gesture = ?gesture, "Gesture detected");
                        gestures.push(gesture);
                    }
                }
                None => {
                    state.cooldown = state.cooldown.saturating_sub(1);
                    state.reset();
                }
            }
        }

        for gesture in &gestures {
            match gesture {
                GestureKind::Pointing => self.pointing += 1,
                GestureKind::Waving => self.waving += 1,
            }
        }
        gestures
    }

    pub fn pointing_count(&self) -> u64 {
        self.pointing
    }

    pub fn waving_count(&self) -> u64 {
        self.waving
    }

    pub fn total(&self) -> u64 {
        self.pointing + self.waving
    }
}

/// Gestures per minute; never negative
pub fn gesture_frequency_per_minute(total: u64, duration_seconds: f64) -> f64 {
    if duration_seconds > 0.0 {
        total as f64 * 60.0 / duration_seconds
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{make_test_hand, TestHandShape};

    fn make_test_frame(hand: HandLandmarks) -> LandmarkSet {
        LandmarkSet {
            hands: vec![hand],
            ..Default::default()
        }
    }

    #[test]
    fn test_shape_classification() {
        let pointing = make_test_hand(Handedness::Right, (0.5, 0.6), TestHandShape::Pointing);
        let palm = make_test_hand(Handedness::Right, (0.5, 0.6), TestHandShape::OpenPalm);
        let fist = make_test_hand(Handedness::Right, (0.5, 0.6), TestHandShape::Fist);

        assert_eq!(classify_hand_shape(&pointing), HandShape::Pointing);
        assert_eq!(classify_hand_shape(&palm), HandShape::OpenPalm);
        assert_eq!(classify_hand_shape(&fist), HandShape::Other);
    }

    #[test]
    fn test_held_point_counts_once_per_cooldown() {
        let config = DetectorConfig::default();
        let mut detector = GestureDetector::default();
        let frame = make_test_frame(make_test_hand(
            Handedness::Right,
            (0.5, 0.6),
            TestHandShape::Pointing,
        ));

        let mut events = Vec::new();
        for _ in 0..8 {
            events.extend(detector.update(&frame, &config));
        }
        // Counted on frame 3, then 5 cooldown frames
        assert_eq!(events, vec![GestureKind::Pointing]);

        for _ in 0..3 {
            events.extend(detector.update(&frame, &config));
        }
        assert_eq!(detector.pointing_count(), 2);
    }

    #[test]
    fn test_moving_point_does_not_count() {
        let config = DetectorConfig::default();
        let mut detector = GestureDetector::default();
        for i in 0..10 {
            let x = 0.3 + 0.05 * i as f64;
            let frame = make_test_frame(make_test_hand(
                Handedness::Left,
                (x, 0.6),
                TestHandShape::Pointing,
            ));
            detector.update(&frame, &config);
        }
        assert_eq!(detector.total(), 0);
    }

    #[test]
    fn test_wave_detected() {
        let config = DetectorConfig::default();
        let mut detector = GestureDetector::default();
        let xs = [0.50, 0.54, 0.50, 0.54, 0.50];
        let mut events = Vec::new();
        for x in xs {
            let frame = make_test_frame(make_test_hand(
                Handedness::Right,
                (x, 0.6),
                TestHandShape::OpenPalm,
            ));
            events.extend(detector.update(&frame, &config));
        }
        assert_eq!(events, vec![GestureKind::Waving]);
        assert_eq!(detector.waving_count(), 1);
    }

    #[test]
    fn test_still_open_palm_is_not_a_wave() {
        let config = DetectorConfig::default();
        let mut detector = GestureDetector::default();
        let frame = make_test_frame(make_test_hand(
            Handedness::Right,
            (0.5, 0.6),
            TestHandShape::OpenPalm,
        ));
        for _ in 0..10 {
            detector.update(&frame, &config);
        }
        assert_eq!(detector.total(), 0);
    }

    #[test]
    fn test_frequency_non_negative() {
        assert_eq!(gesture_frequency_per_minute(0, 60.0), 0.0);
        assert_eq!(gesture_frequency_per_minute(3, 0.0), 0.0);
        assert!((gesture_frequency_per_minute(3, 90.0) - 2.0).abs() < 1e-12);
    }
}
