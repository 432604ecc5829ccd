//! Repetitive hand movement (stimming) detection
//!
//! Each wrist is tracked over a rolling window. A window scores high when the
//! wrist keeps reversing direction on its dominant axis while moving fast
//! enough to matter.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DetectorConfig;
use crate::landmarks::{Handedness, LandmarkSet};

/// Pose landmark index of the left wrist
pub const POSE_LEFT_WRIST: usize = 15;
/// Pose landmark index of the right wrist
pub const POSE_RIGHT_WRIST: usize = 16;

/// Severity of repetitive hand movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandSeverity {
    Normal,
    Low,
    Moderate,
    High,
}

impl HandSeverity {
    /// Map a window score onto ascending `[low, moderate, high]` cutoffs
    pub fn from_score(score: f64, cutoffs: [f64; 3]) -> Self {
        if score < cutoffs[0] {
            HandSeverity::Normal
        } else if score < cutoffs[1] {
            HandSeverity::Low
        } else if score < cutoffs[2] {
            HandSeverity::Moderate
        } else {
            HandSeverity::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HandSeverity::Normal => "normal",
            HandSeverity::Low => "low",
            HandSeverity::Moderate => "moderate",
            HandSeverity::High => "high",
        }
    }
}

/// Wrist position from body pose, falling back to the hand landmarks
pub fn wrist_position(landmarks: &LandmarkSet, handedness: Handedness) -> Option<(f64, f64)> {
    let pose_index = match handedness {
        Handedness::Left => POSE_LEFT_WRIST,
        Handedness::Right => POSE_RIGHT_WRIST,
    };
    landmarks
        .pose_point(pose_index)
        .or_else(|| landmarks.hand(handedness).and_then(|h| h.wrist()))
        .map(|p| (p.x, p.y))
}

/// Metrics for one hand's current window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandWindowMetrics {
    pub handedness: Handedness,
    pub ready: bool,
    /// Range on the dominant axis
    pub range: f64,
    pub reversals: u32,
    /// Path length over time span (normalized units per second)
    pub velocity: f64,
    pub score: f64,
    pub severity: HandSeverity,
}

impl HandWindowMetrics {
    fn not_ready(handedness: Handedness) -> Self {
        Self {
            handedness,
            ready: false,
            range: 0.0,
            reversals: 0,
            velocity: 0.0,
            score: 0.0,
            severity: HandSeverity::Normal,
        }
    }
}

/// Score a full window of (timestamp, wrist position) samples
pub fn analyze_hand_window(
    handedness: Handedness,
    samples: &[(f64, (f64, f64))],
    config: &DetectorConfig,
) -> HandWindowMetrics {
    let n = samples.len();
    if n < 3 {
        return HandWindowMetrics::not_ready(handedness);
    }

    let xs: Vec<f64> = samples.iter().map(|(_, p)| p.0).collect();
    let ys: Vec<f64> = samples.iter().map(|(_, p)| p.1).collect();
    let span = |v: &[f64]| {
        v.iter().copied().fold(f64::NEG_INFINITY, f64::max)
            - v.iter().copied().fold(f64::INFINITY, f64::min)
    };
    let (range_x, range_y) = (span(&xs), span(&ys));
    let (axis, range) = if range_x >= range_y {
        (&xs, range_x)
    } else {
        (&ys, range_y)
    };

    let mut reversals = 0;
    let mut last_sign = 0.0;
    for pair in axis.windows(2) {
        let delta = pair[1] - pair[0];
        if delta.abs() < config.hand_min_step {
            continue;
        }
        let sign = delta.signum();
        if last_sign != 0.0 && sign != last_sign {
            reversals += 1;
        }
        last_sign = sign;
    }

    let path: f64 = samples
        .windows(2)
        .map(|w| {
            let (a, b) = (w[0].1, w[1].1);
            ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt()
        })
        .sum();
    let time_span = samples[n - 1].0 - samples[0].0;
    let velocity = if time_span > 0.0 { path / time_span } else { 0.0 };

    let score = if range < config.hand_min_amplitude {
        0.0
    } else {
        let reversal_rate = reversals as f64 / (n.saturating_sub(2)).max(1) as f64;
        reversal_rate * (1.0 - (-velocity / config.hand_reference_velocity).exp())
    };

    HandWindowMetrics {
        handedness,
        ready: true,
        range,
        reversals,
        velocity,
        score,
        severity: HandSeverity::from_score(score, config.hand_severity_cutoffs),
    }
}

/// Rolling window and session counters for one hand
#[derive(Debug, Clone)]
pub struct HandTrack {
    handedness: Handedness,
    window: VecDeque<(f64, (f64, f64))>,
    frames_since_eval: usize,
    windows_evaluated: u32,
    positive_windows: u32,
    max_score: f64,
    max_severity: HandSeverity,
}

impl HandTrack {
    pub fn new(handedness: Handedness) -> Self {
        Self {
            handedness,
            window: VecDeque::new(),
            frames_since_eval: 0,
            windows_evaluated: 0,
            positive_windows: 0,
            max_score: 0.0,
            max_severity: HandSeverity::Normal,
        }
    }

    fn update(&mut self, timestamp: f64, position: (f64, f64), config: &DetectorConfig) -> HandWindowMetrics {
        let size = config.hand_window;
        self.window.push_back((timestamp, position));
        while self.window.len() > size {
            self.window.pop_front();
        }
        self.frames_since_eval += 1;

        if self.window.len() < size {
            return HandWindowMetrics::not_ready(self.handedness);
        }

        let samples: Vec<(f64, (f64, f64))> = self.window.iter().copied().collect();
        let metrics = analyze_hand_window(self.handedness, &samples, config);

        if self.frames_since_eval >= size {
            self.frames_since_eval = 0;
            self.windows_evaluated += 1;
            if metrics.severity >= HandSeverity::Low {
                self.positive_windows += 1;
            }
            self.max_score = self.max_score.max(metrics.score);
            self.max_severity = self.max_severity.max(metrics.severity);
            debug!(
                hand = ?self.handedness,
                reversals = metrics.reversals,
                velocity = metrics.velocity,
                score = metrics.score,
                severity = ?metrics.severity,
                "Hand window evaluated"
            );
        }

        metrics
    }

    pub fn windows_evaluated(&self) -> u32 {
        self.windows_evaluated
    }

    pub fn positive_windows(&self) -> u32 {
        self.positive_windows
    }

    pub fn max_score(&self) -> f64 {
        self.max_score
    }

    /// Whether enough windows were flagged to report the behavior
    pub fn is_present(&self, required_windows: u32) -> bool {
        self.positive_windows >= required_windows.max(1)
    }

    /// Worst recorded severity, or `Normal` when the behavior is not present
    pub fn severity(&self, required_windows: u32) -> HandSeverity {
        if self.is_present(required_windows) {
            self.max_severity
        } else {
            HandSeverity::Normal
        }
    }
}

/// Tracks both wrists for a session
#[derive(Debug, Clone)]
pub struct HandMovementTracker {
    pub left: HandTrack,
    pub right: HandTrack,
}

impl Default for HandMovementTracker {
    fn default() -> Self {
        Self {
            left: HandTrack::new(Handedness::Left),
            right: HandTrack::new(Handedness::Right),
        }
    }
}

impl HandMovementTracker {
    /// Update each visible wrist. Hands not visible this frame are skipped.
    pub fn update(
        &mut self,
        timestamp: f64,
        landmarks: &LandmarkSet,
        config: &DetectorConfig,
    ) -> Vec<HandWindowMetrics> {
        let mut metrics = Vec::with_capacity(2);
        if let Some(pos) = wrist_position(landmarks, Handedness::Left) {
            metrics.push(self.left.update(timestamp, pos, config));
        }
        if let Some(pos) = wrist_position(landmarks, Handedness::Right) {
            metrics.push(self.right.update(timestamp, pos, config));
        }
        metrics
    }
}
