//! Video behavior score
//!
//! Weighted sum of per-feature component scores on a 0-100 scale, where
//! higher means more concerning.

use serde::{Deserialize, Serialize};

use crate::detectors::hand::HandSeverity;
use crate::scoring::RiskLevel;
use crate::types::{FeatureStatus, FeatureSummary, Level};

const EYE_CONTACT_WEIGHT: f64 = 0.25;
const EXPRESSION_WEIGHT: f64 = 0.20;
const GESTURE_WEIGHT: f64 = 0.18;
const HEAD_REPETITION_WEIGHT: f64 = 0.15;
const HAND_REPETITION_WEIGHT: f64 = 0.12;
const BLINK_WEIGHT: f64 = 0.05;
const HEAD_MOVEMENT_WEIGHT: f64 = 0.05;

/// Per-feature component scores (0-100)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoComponentScores {
    pub eye_contact: f64,
    pub expression: f64,
    pub gestures: f64,
    pub head_repetition: f64,
    pub hand_repetition: f64,
    pub blink: f64,
    pub head_movement: f64,
}

/// Video-derived behavior score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoScore {
    pub score: f64,
    pub risk_level: RiskLevel,
    pub components: VideoComponentScores,
}

pub struct VideoScorer;

impl VideoScorer {
    /// Score a session. `None` when no frame with a face was processed.
    pub fn score(summary: &FeatureSummary) -> Option<VideoScore> {
        if summary.data_quality.frames_processed == 0 {
            return None;
        }

        let components = VideoComponentScores {
            eye_contact: eye_contact_component(summary.eye_contact.ratio),
            expression: expression_component(summary),
            gestures: gesture_component(summary.gestures.frequency_per_minute),
            head_repetition: head_repetition_component(summary),
            hand_repetition: hand_component(summary.hand_movement.severity),
            blink: blink_component(summary.blink.rate_per_minute),
            head_movement: head_movement_component(summary.head_movement.movement_rate),
        };

        let score = (components.eye_contact * EYE_CONTACT_WEIGHT
            + components.expression * EXPRESSION_WEIGHT
            + components.gestures * GESTURE_WEIGHT
            + components.head_repetition * HEAD_REPETITION_WEIGHT
            + components.hand_repetition * HAND_REPETITION_WEIGHT
            + components.blink * BLINK_WEIGHT
            + components.head_movement * HEAD_MOVEMENT_WEIGHT)
            .clamp(0.0, 100.0);

        Some(VideoScore {
            score,
            risk_level: RiskLevel::from_score(score),
            components,
        })
    }
}

fn eye_contact_component(ratio: f64) -> f64 {
    if ratio < 0.30 {
        90.0
    } else if ratio < 0.50 {
        60.0
    } else {
        20.0
    }
}

fn expression_component(summary: &FeatureSummary) -> f64 {
    if summary.expression.status != FeatureStatus::Available {
        return 0.0;
    }
    let v = summary.expression.variability;
    if v < 0.25 {
        85.0
    } else if v < 0.40 {
        55.0
    } else {
        15.0
    }
}

fn gesture_component(per_minute: f64) -> f64 {
    if per_minute < 2.0 {
        80.0
    } else if per_minute < 4.0 {
        50.0
    } else {
        15.0
    }
}

fn head_repetition_component(summary: &FeatureSummary) -> f64 {
    let head = &summary.head_movement;
    if head.repetition_detected {
        80.0
    } else if matches!(head.level, Level::Normal | Level::High) {
        20.0
    } else {
        0.0
    }
}

fn hand_component(severity: HandSeverity) -> f64 {
    match severity {
        HandSeverity::Normal => 0.0,
        HandSeverity::Low => 30.0,
        HandSeverity::Moderate => 60.0,
        HandSeverity::High => 90.0,
    }
}

fn blink_component(per_minute: f64) -> f64 {
    if per_minute < 10.0 {
        50.0
    } else if per_minute > 30.0 {
        40.0
    } else {
        10.0
    }
}

fn head_movement_component(rate: f64) -> f64 {
    if rate > 0.5 {
        60.0
    } else if rate > 0.3 {
        30.0
    } else {
        10.0
    }
}
