//! Risk scoring
//!
//! Every path that turns a 0-100 score into a risk bucket goes through
//! [`RiskLevel::from_score`], so video-only, questionnaire-only and combined
//! scores share the same thresholds.

pub mod fusion;
pub mod interpretation;
pub mod video;

use serde::{Deserialize, Serialize};

pub use fusion::{fuse_scores, CombinedScore, ScoreSource};
pub use interpretation::{ClinicalInterpretation, ClinicalInterpreter};
pub use video::{VideoComponentScores, VideoScore, VideoScorer};

/// Scores at or above this are moderate risk
pub const MODERATE_RISK_THRESHOLD: f64 = 30.0;
/// Scores at or above this are high risk
pub const HIGH_RISK_THRESHOLD: f64 = 60.0;

/// Risk bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    /// Bucket a 0-100 score
    pub fn from_score(score: f64) -> Self {
        if score >= HIGH_RISK_THRESHOLD {
            RiskLevel::High
        } else if score >= MODERATE_RISK_THRESHOLD {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }
}
