//! Questionnaire and video score fusion

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ScreeningError;
use crate::scoring::RiskLevel;

/// Weight of the questionnaire score when both sources are present
pub const QUESTIONNAIRE_WEIGHT: f64 = 0.6;
/// Weight of the video score when both sources are present
pub const VIDEO_WEIGHT: f64 = 0.4;

/// Which inputs contributed to a combined score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    Questionnaire,
    Video,
}

/// Final risk classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedScore {
    /// Questionnaire score on the 0-100 scale
    pub questionnaire_score: Option<f64>,
    pub video_score: Option<f64>,
    pub questionnaire_weight: f64,
    pub video_weight: f64,
    pub final_score: f64,
    pub risk_level: RiskLevel,
    /// Questionnaire model confidence, passed through unchanged
    pub confidence: Option<f64>,
    pub sources: Vec<ScoreSource>,
}

fn check_range(name: &str, value: f64, max: f64) -> Result<f64, ScreeningError> {
    if value.is_finite() && (0.0..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ScreeningError::InvalidScore(format!(
            "{name} must be within [0, {max}], got {value}"
        )))
    }
}

/// Fuse a questionnaire probability (0-1) and a video score (0-100).
///
/// Both present: `q * 100 * 0.6 + video * 0.4`. One present: that score.
/// Neither: `NoScoreSources`.
pub fn fuse_scores(
    questionnaire_probability: Option<f64>,
    video_score: Option<f64>,
    confidence: Option<f64>,
) -> Result<CombinedScore, ScreeningError> {
    let questionnaire_score = questionnaire_probability
        .map(|q| check_range("questionnaire probability", q, 1.0).map(|q| q * 100.0))
        .transpose()?;
    let video_score = video_score
        .map(|v| check_range("video score", v, 100.0))
        .transpose()?;
    let confidence = confidence
        .map(|c| check_range("confidence", c, 1.0))
        .transpose()?;

    let (final_score, questionnaire_weight, video_weight, sources) =
        match (questionnaire_score, video_score) {
            (Some(q), Some(v)) => (
                q * QUESTIONNAIRE_WEIGHT + v * VIDEO_WEIGHT,
                QUESTIONNAIRE_WEIGHT,
                VIDEO_WEIGHT,
                vec![ScoreSource::Questionnaire, ScoreSource::Video],
            ),
            (Some(q), None) => (q, 1.0, 0.0, vec![ScoreSource::Questionnaire]),
            (None, Some(v)) => (v, 0.0, 1.0, vec![ScoreSource::Video]),
            (None, None) => return Err(ScreeningError::NoScoreSources),
        };

    let risk_level = RiskLevel::from_score(final_score);
    debug!(final_score, ?risk_level, ?sources, "Scores fused");

    Ok(CombinedScore {
        questionnaire_score,
        video_score,
        questionnaire_weight,
        video_weight,
        final_score,
        risk_level,
        confidence,
        sources,
    })
}
