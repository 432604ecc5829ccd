//! Error types for Earlysight

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while screening a session
#[derive(Debug, Error)]
pub enum ScreeningError {
    #[error("No face or body landmarks detected in frame")]
    MissingFace,

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Emotion service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Emotion service timed out after {0:?}")]
    EmotionTimeout(Duration),

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("Out-of-order frame at {timestamp}s (last accepted {last}s)")]
    OutOfOrderFrame { timestamp: f64, last: f64 },

    #[error("Invalid score: {0}")]
    InvalidScore(String),

    #[error("No score sources: at least one of questionnaire or video score is required")]
    NoScoreSources,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ScreeningError {
    /// Whether the error belongs to a single frame or feature and must be
    /// recovered locally instead of failing the session.
    pub fn is_frame_level(&self) -> bool {
        matches!(
            self,
            ScreeningError::MissingFace
                | ScreeningError::MalformedFrame(_)
                | ScreeningError::OutOfOrderFrame { .. }
                | ScreeningError::ServiceUnavailable(_)
                | ScreeningError::EmotionTimeout(_)
        )
    }
}

pub type ScreeningResult<T> = Result<T, ScreeningError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_level_classification() {
        assert!(ScreeningError::MissingFace.is_frame_level());
        assert!(ScreeningError::MalformedFrame("bad jpeg".into()).is_frame_level());
        assert!(ScreeningError::EmotionTimeout(Duration::from_secs(2)).is_frame_level());
        assert!(!ScreeningError::InvalidSession("abc".into()).is_frame_level());
        assert!(!ScreeningError::NoScoreSources.is_frame_level());
    }
}
