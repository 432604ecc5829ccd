//! Session-level feature summary
//!
//! Turns the counters and histories held in [`SessionState`] into the
//! [`FeatureSummary`] returned when a session ends.

use crate::config::{EmotionBackend, EngineConfig};
use crate::detectors::blink::blink_rate_per_minute;
use crate::detectors::expression::change_rate;
use crate::detectors::gesture::gesture_frequency_per_minute;
use crate::detectors::hand::{HandSeverity, HandTrack};
use crate::detectors::head::movement_level;
use crate::session::state::SessionState;
use crate::types::{
    BlinkSummary, DataQuality, ExpressionSummary, EyeContactSummary, FeatureStatus,
    FeatureSummary, GestureSummary, HandMovementSummary, HandSideSummary, HeadMovementSummary,
    Level, QualityFlag,
};

/// Builds feature summaries from session state
pub struct SummaryBuilder;

impl SummaryBuilder {
    /// Compute the feature summary.
    ///
    /// A non-positive or non-finite `duration_seconds` falls back to the
    /// observed timestamp span; when that is also zero every rate is zero.
    pub fn build(state: &SessionState, duration_seconds: f64, config: &EngineConfig) -> FeatureSummary {
        let duration = effective_duration(duration_seconds, state.observed_span());

        let eye_contact = summarize_eye_contact(state, config);
        let blink = summarize_blink(state, duration);
        let head_movement = summarize_head(state, config);
        let hand_movement = summarize_hands(state, config);
        let gestures = summarize_gestures(state, duration);
        let expression = summarize_expression(state, config);
        let data_quality = summarize_quality(state, duration, &expression, config);

        FeatureSummary {
            session_id: state.session_id.clone(),
            duration_seconds: duration,
            eye_contact,
            blink,
            head_movement,
            hand_movement,
            gestures,
            expression,
            data_quality,
        }
    }
}

/// Reported duration, or the observed span when the reported one is unusable
pub fn effective_duration(reported: f64, observed_span: f64) -> f64 {
    if reported.is_finite() && reported > 0.0 {
        reported
    } else {
        observed_span.max(0.0)
    }
}

fn summarize_eye_contact(state: &SessionState, config: &EngineConfig) -> EyeContactSummary {
    let counter = &state.eye_contact;
    let ratio = counter.ratio();

    let (level, interpretation) = if counter.frames_with_face < config.session.min_face_frames {
        (Level::InsufficientData, "Not enough face frames to assess eye contact")
    } else if ratio < 0.30 {
        (Level::Low, "Significantly reduced eye contact")
    } else if ratio < 0.50 {
        (Level::Moderate, "Below-average eye contact")
    } else {
        (Level::Normal, "Typical eye contact")
    };

    EyeContactSummary {
        ratio,
        frames_with_contact: counter.frames_with_contact,
        frames_with_face: counter.frames_with_face,
        level,
        interpretation: interpretation.to_string(),
    }
}

fn summarize_blink(state: &SessionState, duration: f64) -> BlinkSummary {
    let blink_count = state.blink.blink_count();
    let rate = blink_rate_per_minute(blink_count, duration);

    let (level, interpretation) = if duration <= 0.0 || state.counters.processed == 0 {
        (Level::InsufficientData, "Not enough data to assess blink rate")
    } else if rate < 10.0 {
        (Level::Low, "Below-typical blink rate")
    } else if rate > 30.0 {
        (Level::High, "Above-typical blink rate")
    } else {
        (Level::Normal, "Typical blink rate")
    };

    BlinkSummary {
        blink_count,
        rate_per_minute: rate,
        level,
        interpretation: interpretation.to_string(),
    }
}

fn summarize_head(state: &SessionState, config: &EngineConfig) -> HeadMovementSummary {
    let head = &state.head;
    let d = &config.detectors;
    let span = state.observed_span();
    let movement_rate = if span > 0.0 {
        head.total_displacement() / span
    } else {
        0.0
    };
    let position_std = head.position_std();
    let repetition_detected =
        head.windows_evaluated() > 0 && head.repetitive_windows() >= config.session.head_required_windows.max(1);

    let level = if head.samples() == 0 {
        Level::InsufficientData
    } else {
        movement_level(position_std, d.head_low_std, d.head_high_std)
    };

    let interpretation = if repetition_detected {
        "Repetitive head movements detected"
    } else {
        match level {
            Level::InsufficientData => "Not enough data to assess head movement",
            Level::Low => "Limited head movement",
            Level::High => "Frequent head movement without a repetitive pattern",
            _ => "Typical head movement",
        }
    };

    HeadMovementSummary {
        movement_rate,
        position_std,
        repetition_detected,
        windows_evaluated: head.windows_evaluated(),
        repetitive_windows: head.repetitive_windows(),
        max_cycles: head.max_cycles(),
        max_repetition_score: head.max_score(),
        level,
        interpretation: interpretation.to_string(),
    }
}

fn summarize_hand_side(track: &HandTrack, required_windows: u32) -> HandSideSummary {
    HandSideSummary {
        windows_evaluated: track.windows_evaluated(),
        positive_windows: track.positive_windows(),
        max_score: track.max_score(),
        present: track.is_present(required_windows),
        severity: track.severity(required_windows),
    }
}

fn summarize_hands(state: &SessionState, config: &EngineConfig) -> HandMovementSummary {
    let required = config.session.hand_required_windows;
    let left = summarize_hand_side(&state.hands.left, required);
    let right = summarize_hand_side(&state.hands.right, required);
    let present = left.present || right.present;
    let severity = left.severity.max(right.severity);

    let interpretation = match severity {
        HandSeverity::Normal => "No repetitive hand movements detected",
        HandSeverity::Low => "Mild repetitive hand movements",
        HandSeverity::Moderate => "Moderate repetitive hand movements",
        HandSeverity::High => "Frequent repetitive hand movements",
    };

    HandMovementSummary {
        present,
        severity,
        left,
        right,
        interpretation: interpretation.to_string(),
    }
}

fn summarize_gestures(state: &SessionState, duration: f64) -> GestureSummary {
    let detector = &state.gestures;
    let total = detector.total();
    let frequency = gesture_frequency_per_minute(total, duration);

    let (level, interpretation) = if duration <= 0.0 {
        (Level::InsufficientData, "Not enough data to assess gestures")
    } else if frequency < 2.0 {
        (Level::Low, "Limited use of social gestures")
    } else if frequency < 4.0 {
        (Level::Moderate, "Some use of social gestures")
    } else {
        (Level::Normal, "Typical use of social gestures")
    };

    GestureSummary {
        total,
        pointing: detector.pointing_count(),
        waving: detector.waving_count(),
        frequency_per_minute: frequency,
        level,
        interpretation: interpretation.to_string(),
    }
}

fn summarize_expression(state: &SessionState, config: &EngineConfig) -> ExpressionSummary {
    let tracker = &state.expression;
    let samples = tracker.samples();
    let enough = samples >= config.emotion.min_emotion_samples;
    let service_off =
        config.emotion.backend == EmotionBackend::Disabled || !state.emotion.is_enabled();

    let status = if enough {
        FeatureStatus::Available
    } else if service_off {
        FeatureStatus::Unavailable
    } else {
        FeatureStatus::InsufficientData
    };

    let (variability, level, interpretation) = match status {
        FeatureStatus::Available => {
            let v = tracker.variability();
            let (level, text) = if v < 0.50 {
                (Level::Low, "Limited range of facial expressions")
            } else if v < 0.75 {
                (Level::Moderate, "Moderate range of facial expressions")
            } else {
                (Level::High, "Wide range of facial expressions")
            };
            (v, level, text)
        }
        FeatureStatus::InsufficientData => (
            0.0,
            Level::InsufficientData,
            "Not enough expression samples to assess variability",
        ),
        FeatureStatus::Unavailable => (
            0.0,
            Level::InsufficientData,
            "Facial expression analysis unavailable for this session",
        ),
    };

    ExpressionSummary {
        status,
        variability,
        change_rate: change_rate(tracker.history()),
        samples,
        distribution: tracker.distribution(),
        dominant: tracker.dominant(),
        level,
        interpretation: interpretation.to_string(),
    }
}

fn summarize_quality(
    state: &SessionState,
    duration: f64,
    expression: &ExpressionSummary,
    config: &EngineConfig,
) -> DataQuality {
    let c = &state.counters;
    let considered = c.processed + c.without_face + c.malformed;
    let face_detection_rate = if considered > 0 {
        c.processed as f64 / considered as f64
    } else {
        0.0
    };

    let mut flags = Vec::new();
    if duration < config.session.min_duration_secs {
        flags.push(QualityFlag::ShortSession);
    }
    if c.received < config.session.min_frames {
        flags.push(QualityFlag::FewFrames);
    }
    if face_detection_rate < config.session.min_face_detection_rate {
        flags.push(QualityFlag::LowFaceDetection);
    }
    if expression.status == FeatureStatus::Unavailable {
        flags.push(QualityFlag::EmotionUnavailable);
    }
    if c.out_of_order > 0 {
        flags.push(QualityFlag::OutOfOrderFrames);
    }
    if c.without_gaze > 0 {
        flags.push(QualityFlag::GazeUnmeasured);
    }

    DataQuality {
        frames_received: c.received,
        frames_processed: c.processed,
        frames_without_face: c.without_face,
        frames_malformed: c.malformed,
        frames_out_of_order: c.out_of_order,
        frames_without_gaze: c.without_gaze,
        face_detection_rate,
        flags,
    }
}
