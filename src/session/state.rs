//! Per-session mutable state and frame ingestion

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::detectors::blink::mean_ear;
use crate::detectors::head::head_center;
use crate::detectors::{
    BlinkDetector, ExpressionTracker, EyeContactCounter, GazeEstimator, GestureDetector,
    HandMovementTracker, HeadMovementTracker,
};
use crate::emotion::EmotionGate;
use crate::error::ScreeningError;
use crate::landmarks::{Extraction, LandmarkExtractor};
use crate::types::{Emotion, FeatureSummary, Frame, FrameOutcome, FrameStatus, LiveIndicators};

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Active,
    Ending,
    Ended,
}

/// Frame accounting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameCounters {
    pub received: u64,
    pub processed: u64,
    pub without_face: u64,
    pub malformed: u64,
    pub out_of_order: u64,
    /// Processed frames where gaze could not be measured
    pub without_gaze: u64,
}

/// Everything a session accumulates between start and end
#[derive(Debug)]
pub struct SessionState {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub phase: SessionPhase,
    pub first_timestamp: Option<f64>,
    pub last_timestamp: Option<f64>,
    pub counters: FrameCounters,
    pub eye_contact: EyeContactCounter,
    pub blink: BlinkDetector,
    pub head: HeadMovementTracker,
    pub hands: HandMovementTracker,
    pub gestures: GestureDetector,
    pub expression: ExpressionTracker,
    pub emotion: EmotionGate,
    /// Summary cached by the first `end_session`
    pub summary: Option<FeatureSummary>,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>, config: &EngineConfig, emotion: EmotionGate) -> Self {
        let d = &config.detectors;
        Self {
            session_id: session_id.into(),
            started_at: Utc::now(),
            phase: SessionPhase::Active,
            first_timestamp: None,
            last_timestamp: None,
            counters: FrameCounters::default(),
            eye_contact: EyeContactCounter::default(),
            blink: BlinkDetector::new(d.blink_ear_threshold, d.blink_hysteresis),
            head: HeadMovementTracker::new(d.head_window),
            hands: HandMovementTracker::default(),
            gestures: GestureDetector::default(),
            expression: ExpressionTracker::default(),
            emotion,
            summary: None,
        }
    }

    /// Seconds between the first and last accepted frame
    pub fn observed_span(&self) -> f64 {
        match (self.first_timestamp, self.last_timestamp) {
            (Some(first), Some(last)) => (last - first).max(0.0),
            _ => 0.0,
        }
    }

    /// Run one frame through extraction and every detector.
    ///
    /// Frame-level problems are counted and reported in the outcome status;
    /// they never fail the session.
    pub async fn ingest(
        &mut self,
        frame: Frame,
        extractor: &LandmarkExtractor,
        config: &EngineConfig,
    ) -> FrameOutcome {
        let frame_index = self.counters.received;
        self.counters.received += 1;
        let timestamp = frame.timestamp;

        let outcome = |status, indicators| FrameOutcome {
            frame_index,
            timestamp,
            status,
            indicators,
        };

        if !timestamp.is_finite() {
            self.counters.malformed += 1;
            debug!(session_id = %self.session_id, frame_index, "Frame with non-finite timestamp");
            return outcome(FrameStatus::Malformed, None);
        }
        if let Some(last) = self.last_timestamp {
            if timestamp < last {
                self.counters.out_of_order += 1;
                let err = ScreeningError::OutOfOrderFrame { timestamp, last };
                warn!(session_id = %self.session_id, frame_index, "{}", err);
                return outcome(FrameStatus::OutOfOrder, None);
            }
        }
        self.last_timestamp = Some(timestamp);
        self.first_timestamp.get_or_insert(timestamp);

        match extractor.extract(&frame) {
            Ok(extraction) => {
                self.counters.processed += 1;
                let indicators = self.observe(timestamp, &extraction, config).await;
                outcome(FrameStatus::Processed, Some(indicators))
            }
            Err(ScreeningError::MissingFace) => {
                self.counters.without_face += 1;
                debug!(session_id = %self.session_id, frame_index, "No face in frame");
                outcome(FrameStatus::NoFace, None)
            }
            Err(e) => {
                self.counters.malformed += 1;
                debug!(session_id = %self.session_id, frame_index, error = %e, "Frame skipped");
                outcome(FrameStatus::Malformed, None)
            }
        }
    }

    async fn observe(
        &mut self,
        timestamp: f64,
        extraction: &Extraction,
        config: &EngineConfig,
    ) -> LiveIndicators {
        let d = &config.detectors;
        let landmarks = &extraction.landmarks;

        let gaze = GazeEstimator::estimate(landmarks, d.eye_open_ear, d.gaze_offset_threshold);
        let eye_contact = match gaze {
            Some(reading) => {
                self.eye_contact.record(reading.eye_contact);
                reading.eye_contact
            }
            None => {
                // Without iris landmarks the frame says nothing about contact
                self.counters.without_gaze += 1;
                false
            }
        };

        let ear = mean_ear(landmarks);
        let blink = ear.is_some_and(|e| self.blink.update(e));

        let head = head_center(landmarks)
            .map(|p| self.head.update(p, d))
            .unwrap_or_default();
        let hands = self.hands.update(timestamp, landmarks, d);
        let gestures = self.gestures.update(landmarks, d);

        let emotion = self
            .sample_emotion(timestamp, extraction.face_crop.as_deref(), config)
            .await;

        LiveIndicators {
            eye_contact,
            gaze_offset: gaze.map(|g| g.offset),
            ear,
            blink,
            head,
            hands,
            gestures,
            emotion,
        }
    }

    async fn sample_emotion(
        &mut self,
        timestamp: f64,
        face_crop: Option<&[u8]>,
        config: &EngineConfig,
    ) -> Option<Emotion> {
        if !self.emotion.is_enabled() {
            return None;
        }
        let crop = face_crop?;
        let first = self.first_timestamp?;
        if !self.expression.should_sample(
            timestamp,
            first,
            config.emotion.warmup_secs,
            config.emotion.sample_every,
        ) {
            return None;
        }

        let emotion = self.emotion.classify(crop).await?;
        self.expression.record(emotion);
        Some(emotion)
    }
}
