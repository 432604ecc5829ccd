//! Core data types for Earlysight
//!
//! Frames flowing into a session, per-frame live indicators, and the
//! session-level feature summary computed when a session ends.

use std::collections::BTreeMap;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detectors::gesture::GestureKind;
use crate::detectors::hand::{HandSeverity, HandWindowMetrics};
use crate::detectors::head::HeadWindowMetrics;
use crate::error::ScreeningError;
use crate::landmarks::LandmarkSet;

/// One video frame submitted to a session
#[derive(Debug, Clone)]
pub struct Frame {
    /// Capture time in seconds, non-decreasing within a session
    pub timestamp: f64,
    pub payload: FramePayload,
}

/// Frame contents
#[derive(Debug, Clone)]
pub enum FramePayload {
    /// JPEG or PNG bytes; landmarks are inferred by the configured model
    Encoded(Vec<u8>),
    /// Landmarks tracked client-side, with an optional JPEG face crop
    Landmarks {
        landmarks: Option<LandmarkSet>,
        face_crop: Option<Vec<u8>>,
    },
}

impl Frame {
    pub fn encoded(timestamp: f64, bytes: Vec<u8>) -> Self {
        Self {
            timestamp,
            payload: FramePayload::Encoded(bytes),
        }
    }

    pub fn with_landmarks(timestamp: f64, landmarks: LandmarkSet) -> Self {
        Self {
            timestamp,
            payload: FramePayload::Landmarks {
                landmarks: Some(landmarks),
                face_crop: None,
            },
        }
    }

    /// Frame where client-side tracking found nothing
    pub fn empty(timestamp: f64) -> Self {
        Self {
            timestamp,
            payload: FramePayload::Landmarks {
                landmarks: None,
                face_crop: None,
            },
        }
    }

    pub fn with_face_crop(mut self, crop: Vec<u8>) -> Self {
        if let FramePayload::Landmarks { face_crop, .. } = &mut self.payload {
            *face_crop = Some(crop);
        }
        self
    }
}

/// Serialized frame as read from NDJSON replays
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    pub timestamp: f64,
    /// Base64 image, optionally as a `data:` URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<LandmarkSet>,
    /// Base64 JPEG face crop, optionally as a `data:` URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_crop: Option<String>,
}

impl FrameRecord {
    pub fn into_frame(self) -> Result<Frame, ScreeningError> {
        if let Some(image) = self.image {
            return Ok(Frame::encoded(self.timestamp, decode_base64_payload(&image)?));
        }
        let face_crop = self
            .face_crop
            .map(|crop| decode_base64_payload(&crop))
            .transpose()?;
        Ok(Frame {
            timestamp: self.timestamp,
            payload: FramePayload::Landmarks {
                landmarks: self.landmarks,
                face_crop,
            },
        })
    }
}

/// Decode a base64 payload, stripping a `data:<mime>;base64,` prefix if present
pub fn decode_base64_payload(data: &str) -> Result<Vec<u8>, ScreeningError> {
    let body = match data.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    base64::engine::general_purpose::STANDARD
        .decode(body.trim())
        .map_err(|e| ScreeningError::MalformedFrame(format!("invalid base64 payload: {e}")))
}

/// Qualitative level attached to a feature aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    Moderate,
    Normal,
    High,
    InsufficientData,
}

/// Facial expression categories reported by the emotion classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    /// Parse a classifier label. Unknown labels yield `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "angry" | "anger" => Some(Emotion::Angry),
            "disgust" | "disgusted" => Some(Emotion::Disgust),
            "fear" | "fearful" => Some(Emotion::Fear),
            "happy" | "happiness" => Some(Emotion::Happy),
            "sad" | "sadness" => Some(Emotion::Sad),
            "surprise" | "surprised" => Some(Emotion::Surprise),
            "neutral" => Some(Emotion::Neutral),
            _ => None,
        }
    }
}

/// Whether an optional feature could be computed for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    Available,
    InsufficientData,
    Unavailable,
}

/// Outcome of a single frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameStatus {
    Processed,
    NoFace,
    Malformed,
    OutOfOrder,
}

/// Detector outputs for one processed frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveIndicators {
    pub eye_contact: bool,
    pub gaze_offset: Option<f64>,
    pub ear: Option<f64>,
    /// A blink started on this frame
    pub blink: bool,
    pub head: HeadWindowMetrics,
    pub hands: Vec<HandWindowMetrics>,
    pub gestures: Vec<GestureKind>,
    pub emotion: Option<Emotion>,
}

/// Result of `process_frame`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameOutcome {
    pub frame_index: u64,
    pub timestamp: f64,
    pub status: FrameStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indicators: Option<LiveIndicators>,
}

/// Acknowledgement returned by `start_session`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAck {
    pub session_id: String,
    pub started_at_utc: DateTime<Utc>,
    /// Whether facial expression variability will be computed
    pub emotion_available: bool,
}

/// Eye contact aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EyeContactSummary {
    /// frames_with_contact / frames_with_face, in [0, 1]
    pub ratio: f64,
    pub frames_with_contact: u64,
    /// Face frames where gaze could be measured
    pub frames_with_face: u64,
    pub level: Level,
    pub interpretation: String,
}

/// Blink aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlinkSummary {
    pub blink_count: u64,
    pub rate_per_minute: f64,
    pub level: Level,
    pub interpretation: String,
}

/// Head movement aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadMovementSummary {
    /// Nose displacement per second (normalized units)
    pub movement_rate: f64,
    pub position_std: f64,
    pub repetition_detected: bool,
    pub windows_evaluated: u32,
    pub repetitive_windows: u32,
    pub max_cycles: f64,
    pub max_repetition_score: f64,
    pub level: Level,
    pub interpretation: String,
}

/// Repetitive hand movement aggregate for one hand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandSideSummary {
    pub windows_evaluated: u32,
    pub positive_windows: u32,
    pub max_score: f64,
    pub present: bool,
    pub severity: HandSeverity,
}

/// Repetitive hand movement aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandMovementSummary {
    pub present: bool,
    pub severity: HandSeverity,
    pub left: HandSideSummary,
    pub right: HandSideSummary,
    pub interpretation: String,
}

/// Social gesture aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureSummary {
    pub total: u64,
    pub pointing: u64,
    pub waving: u64,
    pub frequency_per_minute: f64,
    pub level: Level,
    pub interpretation: String,
}

/// Facial expression variability aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionSummary {
    pub status: FeatureStatus,
    /// Normalized Shannon entropy of the label histogram, in [0, 1]
    pub variability: f64,
    /// Fraction of consecutive samples whose label changed
    pub change_rate: f64,
    pub samples: usize,
    pub distribution: BTreeMap<Emotion, u64>,
    pub dominant: Option<Emotion>,
    pub level: Level,
    pub interpretation: String,
}

/// Conditions that lower confidence in a session's summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    ShortSession,
    FewFrames,
    LowFaceDetection,
    EmotionUnavailable,
    OutOfOrderFrames,
    GazeUnmeasured,
}

/// Frame accounting for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    pub frames_received: u64,
    pub frames_processed: u64,
    pub frames_without_face: u64,
    pub frames_malformed: u64,
    pub frames_out_of_order: u64,
    /// Face frames excluded from eye contact for lack of iris landmarks
    pub frames_without_gaze: u64,
    pub face_detection_rate: f64,
    pub flags: Vec<QualityFlag>,
}

/// Session-level feature aggregates, computed once when the session ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub session_id: String,
    pub duration_seconds: f64,
    pub eye_contact: EyeContactSummary,
    pub blink: BlinkSummary,
    pub head_movement: HeadMovementSummary,
    pub hand_movement: HandMovementSummary,
    pub gestures: GestureSummary,
    pub expression: ExpressionSummary,
    pub data_quality: DataQuality,
}
