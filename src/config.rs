//! Engine configuration
//!
//! All detector thresholds are heuristic constants. They are exposed here so
//! deployments can tune them, with defaults matching the reference screening
//! setup.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ScreeningError;

/// Top-level configuration for the screening engine
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-feature detector thresholds
    pub detectors: DetectorConfig,
    /// Emotion classification service
    pub emotion: EmotionServiceConfig,
    /// Session-level aggregation settings
    pub session: SessionConfig,
    /// Logging configuration (used by the CLI)
    pub logging: LoggingConfig,
}

/// Thresholds and window sizes for the per-frame detectors
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    /// Mean EAR at or above which the eyes count as open for eye contact
    pub eye_open_ear: f64,
    /// Maximum gaze offset (|ratio - 0.5|) that counts as contact
    pub gaze_offset_threshold: f64,
    /// EAR below which the eyes are closed
    pub blink_ear_threshold: f64,
    /// Extra EAR margin required to re-open after a closure
    pub blink_hysteresis: f64,

    /// Rolling window for head oscillation analysis (frames)
    pub head_window: usize,
    /// Moving-average width applied before extrema counting
    pub smoothing: usize,
    /// Minimum axis range for oscillations to count
    pub head_min_range: f64,
    /// Position std at which the variance factor reaches ~63 %
    pub head_reference_std: f64,
    /// Repetition score above which head movement is repetitive
    pub head_repetition_threshold: f64,
    /// Position std below which head movement is low
    pub head_low_std: f64,
    /// Position std at or above which head movement is high
    pub head_high_std: f64,

    /// Rolling window for wrist oscillation analysis (frames)
    pub hand_window: usize,
    /// Minimum per-frame displacement counted as active motion
    pub hand_min_step: f64,
    /// Minimum range on the dominant axis
    pub hand_min_amplitude: f64,
    /// Velocity (units/s) at which the velocity factor reaches ~63 %
    pub hand_reference_velocity: f64,
    /// Severity cutoffs: [low, moderate, high]
    pub hand_severity_cutoffs: [f64; 3],

    /// Frames a pointing shape must be held
    pub gesture_hold_frames: u32,
    /// Frames to wait after a gesture before counting another
    pub gesture_cooldown_frames: u32,
    /// Maximum per-frame wrist motion for a held gesture
    pub gesture_max_motion: f64,
    /// Frames inspected for waving reversals
    pub wave_window: usize,
    /// Minimum horizontal range of a wave
    pub wave_min_range: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            eye_open_ear: 0.18,
            gaze_offset_threshold: 0.18,
            blink_ear_threshold: 0.18,
            blink_hysteresis: 0.02,
            head_window: 30,
            smoothing: 3,
            head_min_range: 0.02,
            head_reference_std: 0.01,
            head_repetition_threshold: 3.0,
            head_low_std: 0.005,
            head_high_std: 0.03,
            hand_window: 30,
            hand_min_step: 0.003,
            hand_min_amplitude: 0.008,
            hand_reference_velocity: 0.3,
            hand_severity_cutoffs: [0.10, 0.20, 0.35],
            gesture_hold_frames: 3,
            gesture_cooldown_frames: 5,
            gesture_max_motion: 0.015,
            wave_window: 6,
            wave_min_range: 0.02,
        }
    }
}

/// Which emotion classifier implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionBackend {
    /// Separately hosted HTTP service
    Remote,
    /// Facial expression variability is not computed
    Disabled,
}

/// Emotion classification service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmotionServiceConfig {
    pub backend: EmotionBackend,
    /// Base URL of the service
    pub base_url: String,
    pub classify_path: String,
    pub health_path: String,
    /// Budget for one classification, retries included (milliseconds)
    pub call_timeout_ms: u64,
    /// Retries after a failed call, within the budget
    pub max_retries: u32,
    /// Frames ignored at the start of a session (seconds)
    pub warmup_secs: f64,
    /// Classify every n-th eligible frame
    pub sample_every: u32,
    /// Samples needed before variability is reported
    pub min_emotion_samples: usize,
}

impl Default for EmotionServiceConfig {
    fn default() -> Self {
        Self {
            backend: EmotionBackend::Remote,
            base_url: "http://localhost:8001".to_string(),
            classify_path: "/classify".to_string(),
            health_path: "/health".to_string(),
            call_timeout_ms: 2_000,
            max_retries: 1,
            warmup_secs: 2.0,
            sample_every: 1,
            min_emotion_samples: 20,
        }
    }
}

impl EmotionServiceConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// Session aggregation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Non-overlapping windows that must be flagged before a repetitive
    /// hand behavior is reported as present
    pub hand_required_windows: u32,
    /// Same, for head repetition
    pub head_required_windows: u32,
    /// Face frames needed for a confident eye-contact level
    pub min_face_frames: u64,
    /// Sessions shorter than this are flagged (seconds)
    pub min_duration_secs: f64,
    /// Sessions with fewer frames are flagged
    pub min_frames: u64,
    /// Face detection rate below which the session is flagged
    pub min_face_detection_rate: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            hand_required_windows: 2,
            head_required_windows: 1,
            min_face_frames: 10,
            min_duration_secs: 10.0,
            min_frames: 30,
            min_face_detection_rate: 0.5,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "earlysight=debug,warn")
    pub level: String,
    /// Emit structured JSON logs
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file. Missing sections use defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ScreeningError> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides on top of this configuration.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("EARLYSIGHT_EMOTION_URL") {
            if url.is_empty() || url == "none" {
                self.emotion.backend = EmotionBackend::Disabled;
            } else {
                self.emotion.base_url = url;
                self.emotion.backend = EmotionBackend::Remote;
            }
        }
        if let Some(ms) = std::env::var("EARLYSIGHT_EMOTION_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.emotion.call_timeout_ms = ms;
        }
        if let Some(retries) = std::env::var("EARLYSIGHT_EMOTION_RETRIES")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.emotion.max_retries = retries;
        }
        if let Ok(level) = std::env::var("EARLYSIGHT_LOG") {
            self.logging.level = level;
        }
        self
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Reject configurations the detectors cannot run with
    pub fn validate(&self) -> Result<(), ScreeningError> {
        let d = &self.detectors;
        if d.head_window < 5 {
            return Err(ScreeningError::Config(format!(
                "head_window must be at least 5 frames, got {}",
                d.head_window
            )));
        }
        if d.hand_window < 5 {
            return Err(ScreeningError::Config(format!(
                "hand_window must be at least 5 frames, got {}",
                d.hand_window
            )));
        }
        if d.smoothing == 0 || d.smoothing >= d.head_window {
            return Err(ScreeningError::Config(format!(
                "smoothing must be in 1..{}, got {}",
                d.head_window, d.smoothing
            )));
        }
        let c = d.hand_severity_cutoffs;
        if !(c[0] <= c[1] && c[1] <= c[2]) {
            return Err(ScreeningError::Config(
                "hand_severity_cutoffs must be ascending".to_string(),
            ));
        }
        if d.head_reference_std <= 0.0 || d.hand_reference_velocity <= 0.0 {
            return Err(ScreeningError::Config(
                "reference std and velocity must be positive".to_string(),
            ));
        }
        if self.emotion.sample_every == 0 {
            return Err(ScreeningError::Config(
                "emotion.sample_every must be at least 1".to_string(),
            ));
        }
        if self.emotion.backend == EmotionBackend::Remote && self.emotion.base_url.is_empty() {
            return Err(ScreeningError::Config(
                "emotion.base_url is required for the remote backend".to_string(),
            ));
        }
        Ok(())
    }
}
