//! Earlysight - Behavioral-signal engine for early autism-risk screening
//!
//! Earlysight turns a stream of video frames into session-level behavioral
//! statistics and fuses them with a caregiver questionnaire score:
//! landmark extraction → per-feature detectors → session aggregation →
//! video score + interpretation → risk fusion → report encoding.
//!
//! ## Modules
//!
//! - **Detectors**: eye contact, blinks, head and hand repetition, social
//!   gestures and facial expression variability
//! - **Sessions**: per-session state with a start / process / end lifecycle
//! - **Scoring**: video behavior score, clinical interpretation and fusion
//!
//! Thresholds are heuristic and configurable. Nothing here is a diagnosis.

pub mod config;
pub mod detectors;
pub mod emotion;
pub mod encoder;
pub mod error;
pub mod landmarks;
pub mod pipeline;
pub mod scoring;
pub mod session;
pub mod types;

#[cfg(feature = "cli")]
pub mod logging;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::EngineConfig;
pub use encoder::{ReportEncoder, ScreeningReport};
pub use error::ScreeningError;
pub use landmarks::{LandmarkExtractor, LandmarkModel, LandmarkSet};
pub use pipeline::{QuestionnaireInput, ScreeningProcessor};
pub use scoring::{fuse_scores, CombinedScore, RiskLevel};
pub use session::{FrameSampler, SessionManager};
pub use types::{FeatureSummary, Frame, FrameOutcome, FrameRecord};

// Emotion exports
pub use emotion::{EmotionClassifier, EmotionGate, RemoteEmotionClient};

/// Engine version embedded in all reports
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "earlysight";
