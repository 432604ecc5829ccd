//! Emotion classification capability
//!
//! Facial expression labels come from a separately hosted classifier. The
//! [`EmotionClassifier`] trait hides the transport; [`EmotionGate`] wraps any
//! implementation with the per-session timeout, retry and disable policy.

pub mod client;
pub mod gate;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ScreeningError;
use crate::types::Emotion;

pub use client::RemoteEmotionClient;
pub use gate::EmotionGate;

/// Classifier output for one face crop
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmotionPrediction {
    pub dominant_emotion: String,
    #[serde(default, alias = "emotion_scores", alias = "emotions")]
    pub distribution: HashMap<String, f64>,
}

impl EmotionPrediction {
    /// Parsed dominant label; `None` for "unknown" or unrecognized labels
    pub fn label(&self) -> Option<Emotion> {
        Emotion::from_label(&self.dominant_emotion)
    }
}

/// Something that can classify a face crop into an emotion label
#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    /// Classify a JPEG face crop
    async fn classify(&self, face_crop: &[u8]) -> Result<EmotionPrediction, ScreeningError>;

    /// Whether the classifier is ready to serve requests
    async fn health_check(&self) -> bool;
}
