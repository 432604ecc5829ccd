//! HTTP client for the emotion classification service.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EmotionServiceConfig;
use crate::emotion::{EmotionClassifier, EmotionPrediction};
use crate::error::ScreeningError;

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    image: &'a str,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: Option<String>,
}

/// Client for the remote emotion service.
#[derive(Debug, Clone)]
pub struct RemoteEmotionClient {
    http: Client,
    timeout: Duration,
    classify_url: String,
    health_url: String,
}

impl RemoteEmotionClient {
    /// Create a new client. The HTTP timeout matches the per-call budget.
    pub fn new(config: &EmotionServiceConfig) -> Result<Self, ScreeningError> {
        let http = Client::builder().timeout(config.call_timeout()).build()?;
        let base = config.base_url.trim_end_matches('/');

        Ok(Self {
            http,
            timeout: config.call_timeout(),
            classify_url: format!("{}{}", base, config.classify_path),
            health_url: format!("{}{}", base, config.health_path),
        })
    }

    pub fn classify_url(&self) -> &str {
        &self.classify_url
    }

    pub fn health_url(&self) -> &str {
        &self.health_url
    }

    fn map_send_error(&self, e: reqwest::Error) -> ScreeningError {
        if e.is_timeout() {
            ScreeningError::EmotionTimeout(self.timeout)
        } else if e.is_decode() {
            ScreeningError::Http(e)
        } else {
            ScreeningError::ServiceUnavailable(e.to_string())
        }
    }
}

#[async_trait]
impl EmotionClassifier for RemoteEmotionClient {
    async fn classify(&self, face_crop: &[u8]) -> Result<EmotionPrediction, ScreeningError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(face_crop);
        debug!(bytes = face_crop.len(), "Sending face crop to {}", self.classify_url);

        let response = self
            .http
            .post(&self.classify_url)
            .json(&ClassifyRequest { image: &encoded })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ScreeningError::ServiceUnavailable(format!(
                "emotion service returned {}: {}",
                status, body
            )));
        }

        let prediction: EmotionPrediction =
            response.json().await.map_err(|e| self.map_send_error(e))?;
        Ok(prediction)
    }

    async fn health_check(&self) -> bool {
        match self.http.get(&self.health_url).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<HealthResponse>().await {
                    Ok(health) => health.status == "healthy" || health.status == "ok",
                    Err(e) => {
                        warn!("Emotion service health response unreadable: {}", e);
                        false
                    }
                }
            }
            Ok(response) => {
                warn!("Emotion service health check failed: {}", response.status());
                false
            }
            Err(e) => {
                warn!("Emotion service health check error: {}", e);
                false
            }
        }
    }
}
