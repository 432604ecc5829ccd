//! Per-session circuit breaker for emotion classification.
//!
//! The gate starts enabled only if the classifier passes a health check when
//! the session starts. Once disabled it stays disabled for the rest of the
//! session; the expression feature then reports as unavailable while every
//! other feature keeps running.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::EmotionServiceConfig;
use crate::emotion::EmotionClassifier;
use crate::error::ScreeningError;
use crate::types::Emotion;

/// Gate state
#[derive(Clone, Debug, PartialEq)]
pub enum GateState {
    /// Calls go through to the classifier
    Enabled,
    /// Classification is off for the rest of the session
    Disabled { reason: String },
}

/// Circuit breaker around an [`EmotionClassifier`]
pub struct EmotionGate {
    classifier: Option<Arc<dyn EmotionClassifier>>,
    state: GateState,
    failure_seen: bool,
    call_timeout: Duration,
    max_retries: u32,
    calls: u64,
}

impl std::fmt::Debug for EmotionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmotionGate")
            .field("state", &self.state)
            .field("failure_seen", &self.failure_seen)
            .field("call_timeout", &self.call_timeout)
            .field("max_retries", &self.max_retries)
            .field("calls", &self.calls)
            .finish()
    }
}

impl EmotionGate {
    /// Create a gate. Without a classifier the gate starts disabled.
    pub fn new(classifier: Option<Arc<dyn EmotionClassifier>>, config: &EmotionServiceConfig) -> Self {
        let state = if classifier.is_some() {
            GateState::Enabled
        } else {
            GateState::Disabled {
                reason: "emotion classifier not configured".to_string(),
            }
        };
        Self {
            classifier,
            state,
            failure_seen: false,
            call_timeout: config.call_timeout(),
            max_retries: config.max_retries,
            calls: 0,
        }
    }

    /// Run the session-start health check, disabling the gate if it fails
    pub async fn probe(&mut self) -> bool {
        let Some(classifier) = self.classifier.clone() else {
            return false;
        };
        if !self.is_enabled() {
            return false;
        }
        let healthy = tokio::time::timeout(self.call_timeout, classifier.health_check())
            .await
            .unwrap_or(false);
        if healthy {
            debug!("Emotion classifier healthy");
        } else {
            self.disable("health check failed at session start");
        }
        healthy
    }

    pub fn is_enabled(&self) -> bool {
        self.state == GateState::Enabled
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    /// Number of classifier calls attempted, retries included
    pub fn calls(&self) -> u64 {
        self.calls
    }

    fn disable(&mut self, reason: &str) {
        if self.is_enabled() {
            info!(reason, "Emotion classification disabled for session");
        }
        self.state = GateState::Disabled {
            reason: reason.to_string(),
        };
    }

    /// Classify a face crop within the call budget.
    ///
    /// Returns `None` when the gate is disabled, the classifier answers
    /// "unknown", or the call fails. A timeout disables the gate. Any other
    /// failure triggers a health check the first time it happens in the
    /// session, then up to `max_retries` retries in the remaining budget.
    pub async fn classify(&mut self, face_crop: &[u8]) -> Option<Emotion> {
        if !self.is_enabled() {
            return None;
        }
        let classifier = self.classifier.clone()?;
        let deadline = Instant::now() + self.call_timeout;
        let mut retries = 0;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.disable("call budget exhausted");
                return None;
            }

            self.calls += 1;
            match tokio::time::timeout(remaining, classifier.classify(face_crop)).await {
                Ok(Ok(prediction)) => {
                    let label = prediction.label();
                    if label.is_none() {
                        debug!(label = %prediction.dominant_emotion, "Classifier returned no usable label");
                    }
                    return label;
                }
                Err(_) | Ok(Err(ScreeningError::EmotionTimeout(_))) => {
                    let err = ScreeningError::EmotionTimeout(self.call_timeout);
                    warn!(error = %err, "Emotion classification timed out");
                    self.disable("classification timed out");
                    return None;
                }
                Ok(Err(e)) => {
                    warn!(error = %e, retries, "Emotion classification failed");

                    if !self.failure_seen {
                        self.failure_seen = true;
                        let remaining = deadline.saturating_duration_since(Instant::now());
                        let healthy = tokio::time::timeout(remaining, classifier.health_check())
                            .await
                            .unwrap_or(false);
                        if !healthy {
                            self.disable("classifier unhealthy after failure");
                            return None;
                        }
                    }

                    if retries >= self.max_retries {
                        self.disable("retries exhausted");
                        return None;
                    }
                    retries += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::EmotionPrediction;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    enum Step {
        Label(&'static str),
        Fail,
        TimedOut,
        Hang(Duration),
    }

    struct ScriptedClassifier {
        steps: Mutex<VecDeque<Step>>,
        healthy: bool,
        calls: AtomicUsize,
    }

    impl ScriptedClassifier {
        fn new(healthy: bool, steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                healthy,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl EmotionClassifier for ScriptedClassifier {
        async fn classify(&self, _face_crop: &[u8]) -> Result<EmotionPrediction, ScreeningError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Label(label)) => Ok(EmotionPrediction {
                    dominant_emotion: label.to_string(),
                    ..Default::default()
                }),
                Some(Step::Hang(d)) => {
                    tokio::time::sleep(d).await;
                    Ok(EmotionPrediction::default())
                }
                Some(Step::TimedOut) => Err(ScreeningError::EmotionTimeout(Duration::from_secs(2))),
                Some(Step::Fail) | None => Err(ScreeningError::ServiceUnavailable("down".into())),
            }
        }

        async fn health_check(&self) -> bool {
            self.healthy
        }
    }

    fn make_test_gate(classifier: Arc<ScriptedClassifier>) -> EmotionGate {
        EmotionGate::new(
            Some(classifier as Arc<dyn EmotionClassifier>),
            &EmotionServiceConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_unconfigured_gate_is_disabled() {
        let mut gate = EmotionGate::new(None, &EmotionServiceConfig::default());
        assert!(!gate.is_enabled());
        assert!(!gate.probe().await);
        assert_eq!(gate.classify(b"crop").await, None);
    }

    #[tokio::test]
    async fn test_unhealthy_probe_disables() {
        let classifier = ScriptedClassifier::new(false, vec![Step::Label("happy")]);
        let mut gate = make_test_gate(classifier.clone());

        assert!(!gate.probe().await);
        assert_eq!(gate.classify(b"crop").await, None);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_successful_classification() {
        let classifier = ScriptedClassifier::new(true, vec![Step::Label("sad")]);
        let mut gate = make_test_gate(classifier);

        assert!(gate.probe().await);
        assert_eq!(gate.classify(b"crop").await, Some(Emotion::Sad));
        assert!(gate.is_enabled());
    }

    #[tokio::test]
    async fn test_unknown_label_is_not_a_failure() {
        let classifier =
            ScriptedClassifier::new(true, vec![Step::Label("unknown"), Step::Label("happy")]);
        let mut gate = make_test_gate(classifier);

        assert_eq!(gate.classify(b"crop").await, None);
        assert!(gate.is_enabled());
        assert_eq!(gate.classify(b"crop").await, Some(Emotion::Happy));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_disables_within_budget() {
        let classifier = ScriptedClassifier::new(
            true,
            vec![Step::Hang(Duration::from_secs(10)), Step::Label("happy")],
        );
        let mut gate = make_test_gate(classifier.clone());

        let start = Instant::now();
        assert_eq!(gate.classify(b"crop").await, None);
        assert!(start.elapsed() <= Duration::from_secs(2) + Duration::from_millis(10));
        assert!(!gate.is_enabled());

        // No further calls once disabled
        assert_eq!(gate.classify(b"crop").await, None);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transport_timeout_disables_without_retry() {
        let classifier =
            ScriptedClassifier::new(true, vec![Step::TimedOut, Step::Label("happy")]);
        let mut gate = make_test_gate(classifier.clone());

        assert_eq!(gate.classify(b"crop").await, None);
        assert!(!gate.is_enabled());
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_first_failure_checks_health() {
        let classifier = ScriptedClassifier::new(false, vec![Step::Fail, Step::Label("happy")]);
        let mut gate = make_test_gate(classifier.clone());

        assert_eq!(gate.classify(b"crop").await, None);
        assert!(!gate.is_enabled());
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_retry_recovers() {
        let classifier = ScriptedClassifier::new(true, vec![Step::Fail, Step::Label("fear")]);
        let mut gate = make_test_gate(classifier.clone());

        assert_eq!(gate.classify(b"crop").await, Some(Emotion::Fear));
        assert!(gate.is_enabled());
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retries_exhausted_disables_permanently() {
        let classifier =
            ScriptedClassifier::new(true, vec![Step::Fail, Step::Fail, Step::Label("happy")]);
        let mut gate = make_test_gate(classifier.clone());

        assert_eq!(gate.classify(b"crop").await, None);
        assert!(matches!(gate.state(), GateState::Disabled { .. }));
        assert_eq!(gate.classify(b"crop").await, None);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
    }
}
