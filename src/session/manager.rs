//! Session registry and lifecycle
//!
//! Sessions are keyed by id. The registry lock is held only for lookup and
//! insertion; each session has its own mutex, so frames for one session are
//! processed strictly in order while different sessions run concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::config::{EmotionBackend, EngineConfig};
use crate::emotion::{EmotionClassifier, EmotionGate, RemoteEmotionClient};
use crate::error::ScreeningError;
use crate::landmarks::LandmarkExtractor;
use crate::session::aggregator::SummaryBuilder;
use crate::session::state::{SessionPhase, SessionState};
use crate::types::{FeatureSummary, Frame, FrameOutcome, SessionAck};

type SessionHandle = Arc<Mutex<SessionState>>;

/// Owns every live session
pub struct SessionManager {
    config: Arc<EngineConfig>,
    extractor: LandmarkExtractor,
    classifier: Option<Arc<dyn EmotionClassifier>>,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    /// Create a manager from configuration.
    ///
    /// Uses the remote emotion client when the backend is `remote` and only
    /// accepts frames with precomputed landmarks.
    pub fn new(config: EngineConfig) -> Result<Self, ScreeningError> {
        config.validate()?;
        let classifier: Option<Arc<dyn EmotionClassifier>> = match config.emotion.backend {
            EmotionBackend::Remote => Some(Arc::new(RemoteEmotionClient::new(&config.emotion)?)),
            EmotionBackend::Disabled => None,
        };
        Ok(Self::with_components(
            config,
            LandmarkExtractor::precomputed_only(),
            classifier,
        ))
    }

    /// Create a manager with explicit landmark and emotion components
    pub fn with_components(
        config: EngineConfig,
        extractor: LandmarkExtractor,
        classifier: Option<Arc<dyn EmotionClassifier>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            extractor,
            classifier,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn handle(&self, session_id: &str) -> Result<SessionHandle, ScreeningError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| ScreeningError::InvalidSession(format!("unknown session '{session_id}'")))
    }

    /// Start a session. A duplicate id is rejected.
    pub async fn start_session(&self, session_id: &str) -> Result<SessionAck, ScreeningError> {
        if session_id.is_empty() {
            return Err(ScreeningError::InvalidSession(
                "session id must not be empty".to_string(),
            ));
        }
        if self.sessions.read().await.contains_key(session_id) {
            return Err(ScreeningError::InvalidSession(format!(
                "session '{session_id}' already exists"
            )));
        }

        // Probe outside the registry lock; the health check may take a while
        let mut gate = EmotionGate::new(self.classifier.clone(), &self.config.emotion);
        gate.probe().await;
        let emotion_available = gate.is_enabled();
        if self.classifier.is_some() && !emotion_available {
            warn!(session_id, "Emotion service unavailable; expression variability disabled");
        }

        let state = SessionState::new(session_id, &self.config, gate);
        let started_at_utc = state.started_at;

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(session_id) {
            return Err(ScreeningError::InvalidSession(format!(
                "session '{session_id}' already exists"
            )));
        }
        sessions.insert(session_id.to_string(), Arc::new(Mutex::new(state)));
        drop(sessions);

        info!(session_id, emotion_available, "Session started");
        Ok(SessionAck {
            session_id: session_id.to_string(),
            started_at_utc,
            emotion_available,
        })
    }

    /// Process one frame. Only session-identity problems are returned as errors.
    pub async fn process_frame(
        &self,
        session_id: &str,
        frame: Frame,
    ) -> Result<FrameOutcome, ScreeningError> {
        let handle = self.handle(session_id).await?;
        let mut state = handle.lock().await;
        if state.phase != SessionPhase::Active {
            return Err(ScreeningError::InvalidSession(format!(
                "session '{session_id}' has ended"
            )));
        }
        Ok(state.ingest(frame, &self.extractor, &self.config).await)
    }

    /// End a session and return its feature summary.
    ///
    /// The summary is computed once; later calls return the cached value.
    pub async fn end_session(
        &self,
        session_id: &str,
        duration_seconds: f64,
    ) -> Result<FeatureSummary, ScreeningError> {
        let handle = self.handle(session_id).await?;
        let mut state = handle.lock().await;

        if let Some(summary) = &state.summary {
            return Ok(summary.clone());
        }

        state.phase = SessionPhase::Ending;
        let summary = SummaryBuilder::build(&state, duration_seconds, &self.config);
        state.summary = Some(summary.clone());
        state.phase = SessionPhase::Ended;

        info!(
            session_id,
            duration = summary.duration_seconds,
            frames = summary.data_quality.frames_received,
            processed = summary.data_quality.frames_processed,
            "Session ended"
        );
        Ok(summary)
    }

    /// Phase of a session, if it exists
    pub async fn phase(&self, session_id: &str) -> Option<SessionPhase> {
        let handle = self.handle(session_id).await.ok()?;
        let state = handle.lock().await;
        Some(state.phase)
    }

    /// Remove a session from the registry. Returns whether it existed.
    pub async fn evict(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            info!(session_id, "Session evicted");
        }
        removed
    }

    /// Number of sessions in the registry, ended ones included
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::EmotionPrediction;
    use crate::landmarks::{Handedness, LandmarkSet};
    use crate::test_support::{make_test_face, make_test_hand, TestHandShape};
    use crate::types::{FeatureStatus, FrameStatus, QualityFlag};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    const FPS: f64 = 10.0;

    struct FixedClassifier {
        label: &'static str,
        healthy: bool,
    }

    #[async_trait]
    impl EmotionClassifier for FixedClassifier {
        async fn classify(&self, _face_crop: &[u8]) -> Result<EmotionPrediction, ScreeningError> {
            if self.healthy {
                Ok(EmotionPrediction {
                    dominant_emotion: self.label.to_string(),
                    ..Default::default()
                })
            } else {
                Err(ScreeningError::ServiceUnavailable("connection refused".into()))
            }
        }

        async fn health_check(&self) -> bool {
            self.healthy
        }
    }

    fn make_test_manager(classifier: Option<Arc<dyn EmotionClassifier>>) -> SessionManager {
        SessionManager::with_components(
            EngineConfig::default(),
            LandmarkExtractor::precomputed_only(),
            classifier,
        )
    }

    /// Frame i of a scripted session: blinks every 20 frames, looks away
    /// every 4th frame, and holds a pointing hand.
    fn make_test_frame(i: usize) -> Frame {
        let ear = if i % 20 == 10 { 0.05 } else { 0.30 };
        let offset = if i % 4 == 0 { 0.3 } else { 0.0 };
        let landmarks = LandmarkSet {
            face: Some(make_test_face(ear, offset, (0.5, 0.5 + 0.001 * (i % 3) as f64))),
            hands: vec![make_test_hand(
                Handedness::Right,
                (0.7, 0.7),
                TestHandShape::Pointing,
            )],
            ..Default::default()
        };
        Frame::with_landmarks(i as f64 / FPS, landmarks).with_face_crop(vec![0xff, 0xd8])
    }

    async fn run_session(manager: &SessionManager, id: &str, frames: usize) -> FeatureSummary {
        manager.start_session(id).await.unwrap();
        for i in 0..frames {
            manager.process_frame(id, make_test_frame(i)).await.unwrap();
        }
        manager.end_session(id, frames as f64 / FPS).await.unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_start_rejected() {
        let manager = make_test_manager(None);
        manager.start_session("a").await.unwrap();
        let err = manager.start_session("a").await.unwrap_err();
        assert!(matches!(err, ScreeningError::InvalidSession(_)));
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let manager = make_test_manager(None);
        assert!(matches!(
            manager.process_frame("nope", Frame::empty(0.0)).await,
            Err(ScreeningError::InvalidSession(_))
        ));
        assert!(matches!(
            manager.end_session("nope", 10.0).await,
            Err(ScreeningError::InvalidSession(_))
        ));
    }

    #[tokio::test]
    async fn test_frame_statuses() {
        let manager = make_test_manager(None);
        manager.start_session("s").await.unwrap();

        let ok = manager.process_frame("s", make_test_frame(0)).await.unwrap();
        assert_eq!(ok.status, FrameStatus::Processed);
        assert!(ok.indicators.is_some());

        let no_face = manager.process_frame("s", Frame::empty(0.1)).await.unwrap();
        assert_eq!(no_face.status, FrameStatus::NoFace);

        let malformed = manager
            .process_frame("s", Frame::encoded(0.2, vec![1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(malformed.status, FrameStatus::Malformed);

        let late = manager.process_frame("s", make_test_frame(1)).await.unwrap();
        assert_eq!(late.status, FrameStatus::OutOfOrder);
        assert_eq!(late.frame_index, 3);

        let summary = manager.end_session("s", 1.0).await.unwrap();
        assert_eq!(summary.data_quality.frames_received, 4);
        assert_eq!(summary.data_quality.frames_processed, 1);
        assert_eq!(summary.data_quality.frames_without_face, 1);
        assert_eq!(summary.data_quality.frames_malformed, 1);
        assert_eq!(summary.data_quality.frames_out_of_order, 1);
    }

    #[tokio::test]
    async fn test_end_session_is_idempotent() {
        let manager = make_test_manager(None);
        let first = run_session(&manager, "s", 120).await;
        let second = manager.end_session("s", 999.0).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(manager.phase("s").await, Some(SessionPhase::Ended));
    }

    #[tokio::test]
    async fn test_frames_after_end_rejected() {
        let manager = make_test_manager(None);
        run_session(&manager, "s", 10).await;
        assert!(matches!(
            manager.process_frame("s", make_test_frame(50)).await,
            Err(ScreeningError::InvalidSession(_))
        ));
    }

    #[tokio::test]
    async fn test_session_aggregates() {
        let manager = make_test_manager(None);
        let summary = run_session(&manager, "s", 200).await;

        // 50 averted frames plus 10 closed-eye frames
        assert_eq!(summary.eye_contact.frames_with_face, 200);
        assert_eq!(summary.eye_contact.frames_with_contact, 140);
        assert!((summary.eye_contact.ratio - 0.70).abs() < 1e-9);
        // One blink every 20 frames over 20 seconds
        assert_eq!(summary.blink.blink_count, 10);
        assert!((summary.blink.rate_per_minute - 30.0).abs() < 1e-9);
        assert!(summary.gestures.pointing > 0);
        assert!(summary.gestures.frequency_per_minute >= 0.0);
        assert!(!summary.head_movement.repetition_detected);
    }

    #[tokio::test]
    async fn test_faces_without_iris_excluded_from_eye_contact() {
        let manager = make_test_manager(None);
        manager.start_session("s").await.unwrap();
        for i in 0..40 {
            let mut face = make_test_face(0.30, 0.0, (0.5, 0.5));
            if i % 2 == 1 {
                face.points.truncate(468);
            }
            let landmarks = LandmarkSet {
                face: Some(face),
                ..Default::default()
            };
            let outcome = manager
                .process_frame("s", Frame::with_landmarks(i as f64 / FPS, landmarks))
                .await
                .unwrap();
            assert_eq!(outcome.status, FrameStatus::Processed);
        }
        let summary = manager.end_session("s", 4.0).await.unwrap();

        assert_eq!(summary.eye_contact.frames_with_face, 20);
        assert_eq!(summary.eye_contact.ratio, 1.0);
        assert_eq!(summary.data_quality.frames_processed, 40);
        assert_eq!(summary.data_quality.frames_without_gaze, 20);
        assert!(summary
            .data_quality
            .flags
            .contains(&QualityFlag::GazeUnmeasured));
    }

    #[tokio::test]
    async fn test_emotion_outage_only_affects_expression() {
        let working = make_test_manager(Some(Arc::new(FixedClassifier {
            label: "happy",
            healthy: true,
        })));
        let broken = make_test_manager(Some(Arc::new(FixedClassifier {
            label: "happy",
            healthy: false,
        })));

        let with_service = run_session(&working, "s", 200).await;
        let without_service = run_session(&broken, "s", 200).await;

        assert_eq!(with_service.expression.status, FeatureStatus::Available);
        assert_eq!(without_service.expression.status, FeatureStatus::Unavailable);
        assert_eq!(without_service.expression.variability, 0.0);

        assert_eq!(with_service.eye_contact, without_service.eye_contact);
        assert_eq!(with_service.blink, without_service.blink);
        assert_eq!(with_service.head_movement, without_service.head_movement);
        assert_eq!(with_service.hand_movement, without_service.hand_movement);
        assert_eq!(with_service.gestures, without_service.gestures);
    }

    #[tokio::test]
    async fn test_evict() {
        let manager = make_test_manager(None);
        manager.start_session("s").await.unwrap();
        assert_eq!(manager.session_count().await, 1);
        assert!(manager.evict("s").await);
        assert!(!manager.evict("s").await);
        assert_eq!(manager.session_count().await, 0);
        // Id can be reused after eviction
        manager.start_session("s").await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_sessions() {
        let manager = Arc::new(make_test_manager(None));
        let mut tasks = Vec::new();
        for n in 0..4 {
            let manager = manager.clone();
            tasks.push(tokio::spawn(async move {
                let id = format!("s{n}");
                run_session(&manager, &id, 60).await
            }));
        }
        for task in tasks {
            let summary = task.await.unwrap();
            assert_eq!(summary.data_quality.frames_processed, 60);
        }
    }
}
