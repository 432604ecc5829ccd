//! Screening pipeline
//!
//! Ties the session manager to scoring and report encoding:
//! frames → session aggregates → video score + interpretation → fusion with
//! the questionnaire → report.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::encoder::{ReportEncoder, ScreeningReport};
use crate::error::ScreeningError;
use crate::scoring::{fuse_scores, ClinicalInterpreter, VideoScorer};
use crate::session::{FrameSampler, SampleDecision, SessionManager};
use crate::types::{Frame, FrameStatus};

/// Questionnaire result supplied by the screening record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuestionnaireInput {
    /// Risk probability in [0, 1]
    pub probability: f64,
    /// Model confidence in [0, 1], passed through to the combined score
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Frame counts from a batch ingestion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub frames_read: u64,
    pub frames_sampled: u64,
    pub frames_processed: u64,
}

/// Stateful screening processor
pub struct ScreeningProcessor {
    manager: SessionManager,
    encoder: ReportEncoder,
    /// First report built per session, returned by repeated `finish` calls
    reports: Mutex<HashMap<String, ScreeningReport>>,
}

impl ScreeningProcessor {
    /// Create a processor from configuration
    pub fn new(config: EngineConfig) -> Result<Self, ScreeningError> {
        Ok(Self::with_manager(SessionManager::new(config)?))
    }

    pub fn with_manager(manager: SessionManager) -> Self {
        Self {
            manager,
            encoder: ReportEncoder::new(),
            reports: Mutex::new(HashMap::new()),
        }
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    /// Feed recorded frames through the sampler into a session.
    ///
    /// Reordered frames and frames with non-finite timestamps bypass the
    /// sampler so the session records them in its data quality.
    pub async fn ingest_batch<I>(
        &self,
        session_id: &str,
        frames: I,
        sampler: &mut FrameSampler,
    ) -> Result<BatchStats, ScreeningError>
    where
        I: IntoIterator<Item = Frame>,
    {
        let mut stats = BatchStats::default();
        for frame in frames {
            stats.frames_read += 1;
            match sampler.decide(frame.timestamp) {
                SampleDecision::Skip => continue,
                SampleDecision::Keep => stats.frames_sampled += 1,
                decision => {
                    debug!(session_id, timestamp = frame.timestamp, ?decision, "Frame bypasses sampler");
                }
            }
            let outcome = self.manager.process_frame(session_id, frame).await?;
            if outcome.status == FrameStatus::Processed {
                stats.frames_processed += 1;
            }
        }
        Ok(stats)
    }

    /// End the session and build its report.
    ///
    /// The combined score is omitted when there is neither a questionnaire
    /// nor a video score. The report is built once per session; later calls
    /// return it unchanged, whatever their arguments.
    pub async fn finish(
        &self,
        session_id: &str,
        duration_seconds: f64,
        questionnaire: Option<QuestionnaireInput>,
    ) -> Result<ScreeningReport, ScreeningError> {
        if let Some(report) = self.reports.lock().await.get(session_id) {
            return Ok(report.clone());
        }

        let summary = self.manager.end_session(session_id, duration_seconds).await?;
        let interpretation = ClinicalInterpreter::interpret(&summary);
        let video_score = VideoScorer::score(&summary);

        let questionnaire_probability = questionnaire.map(|q| q.probability);
        let combined_score = match (questionnaire_probability, &video_score) {
            (None, None) => None,
            (q, video) => Some(fuse_scores(
                q,
                video.as_ref().map(|v| v.score),
                questionnaire.and_then(|q| q.confidence),
            )?),
        };

        info!(
            session_id,
            video_score = video_score.as_ref().map(|v| v.score),
            final_score = combined_score.as_ref().map(|c| c.final_score),
            concerns = interpretation.concern_count,
            "Screening report built"
        );

        let report = self
            .encoder
            .encode(summary, interpretation, video_score, combined_score);

        // A concurrent call may have finished first; keep its report
        let mut reports = self.reports.lock().await;
        Ok(reports
            .entry(session_id.to_string())
            .or_insert(report)
            .clone())
    }

    /// Drop a session and its cached report. Returns whether the session existed.
    pub async fn evict(&self, session_id: &str) -> bool {
        self.reports.lock().await.remove(session_id);
        self.manager.evict(session_id).await
    }
}
