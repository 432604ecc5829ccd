//! Screening report encoding
//!
//! Wraps a session's summary, interpretation and scores in a versioned JSON
//! envelope with producer metadata, ready to hand to the screening record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ScreeningError;
use crate::scoring::{ClinicalInterpretation, CombinedScore, VideoScore};
use crate::types::FeatureSummary;
use crate::{ENGINE_VERSION, PRODUCER_NAME};

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Who produced the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Session-level screening report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningReport {
    pub report_version: String,
    pub report_id: String,
    pub producer: ReportProducer,
    pub session_id: String,
    pub computed_at_utc: DateTime<Utc>,
    pub summary: FeatureSummary,
    pub interpretation: ClinicalInterpretation,
    /// Absent when no frame with a face was processed
    pub video_score: Option<VideoScore>,
    /// Absent when neither a video score nor a questionnaire score exists
    pub combined_score: Option<CombinedScore>,
}

/// Report encoder
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn encode(
        &self,
        summary: FeatureSummary,
        interpretation: ClinicalInterpretation,
        video_score: Option<VideoScore>,
        combined_score: Option<CombinedScore>,
    ) -> ScreeningReport {
        ScreeningReport {
            report_version: REPORT_VERSION.to_string(),
            report_id: Uuid::new_v4().to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: ENGINE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            session_id: summary.session_id.clone(),
            computed_at_utc: Utc::now(),
            summary,
            interpretation,
            video_score,
            combined_score,
        }
    }
}

/// Encode a report to pretty JSON
pub fn encode_to_json(report: &ScreeningReport) -> Result<String, ScreeningError> {
    Ok(serde_json::to_string_pretty(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::video::tests::make_test_summary;
    use crate::scoring::{fuse_scores, ClinicalInterpreter, VideoScorer};

    #[test]
    fn test_encode_report() {
        let encoder = ReportEncoder::with_instance_id("test-instance".to_string());
        let summary = make_test_summary();
        let interpretation = ClinicalInterpreter::interpret(&summary);
        let video = VideoScorer::score(&summary);
        let combined = fuse_scores(Some(0.4), video.as_ref().map(|v| v.score), None).ok();

        let report = encoder.encode(summary, interpretation, video, combined);

        assert_eq!(report.report_version, REPORT_VERSION);
        assert_eq!(report.producer.name, PRODUCER_NAME);
        assert_eq!(report.producer.instance_id, "test-instance");
        assert_eq!(report.session_id, "s");
        assert!(report.combined_score.is_some());
    }

    #[test]
    fn test_encode_to_json() {
        let encoder = ReportEncoder::new();
        let summary = make_test_summary();
        let interpretation = ClinicalInterpreter::interpret(&summary);
        let report = encoder.encode(summary, interpretation, None, None);

        let json = encode_to_json(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["producer"]["name"], "earlysight");
        assert_eq!(value["summary"]["eye_contact"]["level"], "normal");
        assert_eq!(value["summary"]["expression"]["status"], "available");
        assert!(value["video_score"].is_null());

        let parsed: ScreeningReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.report_id, report.report_id);
        assert_eq!(parsed.summary.data_quality, report.summary.data_quality);
    }
}
