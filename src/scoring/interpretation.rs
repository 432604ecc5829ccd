//! Clinical-style interpretation of a feature summary

use serde::{Deserialize, Serialize};

use crate::scoring::RiskLevel;
use crate::types::{FeatureStatus, FeatureSummary, Level};

/// Number of indicators the interpreter can flag
pub const MAX_CONCERNS: usize = 7;

/// Concerns observed in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalInterpretation {
    pub concerns: Vec<String>,
    pub concern_count: usize,
    /// concern_count / 7, in [0, 1]
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub summary: String,
}

pub struct ClinicalInterpreter;

impl ClinicalInterpreter {
    pub fn interpret(summary: &FeatureSummary) -> ClinicalInterpretation {
        let mut concerns = Vec::new();

        let eye = &summary.eye_contact;
        if eye.level != Level::InsufficientData {
            if eye.ratio < 0.30 {
                concerns.push(format!(
                    "Significantly reduced eye contact ({:.0}% of face frames)",
                    eye.ratio * 100.0
                ));
            } else if eye.ratio < 0.50 {
                concerns.push(format!(
                    "Below-average eye contact ({:.0}% of face frames)",
                    eye.ratio * 100.0
                ));
            }
        }

        let blink = &summary.blink;
        if blink.level != Level::InsufficientData
            && (blink.rate_per_minute < 10.0 || blink.rate_per_minute > 30.0)
        {
            concerns.push(format!(
                "Atypical blink rate ({:.1} per minute)",
                blink.rate_per_minute
            ));
        }

        if summary.head_movement.repetition_detected {
            concerns.push("Repetitive head movements".to_string());
        }

        if summary.hand_movement.present {
            concerns.push(format!(
                "Repetitive hand movements ({} severity)",
                summary.hand_movement.severity.as_str()
            ));
        }

        let gestures = &summary.gestures;
        if gestures.level != Level::InsufficientData && gestures.frequency_per_minute < 2.0 {
            concerns.push(format!(
                "Limited social gestures ({:.1} per minute)",
                gestures.frequency_per_minute
            ));
        }

        let expression = &summary.expression;
        if expression.status == FeatureStatus::Available && expression.variability < 0.25 {
            concerns.push(format!(
                "Restricted facial expressions (variability {:.2})",
                expression.variability
            ));
        }

        let concern_count = concerns.len();
        let risk_score = (concern_count as f64 / MAX_CONCERNS as f64).clamp(0.0, 1.0);
        let risk_level = RiskLevel::from_score(risk_score * 100.0);

        let summary_line = if concern_count == 0 {
            "No behavioral indicators of concern were observed".to_string()
        } else {
            format!(
                "{} of {} behavioral indicators of concern observed",
                concern_count, MAX_CONCERNS
            )
        };

        ClinicalInterpretation {
            concerns,
            concern_count,
            risk_score,
            risk_level,
            summary: summary_line,
        }
    }
}
