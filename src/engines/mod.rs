// src/engines/mod.rs
//! Scoring engines. The lexical ones are pure functions of their input; the
//! semantic one awaits an embedding provider and fails open. None of them
//! return errors: each yields a small report with a primary score/flag.

pub mod business_risk;
pub mod confidence_mismatch;
pub mod grounding;
pub mod hallucination;
pub mod number_conflict;
pub mod semantic;

use serde::{Deserialize, Serialize};

pub use business_risk::{BusinessRiskClassifier, RiskAssessment, RiskTier};
pub use confidence_mismatch::{ConfidenceMismatchDetector, ConfidenceReport};
pub use grounding::GroundingReport;
pub use hallucination::HallucinationReport;
pub use number_conflict::{ConflictType, NumberConflictReport};
pub use semantic::{SemanticEvaluator, SemanticOutcome, SemanticReport, SemanticSettings};

/// Severity label shared by the flag-style engines.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "NONE",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }
}

/// Clamp into [0,1]; NaN maps to 0.
#[inline]
pub(crate) fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// Half-away-from-zero rounding to `dp` decimals.
#[inline]
pub(crate) fn round_to(x: f64, dp: i32) -> f64 {
    let f = 10f64.powi(dp);
    (x * f).round() / f
}
