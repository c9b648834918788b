//! Tone vs. evidence: flags responses that sound certain while grounding is weak.

use serde::{Deserialize, Serialize};

use super::{clamp01, round_to, Severity};

pub const HIGH_CONFIDENCE_PHRASES: &[&str] = &[
    "absolutely",
    "definitely",
    "guaranteed",
    "100%",
    "certainly",
    "without a doubt",
    "no doubt",
    "always",
    "never",
    "completely",
    "fully assured",
];

pub const MEDIUM_CONFIDENCE_PHRASES: &[&str] = &[
    "clearly",
    "obviously",
    "undoubtedly",
    "surely",
    "confident",
    "will happen",
    "must be",
];

pub const HEDGING_PHRASES: &[&str] = &[
    "may",
    "might",
    "could",
    "possibly",
    "likely",
    "suggests",
    "approximately",
    "around",
    "estimated",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceReport {
    pub confidence_score: f64,
    pub mismatch: bool,
    pub severity: Severity,
    pub high_count: usize,
    pub medium_count: usize,
    pub hedge_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceMismatchDetector;

impl ConfidenceMismatchDetector {
    pub fn new() -> Self {
        Self
    }

    /// Number of phrases from `phrases` that occur as substrings of `text`.
    #[inline]
    fn count_matches(phrases: &[&str], text: &str) -> usize {
        phrases.iter().filter(|p| text.contains(*p)).count()
    }

    pub fn evaluate(&self, response: &str, grounding_score: f64) -> ConfidenceReport {
        let text = response.to_lowercase();
        let grounding = clamp01(grounding_score);

        let high_count = Self::count_matches(HIGH_CONFIDENCE_PHRASES, &text);
        let medium_count = Self::count_matches(MEDIUM_CONFIDENCE_PHRASES, &text);
        let hedge_count = Self::count_matches(HEDGING_PHRASES, &text);

        let confidence = clamp01(
            0.4 * high_count as f64 + 0.2 * medium_count as f64 - 0.2 * hedge_count as f64,
        );
        let shown = round_to(confidence, 2);

        let (mismatch, severity, explanation) = if grounding < 0.5 && confidence > 0.5 {
            (
                true,
                Severity::High,
                Some(format!(
                    "Strong confidence tone detected (score={shown}) despite weak grounding (score={grounding})."
                )),
            )
        } else if grounding < 0.6 && confidence > 0.3 {
            (
                true,
                Severity::Medium,
                Some("Moderate confidence tone with limited grounding.".to_string()),
            )
        } else {
            (false, Severity::None, None)
        };

        ConfidenceReport {
            confidence_score: shown,
            mismatch,
            severity,
            high_count,
            medium_count,
            hedge_count,
            explanation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certain_tone_on_weak_grounding_is_high() {
        let r = ConfidenceMismatchDetector::new()
            .evaluate("Absolutely, this is definitely guaranteed.", 0.2);
        assert_eq!(r.high_count, 3);
        assert_eq!(r.confidence_score, 1.0);
        assert!(r.mismatch);
        assert_eq!(r.severity, Severity::High);
        assert!(r.explanation.unwrap().contains("weak grounding"));
    }

    #[test]
    fn moderate_tone_on_limited_grounding_is_medium() {
        // one high phrase -> 0.4: not > 0.5, but > 0.3
        let r = ConfidenceMismatchDetector::new().evaluate("It is certainly fine.", 0.55);
        assert_eq!(r.confidence_score, 0.4);
        assert!(r.mismatch);
        assert_eq!(r.severity, Severity::Medium);
    }

    #[test]
    fn first_rule_wins_over_second() {
        let r = ConfidenceMismatchDetector::new().evaluate("Definitely and absolutely.", 0.45);
        assert_eq!(r.severity, Severity::High);
    }

    #[test]
    fn hedging_cancels_confidence() {
        let r = ConfidenceMismatchDetector::new()
            .evaluate("It could possibly be, and certainly might.", 0.1);
        // high 1 (0.4) - hedges 3 (could, possibly, might) -> clamped 0
        assert_eq!(r.confidence_score, 0.0);
        assert!(!r.mismatch);
    }

    #[test]
    fn well_grounded_confident_answer_passes() {
        let r = ConfidenceMismatchDetector::new().evaluate("Absolutely, definitely yes.", 0.9);
        assert!(!r.mismatch);
        assert_eq!(r.severity, Severity::None);
        assert!(r.explanation.is_none());
    }

    #[test]
    fn phrases_match_inside_words() {
        // substring matching: "mayor" contains "may"
        let r = ConfidenceMismatchDetector::new().evaluate("The mayor said so.", 0.0);
        assert_eq!(r.hedge_count, 1);
    }
}
