//! Business-risk classification of the user query.
//!
//! Keyword weights are summed (each keyword at most once) and tiered:
//! `>=5` CRITICAL, `>=3` HIGH, `>=1` MEDIUM, else LOW.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 5 => RiskTier::Critical,
            s if s >= 3 => RiskTier::High,
            s if s >= 1 => RiskTier::Medium,
            _ => RiskTier::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
            RiskTier::Critical => "CRITICAL",
        }
    }
}

/// Financial, legal, medical and refund/policy vocabulary.
pub const DEFAULT_RISK_KEYWORDS: &[(&str, u32)] = &[
    // Financial
    ("investment", 2),
    ("stock", 2),
    ("crypto", 2),
    ("guarantee", 3),
    ("loan", 2),
    // Legal
    ("legal", 3),
    ("lawsuit", 3),
    ("contract", 2),
    ("compliance", 2),
    // Medical
    ("medical", 3),
    ("diagnose", 4),
    ("prescribe", 4),
    ("treatment", 2),
    // Refund / policy
    ("refund", 2),
    ("return", 1),
    ("policy", 1),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_tier: RiskTier,
    pub risk_score: u32,
    /// Matched keywords, in table order.
    pub triggered_keywords: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BusinessRiskClassifier {
    keywords: Vec<(String, u32)>,
}

impl Default for BusinessRiskClassifier {
    fn default() -> Self {
        Self::with_keywords(
            DEFAULT_RISK_KEYWORDS
                .iter()
                .map(|(k, w)| (k.to_string(), *w)),
        )
    }
}

impl BusinessRiskClassifier {
    /// Custom keyword table; keywords are lowercased, blanks and duplicates dropped
    /// (first occurrence wins).
    pub fn with_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: AsRef<str>,
    {
        let mut table: Vec<(String, u32)> = Vec::new();
        for (k, w) in keywords {
            let k = k.as_ref().trim().to_lowercase();
            if k.is_empty() || table.iter().any(|(seen, _)| *seen == k) {
                continue;
            }
            table.push((k, w));
        }
        Self { keywords: table }
    }

    pub fn keywords(&self) -> &[(String, u32)] {
        &self.keywords
    }

    pub fn assess(&self, query: &str) -> RiskAssessment {
        let q = query.to_lowercase();
        let mut risk_score = 0u32;
        let mut triggered_keywords = Vec::new();

        for (kw, weight) in &self.keywords {
            if q.contains(kw.as_str()) {
                risk_score = risk_score.saturating_add(*weight);
                triggered_keywords.push(kw.clone());
            }
        }

        RiskAssessment {
            risk_tier: RiskTier::from_score(risk_score),
            risk_score,
            triggered_keywords,
        }
    }
}
