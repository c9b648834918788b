//! Weighted combination of the engine signals into one bounded trust score.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::engines::{clamp01, round_to, RiskTier};
use crate::weights::WeightConfig;

/// Final action for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Allow,
    Warn,
    Block,
}

impl Recommendation {
    /// `< 40` BLOCK, `< 70` WARN, otherwise ALLOW.
    pub fn from_score(score: u32) -> Self {
        if score < 40 {
            Recommendation::Block
        } else if score < 70 {
            Recommendation::Warn
        } else {
            Recommendation::Allow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Allow => "ALLOW",
            Recommendation::Warn => "WARN",
            Recommendation::Block => "BLOCK",
        }
    }
}

/// Aggregator inputs. Probabilities are clamped before use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrustSignals {
    pub hallucination: f64,
    pub grounding: f64,
    pub risk_tier: RiskTier,
    pub number_conflict: bool,
    pub confidence_mismatch: bool,
    pub semantic_risk: bool,
}

impl Default for TrustSignals {
    /// A perfectly grounded, risk-free answer.
    fn default() -> Self {
        Self {
            hallucination: 0.0,
            grounding: 1.0,
            risk_tier: RiskTier::Low,
            number_conflict: false,
            confidence_mismatch: false,
            semantic_risk: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustBreakdown {
    pub hallucination_penalty: f64,
    pub grounding_penalty: f64,
    pub risk_penalty: f64,
    pub number_conflict_penalty: f64,
    pub confidence_mismatch_penalty: f64,
    pub semantic_risk_penalty: f64,
    pub total_penalty: f64,
    pub final_score: u32,
}

impl TrustBreakdown {
    /// Field name → value, for logging and flat serialization.
    pub fn as_map(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([
            ("hallucination_penalty", self.hallucination_penalty),
            ("grounding_penalty", self.grounding_penalty),
            ("risk_penalty", self.risk_penalty),
            ("number_conflict_penalty", self.number_conflict_penalty),
            ("confidence_mismatch_penalty", self.confidence_mismatch_penalty),
            ("semantic_risk_penalty", self.semantic_risk_penalty),
            ("total_penalty", self.total_penalty),
            ("final_score", self.final_score as f64),
        ])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TrustAggregator;

impl TrustAggregator {
    pub fn new() -> Self {
        Self
    }

    fn risk_penalty(tier: RiskTier, w: &WeightConfig) -> f64 {
        match tier {
            RiskTier::Critical => w.critical_risk_penalty,
            RiskTier::High => w.high_risk_penalty,
            RiskTier::Medium => w.medium_risk_penalty,
            RiskTier::Low => 0.0,
        }
    }

    pub fn compute(&self, s: &TrustSignals, w: &WeightConfig) -> TrustBreakdown {
        let hallucination = clamp01(s.hallucination);
        let grounding = clamp01(s.grounding);

        let hallucination_penalty = hallucination * w.hallucination_weight;
        let grounding_penalty = (1.0 - grounding) * w.grounding_weight;
        let risk_penalty = Self::risk_penalty(s.risk_tier, w);
        let number_conflict_penalty = if s.number_conflict { w.number_conflict_penalty } else { 0.0 };
        let confidence_mismatch_penalty = if s.confidence_mismatch {
            w.confidence_mismatch_penalty
        } else {
            0.0
        };
        let semantic_risk_penalty = if s.semantic_risk { w.semantic_risk_penalty } else { 0.0 };

        let total = hallucination_penalty
            + grounding_penalty
            + risk_penalty
            + number_conflict_penalty
            + confidence_mismatch_penalty
            + semantic_risk_penalty;

        // truncation toward zero, then bounded to [0, base]
        let raw = (w.base_score - total).trunc();
        let final_score = raw.clamp(0.0, w.base_score.max(0.0)) as u32;

        TrustBreakdown {
            hallucination_penalty: round_to(hallucination_penalty, 2),
            grounding_penalty: round_to(grounding_penalty, 2),
            risk_penalty,
            number_conflict_penalty,
            confidence_mismatch_penalty,
            semantic_risk_penalty,
            total_penalty: round_to(total, 2),
            final_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_signals_score_base() {
        let b = TrustAggregator::new().compute(&TrustSignals::default(), &WeightConfig::default());
        assert_eq!(b.final_score, 100);
        assert_eq!(b.total_penalty, 0.0);
    }

    #[test]
    fn refund_scenario_breakdown() {
        let s = TrustSignals {
            hallucination: 0.76,
            grounding: 0.53,
            risk_tier: RiskTier::Medium,
            number_conflict: true,
            confidence_mismatch: false,
            semantic_risk: true,
        };
        let b = TrustAggregator::new().compute(&s, &WeightConfig::default());
        assert_eq!(b.hallucination_penalty, 38.0);
        assert_eq!(b.grounding_penalty, 14.1);
        assert_eq!(b.risk_penalty, 8.0);
        assert_eq!(b.number_conflict_penalty, 15.0);
        assert_eq!(b.semantic_risk_penalty, 15.0);
        assert_eq!(b.total_penalty, 90.1);
        assert_eq!(b.final_score, 9);
        assert_eq!(Recommendation::from_score(b.final_score), Recommendation::Block);
    }

    #[test]
    fn score_floors_at_zero() {
        let s = TrustSignals {
            hallucination: 1.0,
            grounding: 0.0,
            risk_tier: RiskTier::Critical,
            number_conflict: true,
            confidence_mismatch: true,
            semantic_risk: true,
        };
        let b = TrustAggregator::new().compute(&s, &WeightConfig::default());
        assert_eq!(b.final_score, 0);
        assert_eq!(b.total_penalty, 147.0);
    }

    #[test]
    fn out_of_range_inputs_are_clamped() {
        let s = TrustSignals {
            hallucination: -2.0,
            grounding: 7.0,
            ..TrustSignals::default()
        };
        let b = TrustAggregator::new().compute(&s, &WeightConfig::default());
        assert_eq!(b.final_score, 100);
    }

    #[test]
    fn recommendation_thresholds() {
        assert_eq!(Recommendation::from_score(39), Recommendation::Block);
        assert_eq!(Recommendation::from_score(40), Recommendation::Warn);
        assert_eq!(Recommendation::from_score(69), Recommendation::Warn);
        assert_eq!(Recommendation::from_score(70), Recommendation::Allow);
    }

    #[test]
    fn map_has_every_term() {
        let b = TrustAggregator::new().compute(&TrustSignals::default(), &WeightConfig::default());
        let m = b.as_map();
        assert_eq!(m.len(), 8);
        assert_eq!(m["final_score"], 100.0);
    }
}
