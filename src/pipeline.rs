//! End-to-end evaluation: engines in dependency order, gated semantic check,
//! then aggregation.
//!
//! ```text
//! numbers ─┬─> grounding ──> confidence ─┐
//!          └─> hallucination ────────────┼─> [gate] semantic ─> aggregate
//! query  ───> business risk ─────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};

use crate::aggregator::{Recommendation, TrustAggregator, TrustBreakdown, TrustSignals};
use crate::cache::{EmbeddingCache, EmbeddingStore, TenantScope};
use crate::config::{EngineConfig, SemanticGate};
use crate::engines::{
    grounding, hallucination, number_conflict, BusinessRiskClassifier, ConfidenceMismatchDetector,
    ConfidenceReport, GroundingReport, HallucinationReport, NumberConflictReport, RiskAssessment,
    RiskTier, SemanticEvaluator, SemanticReport,
};
use crate::provider::EmbeddingProvider;
use crate::telemetry::{anon_hash, hex_digest};
use crate::weights::WeightConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationInput {
    /// Retrieved passages, in retrieval order.
    #[serde(default)]
    pub context: Vec<String>,
    pub response: String,
    #[serde(default)]
    pub query: String,
    /// Calling application, only used for the request fingerprint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
}

impl EvaluationInput {
    pub fn new(context: Vec<String>, response: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            context,
            response: response.into(),
            query: query.into(),
            app_name: None,
        }
    }
}

/// SHA-256 hex over canonical (sorted-key) JSON of the request.
pub fn request_fingerprint(scope: &TenantScope, input: &EvaluationInput) -> String {
    let payload = serde_json::json!({
        "tenant_id": scope.id(),
        "app_name": input.app_name,
        "user_query": input.query,
        "retrieved_context": input.context,
        "llm_response": input.response,
    });
    hex_digest(&Sha256::digest(payload.to_string().as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustResult {
    pub score: u32,
    pub recommendation: Recommendation,
    pub breakdown: TrustBreakdown,
    pub hallucination: f64,
    pub grounding: f64,
    pub risk_tier: RiskTier,
    pub number_conflict: bool,
    pub confidence_mismatch: bool,
    pub semantic_risk: bool,
    pub similarity: Option<f64>,
    pub explanations: Vec<String>,
    pub number_report: NumberConflictReport,
    pub grounding_report: GroundingReport,
    pub hallucination_report: HallucinationReport,
    pub risk_report: RiskAssessment,
    pub confidence_report: ConfidenceReport,
    /// `None` when the gate decided the semantic check was unnecessary.
    pub semantic_report: Option<SemanticReport>,
    pub request_fingerprint: String,
    pub weights_version: u32,
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct TrustPipeline {
    classifier: BusinessRiskClassifier,
    confidence: ConfidenceMismatchDetector,
    semantic: SemanticEvaluator,
    gate: SemanticGate,
    aggregator: TrustAggregator,
}

impl TrustPipeline {
    pub fn new(semantic: SemanticEvaluator, gate: SemanticGate) -> Self {
        Self {
            classifier: BusinessRiskClassifier::default(),
            confidence: ConfidenceMismatchDetector::new(),
            semantic,
            gate,
            aggregator: TrustAggregator::new(),
        }
    }

    /// Wire a pipeline from configuration. `store` is the durable cache tier;
    /// without one only the memory tier is used.
    pub fn from_config(
        config: &EngineConfig,
        provider: Arc<dyn EmbeddingProvider>,
        store: Option<Arc<dyn EmbeddingStore>>,
    ) -> Self {
        let cache = match store {
            Some(s) => EmbeddingCache::new(config.cache.clone(), s),
            None => EmbeddingCache::memory_only(config.cache.clone()),
        };
        let semantic = SemanticEvaluator::new(config.semantic.clone(), provider, Arc::new(cache));
        Self::new(semantic, config.gate.clone())
    }

    pub fn with_classifier(mut self, classifier: BusinessRiskClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn semantic(&self) -> &SemanticEvaluator {
        &self.semantic
    }

    pub async fn evaluate(
        &self,
        scope: &TenantScope,
        input: &EvaluationInput,
        weights: &WeightConfig,
    ) -> TrustResult {
        let fingerprint = request_fingerprint(scope, input);
        let request_id = &fingerprint[..12];
        let mut explanations = Vec::new();

        let numbers = number_conflict::detect(&input.context, &input.response);
        explanations.extend(numbers.details.iter().cloned());

        let hall = hallucination::score(&input.context, &input.response, numbers.conflict);
        let ground = grounding::score(&input.context, &input.response);
        let risk = self.classifier.assess(&input.query);

        let conf = self.confidence.evaluate(&input.response, ground.grounding_score);
        if let Some(e) = &conf.explanation {
            explanations.push(e.clone());
        }

        let semantic_report = if self
            .gate
            .should_run(ground.grounding_score, hall.hallucination_score)
        {
            let r = self
                .semantic
                .evaluate(scope, &input.context, &input.response)
                .await;
            if let Some(e) = &r.explanation {
                explanations.push(e.clone());
            }
            Some(r)
        } else {
            debug!(target: "trust", request = request_id, "semantic gate closed");
            None
        };
        let semantic_risk = semantic_report.as_ref().map(|r| r.semantic_risk).unwrap_or(false);
        let similarity = semantic_report.as_ref().and_then(|r| r.similarity);

        let signals = TrustSignals {
            hallucination: hall.hallucination_score,
            grounding: ground.grounding_score,
            risk_tier: risk.risk_tier,
            number_conflict: numbers.conflict,
            confidence_mismatch: conf.mismatch,
            semantic_risk,
        };
        let breakdown = self.aggregator.compute(&signals, weights);
        let score = breakdown.final_score;
        let recommendation = Recommendation::from_score(score);

        crate::metrics::evaluation(recommendation, score);
        info!(
            target: "trust",
            request = request_id,
            tenant = scope.id().unwrap_or("-"),
            response = %anon_hash(&input.response),
            score,
            recommendation = recommendation.as_str(),
            risk = risk.risk_tier.as_str(),
            semantic = semantic_report.as_ref().map(|r| r.outcome.label()).unwrap_or("skipped"),
            weights_version = weights.version,
            "evaluation complete"
        );

        TrustResult {
            score,
            recommendation,
            breakdown,
            hallucination: hall.hallucination_score,
            grounding: ground.grounding_score,
            risk_tier: risk.risk_tier,
            number_conflict: numbers.conflict,
            confidence_mismatch: conf.mismatch,
            semantic_risk,
            similarity,
            explanations,
            number_report: numbers,
            grounding_report: ground,
            hallucination_report: hall,
            risk_report: risk,
            confidence_report: conf,
            semantic_report,
            request_fingerprint: fingerprint,
            weights_version: weights.version,
            evaluated_at: Utc::now(),
        }
    }
}
