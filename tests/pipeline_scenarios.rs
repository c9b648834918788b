// tests/pipeline_scenarios.rs
// End-to-end scenarios through TrustPipeline with deterministic providers.

mod common;

use std::sync::Arc;

use atlas_trust::engines::number_conflict::ConflictType;
use atlas_trust::tokenizer::NumberLiteral;
use atlas_trust::{
    EngineConfig, EvaluationInput, Recommendation, RiskTier, SemanticOutcome, Severity,
    TenantScope, TrustPipeline, WeightConfig,
};
use common::{refund_input, AxisProvider};

fn pipeline() -> (TrustPipeline, Arc<AxisProvider>) {
    let provider = Arc::new(AxisProvider::default());
    let p = TrustPipeline::from_config(&EngineConfig::default(), provider.clone(), None);
    (p, provider)
}

#[tokio::test]
async fn refund_after_90_days_is_blocked() {
    let (p, _) = pipeline();
    let r = p
        .evaluate(&TenantScope::tenant("acme"), &refund_input(), &WeightConfig::default())
        .await;

    // numeric conflict: single-pair rule overrides the new-number rule
    assert!(r.number_conflict);
    assert_eq!(r.number_report.context_numbers, vec![NumberLiteral::from(30)]);
    assert_eq!(r.number_report.response_numbers, vec![NumberLiteral::from(120)]);
    assert_eq!(r.number_report.conflict_type, Some(ConflictType::RangeExpansion));
    assert_eq!(r.number_report.severity, Severity::High);
    assert_eq!(r.number_report.details.len(), 2);

    assert_eq!(r.grounding, 0.53);
    assert_eq!(r.hallucination, 0.76);
    assert_eq!(r.risk_tier, RiskTier::Medium);
    assert!(!r.confidence_mismatch);

    // grounding below the gate: semantic ran and found orthogonal vectors
    let sem = r.semantic_report.as_ref().expect("semantic evaluated");
    assert_eq!(
        sem.outcome,
        SemanticOutcome::Scored {
            similarity: 0.0,
            severity: Severity::High
        }
    );
    assert!(r.semantic_risk);
    assert_eq!(r.similarity, Some(0.0));

    assert_eq!(r.breakdown.hallucination_penalty, 38.0);
    assert_eq!(r.breakdown.grounding_penalty, 14.1);
    assert_eq!(r.breakdown.risk_penalty, 8.0);
    assert_eq!(r.breakdown.number_conflict_penalty, 15.0);
    assert_eq!(r.breakdown.confidence_mismatch_penalty, 0.0);
    assert_eq!(r.breakdown.semantic_risk_penalty, 15.0);
    assert_eq!(r.score, 9);
    assert_eq!(r.recommendation, Recommendation::Block);
    assert_eq!(r.weights_version, 0);

    // numeric details first, then the semantic explanation
    assert!(r.explanations[0].starts_with("Response introduces new numbers"));
    assert!(r.explanations[1].contains("exceeds context value 30"));
    assert!(r.explanations[2].starts_with("Low semantic similarity"));
}

#[tokio::test]
async fn empty_context_is_treated_as_unsupported() {
    let (p, provider) = pipeline();
    let input = EvaluationInput::new(vec![], "The answer is 42.", "hello there");
    let r = p
        .evaluate(&TenantScope::Global, &input, &WeightConfig::default())
        .await;

    assert_eq!(r.hallucination, 0.7);
    assert_eq!(r.hallucination_report.divergence_score, 0.7);
    assert_eq!(r.hallucination_report.unsupported_ratio, 0.0);
    assert_eq!(r.hallucination_report.context_absence_penalty, 0.7);
    assert_eq!(r.grounding, 0.0);
    assert!(!r.number_conflict);

    let sem = r.semantic_report.as_ref().unwrap();
    assert_eq!(sem.outcome, SemanticOutcome::NoContext);
    assert_eq!(sem.severity, "HIGH");
    assert_eq!(r.similarity, Some(0.0));
    assert!(r.semantic_risk);
    // no embeddings needed without context
    assert_eq!(provider.calls(), 0);

    // 35 + 30 + 15
    assert_eq!(r.breakdown.total_penalty, 80.0);
    assert_eq!(r.score, 20);
    assert_eq!(r.recommendation, Recommendation::Block);
}

#[tokio::test]
async fn fully_grounded_answer_scores_base() {
    let (p, provider) = pipeline();
    let text = "refunds allowed within thirty days";
    let input = EvaluationInput::new(vec![text.to_string()], text, "what colour is the sky?");
    let r = p
        .evaluate(&TenantScope::Global, &input, &WeightConfig::default())
        .await;

    assert_eq!(r.grounding, 1.0);
    assert_eq!(r.hallucination, 0.0);
    assert_eq!(r.risk_tier, RiskTier::Low);
    assert!(r.semantic_report.is_none(), "gate should stay closed");
    assert_eq!(provider.calls(), 0);
    assert_eq!(r.breakdown.total_penalty, 0.0);
    assert_eq!(r.score, 100);
    assert_eq!(r.recommendation, Recommendation::Allow);
    assert!(r.explanations.is_empty());
}

#[tokio::test]
async fn repeated_evaluation_is_idempotent() {
    let (p, provider) = pipeline();
    let scope = TenantScope::tenant("acme");
    let w = WeightConfig::default();
    let a = p.evaluate(&scope, &refund_input(), &w).await;
    let calls_after_first = provider.calls();
    let b = p.evaluate(&scope, &refund_input(), &w).await;

    assert_eq!(a.breakdown, b.breakdown);
    assert_eq!(a.score, b.score);
    assert_eq!(a.explanations, b.explanations);
    assert_eq!(a.request_fingerprint, b.request_fingerprint);
    // second run served from the memory tier
    assert_eq!(calls_after_first, 2);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn confident_tone_on_weak_grounding_is_penalized() {
    let (p, _) = pipeline();
    let input = EvaluationInput::new(
        vec!["Shipping takes five business days.".to_string()],
        "Absolutely, delivery is definitely guaranteed tomorrow.",
        "when will my parcel arrive?",
    );
    let r = p
        .evaluate(&TenantScope::Global, &input, &WeightConfig::default())
        .await;
    assert!(r.confidence_mismatch);
    assert_eq!(r.confidence_report.severity, Severity::High);
    assert_eq!(r.breakdown.confidence_mismatch_penalty, 12.0);
    assert!(r
        .explanations
        .iter()
        .any(|e| e.starts_with("Strong confidence tone detected")));
}

#[tokio::test]
async fn tenant_weights_change_the_score() {
    let (p, _) = pipeline();
    let lenient = WeightConfig {
        hallucination_weight: 0.0,
        grounding_weight: 0.0,
        number_conflict_penalty: 0.0,
        semantic_risk_penalty: 0.0,
        version: 3,
        ..WeightConfig::default()
    };
    let r = p
        .evaluate(&TenantScope::tenant("acme"), &refund_input(), &lenient)
        .await;
    // only the MEDIUM risk penalty remains
    assert_eq!(r.score, 92);
    assert_eq!(r.recommendation, Recommendation::Allow);
    assert_eq!(r.weights_version, 3);
}

#[tokio::test]
async fn result_serializes_with_uppercase_labels() {
    let (p, _) = pipeline();
    let r = p
        .evaluate(&TenantScope::Global, &refund_input(), &WeightConfig::default())
        .await;
    let v = serde_json::to_value(&r).unwrap();
    assert_eq!(v["recommendation"], "BLOCK");
    assert_eq!(v["risk_tier"], "MEDIUM");
    assert_eq!(v["number_report"]["conflict_type"], "range_expansion");
    assert_eq!(v["semantic_report"]["outcome"]["kind"], "scored");
}
