//! Embedding-based contradiction check between the joined context and the response.
//!
//! Fail-open: a disabled layer, a deadline overrun or any provider/vector
//! problem produces a neutral outcome instead of an error. Only
//! `NoContext` and low/moderate similarity raise the semantic-risk flag.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{round_to, Severity};
use crate::cache::{EmbeddingCache, TenantScope};
use crate::error::{ConfigError, ConfigResult};
use crate::provider::EmbeddingProvider;
use crate::telemetry::anon_hash;
use crate::tokenizer::join_context;

fn default_enabled() -> bool {
    true
}
fn default_high() -> f64 {
    0.60
}
fn default_medium() -> f64 {
    0.75
}
fn default_timeout_secs() -> u64 {
    8
}
fn default_model() -> String {
    "models/embedding-001".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Similarity below this is HIGH risk.
    #[serde(default = "default_high")]
    pub high_risk_threshold: f64,
    /// Similarity below this (and not below `high_risk_threshold`) is MEDIUM risk.
    #[serde(default = "default_medium")]
    pub medium_risk_threshold: f64,
    /// Deadline for the whole embedding acquisition phase.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for SemanticSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            high_risk_threshold: default_high(),
            medium_risk_threshold: default_medium(),
            timeout_secs: default_timeout_secs(),
            model: default_model(),
        }
    }
}

impl SemanticSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (field, v) in [
            ("semantic.high_risk_threshold", self.high_risk_threshold),
            ("semantic.medium_risk_threshold", self.medium_risk_threshold),
        ] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(ConfigError::InvalidSetting {
                    field,
                    reason: format!("{v} is outside 0..=1"),
                });
            }
        }
        if self.high_risk_threshold > self.medium_risk_threshold {
            return Err(ConfigError::InvalidSetting {
                field: "semantic.high_risk_threshold",
                reason: format!(
                    "{} exceeds medium_risk_threshold {}",
                    self.high_risk_threshold, self.medium_risk_threshold
                ),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "semantic.timeout_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SemanticOutcome {
    Disabled,
    /// No retrieved context: forced HIGH risk with similarity 0.0.
    NoContext,
    Scored { similarity: f64, severity: Severity },
    Timeout,
    Error { cause: String },
}

impl SemanticOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SemanticOutcome::Disabled => "disabled",
            SemanticOutcome::NoContext => "no_context",
            SemanticOutcome::Scored { .. } => "scored",
            SemanticOutcome::Timeout => "timeout",
            SemanticOutcome::Error { .. } => "error",
        }
    }

    pub fn semantic_risk(&self) -> bool {
        match self {
            SemanticOutcome::NoContext => true,
            SemanticOutcome::Scored { severity, .. } => *severity != Severity::None,
            _ => false,
        }
    }

    pub fn similarity(&self) -> Option<f64> {
        match self {
            SemanticOutcome::NoContext => Some(0.0),
            SemanticOutcome::Scored { similarity, .. } => Some(*similarity),
            _ => None,
        }
    }

    /// Severity string as reported downstream (`DISABLED`, `TIMEOUT`, `ERROR` for
    /// the degraded cases).
    pub fn severity_label(&self) -> &'static str {
        match self {
            SemanticOutcome::Disabled => "DISABLED",
            SemanticOutcome::NoContext => Severity::High.as_str(),
            SemanticOutcome::Scored { severity, .. } => severity.as_str(),
            SemanticOutcome::Timeout => "TIMEOUT",
            SemanticOutcome::Error { .. } => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticReport {
    pub outcome: SemanticOutcome,
    pub semantic_risk: bool,
    pub similarity: Option<f64>,
    pub severity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl SemanticReport {
    fn new(outcome: SemanticOutcome, model: Option<String>, explanation: Option<String>) -> Self {
        Self {
            semantic_risk: outcome.semantic_risk(),
            similarity: outcome.similarity(),
            severity: outcome.severity_label().to_string(),
            outcome,
            model,
            explanation,
        }
    }
}

/// Cosine similarity of two equal-length vectors; 0.0 when either norm is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0f64;
    let mut na = 0f64;
    let mut nb = 0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

fn check_vector(v: &[f32], what: &str) -> anyhow::Result<()> {
    if v.is_empty() {
        anyhow::bail!("{what} embedding is empty");
    }
    if v.iter().any(|x| !x.is_finite()) {
        anyhow::bail!("{what} embedding contains non-finite values");
    }
    Ok(())
}

pub struct SemanticEvaluator {
    settings: SemanticSettings,
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<EmbeddingCache>,
}

impl std::fmt::Debug for SemanticEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticEvaluator")
            .field("settings", &self.settings)
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl SemanticEvaluator {
    pub fn new(
        settings: SemanticSettings,
        provider: Arc<dyn EmbeddingProvider>,
        cache: Arc<EmbeddingCache>,
    ) -> Self {
        Self {
            settings,
            provider,
            cache,
        }
    }

    pub fn settings(&self) -> &SemanticSettings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }

    /// Cache first, then the provider; a fresh vector is validated before write-back.
    async fn embedding_for(&self, scope: &TenantScope, text: &str, what: &str) -> anyhow::Result<Vec<f32>> {
        if let Some(hit) = self.cache.lookup(scope, text).await {
            return Ok(hit.embedding);
        }
        let v = self.provider.embed(text).await?;
        check_vector(&v, what)?;
        self.cache
            .write_back(scope, text, &v, self.provider.model())
            .await;
        Ok(v)
    }

    async fn acquire(
        &self,
        scope: &TenantScope,
        joined: &str,
        response: &str,
    ) -> anyhow::Result<(Vec<f32>, Vec<f32>)> {
        let ctx = self.embedding_for(scope, joined, "context").await?;
        let resp = self.embedding_for(scope, response, "response").await?;
        check_vector(&ctx, "context")?;
        check_vector(&resp, "response")?;
        if ctx.len() != resp.len() {
            anyhow::bail!(
                "embedding dimension mismatch: context {} vs response {}",
                ctx.len(),
                resp.len()
            );
        }
        Ok((ctx, resp))
    }

    fn classify(&self, similarity: f64) -> (Severity, Option<String>) {
        if similarity < self.settings.high_risk_threshold {
            (
                Severity::High,
                Some(format!(
                    "Low semantic similarity (score={similarity}). Response appears ungrounded."
                )),
            )
        } else if similarity < self.settings.medium_risk_threshold {
            (
                Severity::Medium,
                Some(format!(
                    "Moderate semantic similarity (score={similarity}). Partial grounding detected."
                )),
            )
        } else {
            (Severity::None, None)
        }
    }

    pub async fn evaluate(
        &self,
        scope: &TenantScope,
        context: &[String],
        response: &str,
    ) -> SemanticReport {
        let report = self.evaluate_inner(scope, context, response).await;
        crate::metrics::semantic_outcome(report.outcome.label());
        report
    }

    async fn evaluate_inner(
        &self,
        scope: &TenantScope,
        context: &[String],
        response: &str,
    ) -> SemanticReport {
        if !self.settings.enabled {
            return SemanticReport::new(
                SemanticOutcome::Disabled,
                None,
                Some("Semantic layer disabled.".to_string()),
            );
        }
        let model = Some(self.settings.model.clone());

        if context.is_empty() {
            return SemanticReport::new(
                SemanticOutcome::NoContext,
                model,
                Some("No retrieved context available.".to_string()),
            );
        }

        let joined = join_context(context);
        let deadline = self.settings.timeout();
        let acquired = tokio::time::timeout(deadline, self.acquire(scope, &joined, response)).await;

        match acquired {
            Err(_) => {
                warn!(target: "semantic", timeout_secs = self.settings.timeout_secs, provider = self.provider.name(), "embedding acquisition timed out");
                SemanticReport::new(
                    SemanticOutcome::Timeout,
                    model,
                    Some("Semantic evaluation timeout.".to_string()),
                )
            }
            Ok(Err(e)) => {
                warn!(target: "semantic", provider = self.provider.name(), error = %e, "semantic evaluation failed");
                let cause = e.to_string();
                SemanticReport::new(
                    SemanticOutcome::Error {
                        cause: cause.clone(),
                    },
                    model,
                    Some(format!("Semantic evaluation failed: {cause}")),
                )
            }
            Ok(Ok((ctx, resp))) => {
                let raw = cosine_similarity(&ctx, &resp);
                let similarity = round_to(raw.clamp(0.0, 1.0), 3);
                let similarity = if similarity.is_finite() { similarity } else { 0.0 };
                let (severity, explanation) = self.classify(similarity);
                debug!(target: "semantic", response = %anon_hash(response), similarity, severity = severity.as_str(), "semantic scored");
                SemanticReport::new(
                    SemanticOutcome::Scored {
                        similarity,
                        severity,
                    },
                    model,
                    explanation,
                )
            }
        }
    }
}
