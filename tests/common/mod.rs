// tests/common/mod.rs
// Shared providers and builders for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use atlas_trust::cache::CacheSettings;
use atlas_trust::engines::{SemanticEvaluator, SemanticSettings};
use atlas_trust::{EmbeddingCache, EmbeddingProvider, EvaluationInput};

pub fn refund_input() -> EvaluationInput {
    EvaluationInput::new(
        vec!["Refunds are allowed within 30 days.".to_string()],
        "Yes, refunds are allowed up to 120 days.",
        "Can I get a refund after 90 days?",
    )
}

/// `[1, 0]` for texts mentioning "within", `[0, 1]` otherwise; counts calls.
#[derive(Debug, Default)]
pub struct AxisProvider {
    pub calls: AtomicUsize,
}

impl AxisProvider {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for AxisProvider {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.to_lowercase().contains("within") {
            Ok(vec![1.0, 0.0])
        } else {
            Ok(vec![0.0, 1.0])
        }
    }
    fn name(&self) -> &'static str {
        "axis"
    }
    fn model(&self) -> &str {
        "axis-2"
    }
}

/// Returns a fixed vector for every text.
#[derive(Debug, Clone)]
pub struct FixedProvider(pub Vec<f32>);

#[async_trait::async_trait]
impl EmbeddingProvider for FixedProvider {
    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(self.0.clone())
    }
    fn name(&self) -> &'static str {
        "fixed"
    }
    fn model(&self) -> &str {
        "fixed"
    }
}

/// Sleeps before answering.
#[derive(Debug, Clone)]
pub struct SlowProvider(pub Duration);

#[async_trait::async_trait]
impl EmbeddingProvider for SlowProvider {
    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        tokio::time::sleep(self.0).await;
        Ok(vec![1.0, 0.0])
    }
    fn name(&self) -> &'static str {
        "slow"
    }
    fn model(&self) -> &str {
        "slow"
    }
}

/// Context gets a 2-dim vector, everything else a 3-dim one.
#[derive(Debug, Clone, Copy)]
pub struct MismatchProvider;

#[async_trait::async_trait]
impl EmbeddingProvider for MismatchProvider {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        if text.contains("context") {
            Ok(vec![1.0, 0.0])
        } else {
            Ok(vec![1.0, 0.0, 0.0])
        }
    }
    fn name(&self) -> &'static str {
        "mismatch"
    }
    fn model(&self) -> &str {
        "mismatch"
    }
}

pub fn evaluator_with(
    provider: Arc<dyn EmbeddingProvider>,
    settings: SemanticSettings,
) -> (SemanticEvaluator, Arc<EmbeddingCache>) {
    let cache = Arc::new(EmbeddingCache::memory_only(CacheSettings::default()));
    (
        SemanticEvaluator::new(settings, provider, cache.clone()),
        cache,
    )
}
