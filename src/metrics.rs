// src/metrics.rs
//! Metric names and recording helpers on top of the `metrics` facade.
//!
//! Without an installed recorder every call is a no-op, so library users and
//! tests pay nothing. The demo binary installs the Prometheus exporter.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::aggregator::Recommendation;
use crate::cache::CacheTier;

pub const EVALUATIONS_TOTAL: &str = "trust_evaluations_total";
pub const TRUST_SCORE: &str = "trust_score";
pub const CACHE_HITS_TOTAL: &str = "embed_cache_hits_total";
pub const CACHE_MISSES_TOTAL: &str = "embed_cache_misses_total";
pub const SEMANTIC_OUTCOMES_TOTAL: &str = "semantic_outcomes_total";
pub const RATE_LIMIT_REJECTIONS_TOTAL: &str = "rate_limit_rejections_total";

/// One-time registration so series carry help text on `/metrics`.
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(EVALUATIONS_TOTAL, "Completed evaluations by recommendation.");
        describe_histogram!(TRUST_SCORE, "Final trust score per evaluation.");
        describe_counter!(CACHE_HITS_TOTAL, "Embedding cache hits by tier.");
        describe_counter!(CACHE_MISSES_TOTAL, "Embedding lookups that missed every tier.");
        describe_counter!(SEMANTIC_OUTCOMES_TOTAL, "Semantic evaluations by outcome.");
        describe_counter!(RATE_LIMIT_REJECTIONS_TOTAL, "Requests rejected by the rate limiter.");
    });
}

/// Install the Prometheus recorder globally and return a render handle.
pub fn install_prometheus() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
    ensure_described();
    Ok(handle)
}

pub(crate) fn evaluation(rec: Recommendation, score: u32) {
    counter!(EVALUATIONS_TOTAL, "recommendation" => rec.as_str()).increment(1);
    histogram!(TRUST_SCORE).record(score as f64);
}

pub(crate) fn cache_hit(tier: CacheTier) {
    counter!(CACHE_HITS_TOTAL, "tier" => tier.as_str()).increment(1);
}

pub(crate) fn cache_miss() {
    counter!(CACHE_MISSES_TOTAL).increment(1);
}

pub(crate) fn semantic_outcome(label: &'static str) {
    counter!(SEMANTIC_OUTCOMES_TOTAL, "outcome" => label).increment(1);
}

pub(crate) fn rate_limited() {
    counter!(RATE_LIMIT_REJECTIONS_TOTAL).increment(1);
}
