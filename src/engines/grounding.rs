//! Grounding: how much of the response is textually supported by the context.
//!
//! `grounding_score = round2(0.7 * overlap_ratio + 0.3 * context_coverage)`

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{clamp01, round_to};
use crate::tokenizer::{join_context, token_counts, tokenize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GroundingReport {
    pub grounding_score: f64,
    pub overlap_ratio: f64,
    pub context_coverage: f64,
}

pub fn score(context: &[String], response: &str) -> GroundingReport {
    if context.is_empty() {
        return GroundingReport::default();
    }

    let response_tokens = tokenize(response);
    let context_tokens = tokenize(&join_context(context));
    if response_tokens.is_empty() || context_tokens.is_empty() {
        return GroundingReport::default();
    }

    let resp_counts = token_counts(&response_tokens);
    let ctx_counts = token_counts(&context_tokens);

    let common: HashSet<&str> = resp_counts
        .keys()
        .filter(|t| ctx_counts.contains_key(*t))
        .copied()
        .collect();

    let overlap_count: usize = common
        .iter()
        .map(|t| resp_counts[t].min(ctx_counts[t]))
        .sum();

    let overlap_ratio = overlap_count as f64 / response_tokens.len() as f64;
    let context_coverage = common.len() as f64 / ctx_counts.len() as f64;

    GroundingReport {
        grounding_score: clamp01(round_to(0.7 * overlap_ratio + 0.3 * context_coverage, 2)),
        overlap_ratio: clamp01(round_to(overlap_ratio, 2)),
        context_coverage: clamp01(round_to(context_coverage, 2)),
    }
}
