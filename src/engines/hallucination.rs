//! Hallucination risk: divergence between response and retrieved context.
//!
//! ```text
//! unsupported_ratio       = |distinct response tokens absent from context| / |response tokens|
//! divergence_score        = min(1.2 * unsupported_ratio, 1.0)
//! context_absence_penalty = 1 - |distinct shared tokens| / |response tokens|
//! hallucination_score     = 0.6 * divergence + 0.4 * absence (+0.2 on numeric conflict)
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{clamp01, round_to};
use crate::tokenizer::{join_context, tokenize};

/// Fixed risk when there is no evidence to compare against.
pub const NO_CONTEXT_RISK: f64 = 0.7;
/// Added when the number detector reported a conflict.
pub const NUMBER_CONFLICT_BOOST: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HallucinationReport {
    pub hallucination_score: f64,
    pub divergence_score: f64,
    pub unsupported_ratio: f64,
    pub context_absence_penalty: f64,
}

impl HallucinationReport {
    fn no_context() -> Self {
        Self {
            hallucination_score: NO_CONTEXT_RISK,
            divergence_score: NO_CONTEXT_RISK,
            unsupported_ratio: 0.0,
            context_absence_penalty: NO_CONTEXT_RISK,
        }
    }
}

pub fn score(context: &[String], response: &str, number_conflict: bool) -> HallucinationReport {
    if context.is_empty() {
        return HallucinationReport::no_context();
    }

    let response_tokens = tokenize(response);
    if response_tokens.is_empty() {
        return HallucinationReport::default();
    }
    let context_tokens = tokenize(&join_context(context));

    let ctx_set: HashSet<&str> = context_tokens.iter().map(String::as_str).collect();
    let resp_set: HashSet<&str> = response_tokens.iter().map(String::as_str).collect();
    let n = response_tokens.len() as f64;

    let unsupported = resp_set.iter().filter(|t| !ctx_set.contains(*t)).count();
    let shared = resp_set.len() - unsupported;

    let unsupported_ratio = unsupported as f64 / n;
    let divergence_score = (unsupported_ratio * 1.2).min(1.0);
    let context_absence_penalty = 1.0 - shared as f64 / n;

    let mut hallucination = 0.6 * divergence_score + 0.4 * context_absence_penalty;
    if number_conflict {
        hallucination = (hallucination + NUMBER_CONFLICT_BOOST).min(1.0);
    }

    HallucinationReport {
        hallucination_score: clamp01(round_to(hallucination, 2)),
        divergence_score: clamp01(round_to(divergence_score, 2)),
        unsupported_ratio: clamp01(round_to(unsupported_ratio, 2)),
        context_absence_penalty: clamp01(round_to(context_absence_penalty, 2)),
    }
}
