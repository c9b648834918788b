// src/lib.rs
// Public library surface for the demo binary and integration tests.

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod engines;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod provider;
pub mod rate_limiter;
pub mod service;
pub mod telemetry;
pub mod tokenizer;
pub mod weights;

// ---- Re-exports for stable public API ----
pub use aggregator::{Recommendation, TrustAggregator, TrustBreakdown, TrustSignals};
pub use cache::{EmbeddingCache, EmbeddingStore, MemoryStore, TenantScope};
pub use config::{EngineConfig, SemanticGate};
pub use engines::{RiskTier, SemanticOutcome, Severity};
pub use error::{ConfigError, ServiceError};
pub use pipeline::{EvaluationInput, TrustPipeline, TrustResult};
pub use provider::{DisabledProvider, EmbeddingProvider, HashedBagProvider};
pub use rate_limiter::RateLimiter;
pub use service::{CallerContext, TrustService};
pub use weights::{WeightConfig, WeightOverrides, WeightRegistry};
