//! Caller-facing facade: admission, weight resolution, evaluation.

use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::cache::{EmbeddingStore, TenantScope};
use crate::config::EngineConfig;
use crate::error::{ConfigResult, ServiceError};
use crate::pipeline::{EvaluationInput, TrustPipeline, TrustResult};
use crate::provider::EmbeddingProvider;
use crate::rate_limiter::{RateLimitSettings, RateLimiter};
use crate::weights::WeightRegistry;

/// Who is calling and under which tenant/environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    /// Rate-limit key (API key id, client id, ...).
    pub caller_key: String,
    pub tenant: Option<String>,
    pub environment: Option<String>,
    /// Per-caller limit; `None` uses the configured default.
    pub limit: Option<usize>,
}

impl CallerContext {
    pub fn new(caller_key: impl Into<String>) -> Self {
        Self {
            caller_key: caller_key.into(),
            ..Self::default()
        }
    }

    pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn environment(mut self, env: impl Into<String>) -> Self {
        self.environment = Some(env.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug)]
pub struct TrustService {
    pipeline: TrustPipeline,
    registry: Arc<WeightRegistry>,
    limiter: Arc<RateLimiter>,
    rate: RateLimitSettings,
}

impl TrustService {
    pub fn new(
        pipeline: TrustPipeline,
        registry: Arc<WeightRegistry>,
        limiter: Arc<RateLimiter>,
        rate: RateLimitSettings,
    ) -> Self {
        Self {
            pipeline,
            registry,
            limiter,
            rate,
        }
    }

    /// Validate `config` and build every collaborator from it.
    pub fn from_config(
        config: &EngineConfig,
        provider: Arc<dyn EmbeddingProvider>,
        store: Option<Arc<dyn EmbeddingStore>>,
        registry: Arc<WeightRegistry>,
    ) -> ConfigResult<Self> {
        config.validate()?;
        let pipeline = TrustPipeline::from_config(config, provider, store);
        let limiter = Arc::new(RateLimiter::from_settings(&config.rate_limit));
        Ok(Self::new(pipeline, registry, limiter, config.rate_limit.clone()))
    }

    pub fn pipeline(&self) -> &TrustPipeline {
        &self.pipeline
    }

    pub fn registry(&self) -> &Arc<WeightRegistry> {
        &self.registry
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub async fn evaluate(
        &self,
        caller: &CallerContext,
        input: &EvaluationInput,
    ) -> Result<TrustResult, ServiceError> {
        self.evaluate_at(caller, input, Instant::now()).await
    }

    pub async fn evaluate_at(
        &self,
        caller: &CallerContext,
        input: &EvaluationInput,
        now: Instant,
    ) -> Result<TrustResult, ServiceError> {
        let limit = caller.limit.unwrap_or(self.rate.default_limit);
        if !self.limiter.check_at(&caller.caller_key, limit, now) {
            return Err(ServiceError::RateLimited {
                key: caller.caller_key.clone(),
                limit,
            });
        }

        let weights = self
            .registry
            .resolve(caller.tenant.as_deref(), caller.environment.as_deref());
        weights.validate()?;
        debug!(target: "trust", version = weights.version, environment = %weights.environment, "weights resolved");

        let scope = TenantScope::from_option(caller.tenant.as_deref());
        Ok(self.pipeline.evaluate(&scope, input, &weights).await)
    }

    /// Drop limiter keys idle longer than the configured threshold.
    pub fn sweep_idle(&self) -> usize {
        self.limiter.cleanup_idle(self.rate.idle())
    }
}
