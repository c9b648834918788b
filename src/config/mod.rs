// src/config/mod.rs
//! Engine configuration: semantic layer, embedding cache, semantic gate and
//! rate limiting.
//!
//! Sources, in order of precedence: process environment (binaries call
//! `dotenvy::dotenv()` first), then an optional TOML file, then built-in
//! defaults. Values that fail to parse or are out of range are errors.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cache::CacheSettings;
use crate::engines::SemanticSettings;
use crate::error::{ConfigError, ConfigResult};
use crate::rate_limiter::RateLimitSettings;

fn default_grounding_below() -> f64 {
    0.75
}
fn default_hallucination_above() -> f64 {
    0.3
}

/// When the semantic engine runs: `grounding < grounding_below` or
/// `hallucination > hallucination_above`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticGate {
    #[serde(default = "default_grounding_below")]
    pub grounding_below: f64,
    #[serde(default = "default_hallucination_above")]
    pub hallucination_above: f64,
}

impl Default for SemanticGate {
    fn default() -> Self {
        Self {
            grounding_below: default_grounding_below(),
            hallucination_above: default_hallucination_above(),
        }
    }
}

impl SemanticGate {
    pub fn should_run(&self, grounding: f64, hallucination: f64) -> bool {
        grounding < self.grounding_below || hallucination > self.hallucination_above
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub semantic: SemanticSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub gate: SemanticGate,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

fn parse_bool(var: &'static str, raw: &str) -> ConfigResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var,
            value: raw.to_string(),
            reason: "expected true/false".to_string(),
        }),
    }
}

fn parse_num<T>(var: &'static str, raw: &str) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnv {
        var,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn unit_interval(field: &'static str, v: f64) -> ConfigResult<()> {
    if v.is_finite() && (0.0..=1.0).contains(&v) {
        Ok(())
    } else {
        Err(ConfigError::InvalidSetting {
            field,
            reason: format!("{v} is outside 0..=1"),
        })
    }
}

impl EngineConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.semantic.validate()?;
        self.rate_limit.validate()?;
        unit_interval("gate.grounding_below", self.gate.grounding_below)?;
        unit_interval("gate.hallucination_above", self.gate.hallucination_above)?;
        if self.cache.max_entries == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "cache.max_entries",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.cache.max_memory_mb.is_finite() || self.cache.max_memory_mb < 0.0 {
            return Err(ConfigError::InvalidSetting {
                field: "cache.max_memory_mb",
                reason: format!("{} must be finite and >= 0", self.cache.max_memory_mb),
            });
        }
        Ok(())
    }

    pub fn from_toml_str(src: &str) -> anyhow::Result<Self> {
        let cfg: EngineConfig = toml::from_str(src).context("parse engine config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path)
            .with_context(|| format!("reading engine config from {}", path.display()))?;
        Self::from_toml_str(&src).with_context(|| format!("engine config {}", path.display()))
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::default().with_env_from(|k| std::env::var(k).ok())
    }

    /// Overlay environment-style variables from `lookup` onto `self`.
    pub fn with_env_from<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("ENABLE_SEMANTIC_LAYER") {
            self.semantic.enabled = parse_bool("ENABLE_SEMANTIC_LAYER", &v)?;
        }
        if let Some(v) = get("SEMANTIC_TIMEOUT_SECONDS") {
            self.semantic.timeout_secs = parse_num("SEMANTIC_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = get("EMBED_MODEL") {
            self.semantic.model = v.trim().to_string();
        }
        if let Some(v) = get("SEMANTIC_HIGH_RISK_THRESHOLD") {
            self.semantic.high_risk_threshold = parse_num("SEMANTIC_HIGH_RISK_THRESHOLD", &v)?;
        }
        if let Some(v) = get("SEMANTIC_MEDIUM_RISK_THRESHOLD") {
            self.semantic.medium_risk_threshold = parse_num("SEMANTIC_MEDIUM_RISK_THRESHOLD", &v)?;
        }
        if let Some(v) = get("EMBED_CACHE_ENABLED") {
            self.cache.enabled = parse_bool("EMBED_CACHE_ENABLED", &v)?;
        }
        if let Some(v) = get("EMBED_CACHE_MAX_SIZE") {
            self.cache.max_entries = parse_num("EMBED_CACHE_MAX_SIZE", &v)?;
        }
        if let Some(v) = get("EMBED_CACHE_TTL_SECONDS") {
            self.cache.ttl_secs = parse_num("EMBED_CACHE_TTL_SECONDS", &v)?;
        }
        if let Some(v) = get("EMBED_CACHE_MAX_MEMORY_MB") {
            self.cache.max_memory_mb = parse_num("EMBED_CACHE_MAX_MEMORY_MB", &v)?;
        }
        if let Some(v) = get("RATE_LIMIT_WINDOW_SECONDS") {
            self.rate_limit.window_secs = parse_num("RATE_LIMIT_WINDOW_SECONDS", &v)?;
        }
        if let Some(v) = get("RATE_LIMIT_IDLE_SECONDS") {
            self.rate_limit.idle_secs = parse_num("RATE_LIMIT_IDLE_SECONDS", &v)?;
        }

        self.validate()?;
        Ok(self)
    }
}
