//! Versioned, tenant/environment-scoped weight profiles.
//!
//! `resolve` hands out `Arc<WeightConfig>` snapshots; updates swap in a new
//! snapshot with `version + 1`, so an evaluation in flight keeps the weights it
//! started with. Profiles can also be seeded from a TOML file:
//!
//! ```toml
//! [[profile]]
//! tenant = "acme"
//! environment = "staging"
//! hallucination_weight = 60.0
//! semantic_risk_penalty = 20.0
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

use crate::error::{ConfigError, ConfigResult};

pub const DEFAULT_ENVIRONMENT: &str = "production";
pub const MAX_BASE_SCORE: f64 = 200.0;

/// `trim` + lowercase; blank means [`DEFAULT_ENVIRONMENT`].
pub fn normalize_env(env: Option<&str>) -> String {
    match env.map(|e| e.trim().to_lowercase()) {
        Some(e) if !e.is_empty() => e,
        _ => DEFAULT_ENVIRONMENT.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightConfig {
    pub base_score: f64,
    pub hallucination_weight: f64,
    pub grounding_weight: f64,
    pub high_risk_penalty: f64,
    pub medium_risk_penalty: f64,
    pub critical_risk_penalty: f64,
    pub number_conflict_penalty: f64,
    pub confidence_mismatch_penalty: f64,
    pub semantic_risk_penalty: f64,
    /// 0 for the built-in defaults, >= 1 for stored profiles.
    pub version: u32,
    pub tenant: Option<String>,
    pub environment: String,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            base_score: 100.0,
            hallucination_weight: 50.0,
            grounding_weight: 30.0,
            high_risk_penalty: 15.0,
            medium_risk_penalty: 8.0,
            critical_risk_penalty: 25.0,
            number_conflict_penalty: 15.0,
            confidence_mismatch_penalty: 12.0,
            semantic_risk_penalty: 15.0,
            version: 0,
            tenant: None,
            environment: DEFAULT_ENVIRONMENT.to_string(),
        }
    }
}

impl WeightConfig {
    fn fields(&self) -> [(&'static str, f64); 9] {
        [
            ("base_score", self.base_score),
            ("hallucination_weight", self.hallucination_weight),
            ("grounding_weight", self.grounding_weight),
            ("high_risk_penalty", self.high_risk_penalty),
            ("medium_risk_penalty", self.medium_risk_penalty),
            ("critical_risk_penalty", self.critical_risk_penalty),
            ("number_conflict_penalty", self.number_conflict_penalty),
            ("confidence_mismatch_penalty", self.confidence_mismatch_penalty),
            ("semantic_risk_penalty", self.semantic_risk_penalty),
        ]
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (field, value) in self.fields() {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { field, value });
            }
        }
        if self.base_score > MAX_BASE_SCORE {
            return Err(ConfigError::InvalidBaseScore {
                value: self.base_score,
                max: MAX_BASE_SCORE,
            });
        }
        Ok(())
    }
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hallucination_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_risk_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium_risk_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_risk_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_conflict_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_mismatch_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_risk_penalty: Option<f64>,
}

impl WeightOverrides {
    pub fn is_empty(&self) -> bool {
        *self == WeightOverrides::default()
    }

    pub fn apply_to(&self, cfg: &mut WeightConfig) {
        if let Some(v) = self.base_score {
            cfg.base_score = v;
        }
        if let Some(v) = self.hallucination_weight {
            cfg.hallucination_weight = v;
        }
        if let Some(v) = self.grounding_weight {
            cfg.grounding_weight = v;
        }
        if let Some(v) = self.high_risk_penalty {
            cfg.high_risk_penalty = v;
        }
        if let Some(v) = self.medium_risk_penalty {
            cfg.medium_risk_penalty = v;
        }
        if let Some(v) = self.critical_risk_penalty {
            cfg.critical_risk_penalty = v;
        }
        if let Some(v) = self.number_conflict_penalty {
            cfg.number_conflict_penalty = v;
        }
        if let Some(v) = self.confidence_mismatch_penalty {
            cfg.confidence_mismatch_penalty = v;
        }
        if let Some(v) = self.semantic_risk_penalty {
            cfg.semantic_risk_penalty = v;
        }
    }
}

#[derive(Debug, Clone)]
struct Profile {
    config: Arc<WeightConfig>,
    active: bool,
}

type ProfileKey = (String, String);

#[derive(Debug, Default)]
pub struct WeightRegistry {
    profiles: RwLock<HashMap<ProfileKey, Profile>>,
}

fn tenant_key(tenant: &str) -> ConfigResult<String> {
    let t = tenant.trim();
    if t.is_empty() {
        return Err(ConfigError::InvalidSetting {
            field: "tenant",
            reason: "tenant id must not be blank".to_string(),
        });
    }
    Ok(t.to_string())
}

impl WeightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a profile at version 1 from the defaults plus `overrides`.
    pub fn create(
        &self,
        tenant: &str,
        environment: Option<&str>,
        overrides: &WeightOverrides,
    ) -> ConfigResult<Arc<WeightConfig>> {
        let tenant = tenant_key(tenant)?;
        let environment = normalize_env(environment);

        let mut cfg = WeightConfig {
            version: 1,
            tenant: Some(tenant.clone()),
            environment: environment.clone(),
            ..WeightConfig::default()
        };
        overrides.apply_to(&mut cfg);
        cfg.validate()?;

        let mut map = self.profiles.write().unwrap_or_else(PoisonError::into_inner);
        let key = (tenant.clone(), environment.clone());
        if map.get(&key).map(|p| p.active).unwrap_or(false) {
            return Err(ConfigError::DuplicateProfile {
                tenant,
                environment,
            });
        }
        let snapshot = Arc::new(cfg);
        map.insert(
            key,
            Profile {
                config: snapshot.clone(),
                active: true,
            },
        );
        info!(target: "weights", %tenant, %environment, version = 1, "weight profile created");
        Ok(snapshot)
    }

    /// Apply a partial patch to the active profile; the version is bumped by one.
    pub fn update(
        &self,
        tenant: &str,
        environment: Option<&str>,
        patch: &WeightOverrides,
    ) -> ConfigResult<Arc<WeightConfig>> {
        let tenant = tenant_key(tenant)?;
        let environment = normalize_env(environment);
        if patch.is_empty() {
            return Err(ConfigError::EmptyPatch { tenant });
        }

        let mut map = self.profiles.write().unwrap_or_else(PoisonError::into_inner);
        let key = (tenant.clone(), environment.clone());
        let profile = match map.get_mut(&key) {
            Some(p) if p.active => p,
            _ => {
                return Err(ConfigError::ProfileNotFound {
                    tenant,
                    environment,
                })
            }
        };

        let mut next = (*profile.config).clone();
        patch.apply_to(&mut next);
        next.version = next.version.saturating_add(1);
        next.validate()?;

        let snapshot = Arc::new(next);
        profile.config = snapshot.clone();
        info!(target: "weights", %tenant, %environment, version = snapshot.version, "weight profile updated");
        Ok(snapshot)
    }

    /// Soft delete: the row is kept but `resolve` falls back to defaults.
    pub fn deactivate(&self, tenant: &str, environment: Option<&str>) -> ConfigResult<()> {
        let tenant = tenant_key(tenant)?;
        let environment = normalize_env(environment);
        let mut map = self.profiles.write().unwrap_or_else(PoisonError::into_inner);
        match map.get_mut(&(tenant.clone(), environment.clone())) {
            Some(p) if p.active => {
                p.active = false;
                info!(target: "weights", %tenant, %environment, "weight profile deactivated");
                Ok(())
            }
            _ => Err(ConfigError::ProfileNotFound {
                tenant,
                environment,
            }),
        }
    }

    /// Active profile for `(tenant, environment)`, or defaults tagged with the
    /// requested tenant/environment.
    pub fn resolve(&self, tenant: Option<&str>, environment: Option<&str>) -> Arc<WeightConfig> {
        let environment = normalize_env(environment);
        let tenant = tenant.map(str::trim).filter(|t| !t.is_empty());

        if let Some(t) = tenant {
            let map = self.profiles.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(p) = map.get(&(t.to_string(), environment.clone())) {
                if p.active {
                    return p.config.clone();
                }
            }
        }

        Arc::new(WeightConfig {
            tenant: tenant.map(str::to_string),
            environment,
            ..WeightConfig::default()
        })
    }

    /// Active profiles, sorted by `(tenant, environment)`.
    pub fn active_profiles(&self) -> Vec<Arc<WeightConfig>> {
        let map = self.profiles.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<_> = map
            .iter()
            .filter(|(_, p)| p.active)
            .map(|(k, p)| (k.clone(), p.config.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out.into_iter().map(|(_, c)| c).collect()
    }

    /// Create every `[[profile]]` in `src`. Returns the number created.
    pub fn load_toml_str(&self, src: &str) -> anyhow::Result<usize> {
        let file: ProfileFile = toml::from_str(src).context("parse weight profiles")?;
        for p in &file.profile {
            self.create(&p.tenant, p.environment.as_deref(), &p.weights)
                .with_context(|| format!("weight profile for tenant `{}`", p.tenant))?;
        }
        Ok(file.profile.len())
    }

    pub fn load_profiles_file(&self, path: impl AsRef<Path>) -> anyhow::Result<usize> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path)
            .with_context(|| format!("read weight profiles {}", path.display()))?;
        let n = self
            .load_toml_str(&src)
            .with_context(|| format!("load weight profiles {}", path.display()))?;
        info!(target: "weights", path = %path.display(), profiles = n, "weight profiles loaded");
        Ok(n)
    }
}

#[derive(Debug, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    profile: Vec<ProfileSpec>,
}

#[derive(Debug, Deserialize)]
struct ProfileSpec {
    tenant: String,
    #[serde(default)]
    environment: Option<String>,
    #[serde(flatten)]
    weights: WeightOverrides,
}
