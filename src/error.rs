//! Error taxonomy for setup-time failures.
//!
//! Engines never return these: degraded signals (timeouts, provider errors,
//! disabled features) are data on the engine reports. Only configuration and
//! admission problems surface as `Err`.

use thiserror::Error;

/// Missing or invalid weight/threshold configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A weight was negative, NaN or infinite.
    #[error("invalid weight `{field}`: {value} (must be finite and >= 0)")]
    InvalidWeight { field: &'static str, value: f64 },

    /// Base score outside the accepted range.
    #[error("invalid base_score {value} (must be within 0..={max})")]
    InvalidBaseScore { value: f64, max: f64 },

    /// A threshold or limit that failed validation.
    #[error("invalid setting `{field}`: {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    /// An environment variable was present but could not be parsed.
    #[error("invalid value for {var}={value:?}: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("an active weight profile already exists for tenant `{tenant}` ({environment})")]
    DuplicateProfile { tenant: String, environment: String },

    #[error("no active weight profile for tenant `{tenant}` ({environment})")]
    ProfileNotFound { tenant: String, environment: String },

    #[error("weight update for tenant `{tenant}` contains no fields")]
    EmptyPatch { tenant: String },
}

/// Failures the caller-facing orchestration layer can report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("rate limit exceeded for `{key}` ({limit} requests per window)")]
    RateLimited { key: String, limit: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
