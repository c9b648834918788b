// src/cache/mod.rs
//! Two-tier embedding cache: process-local LRU/TTL tier in front of a durable
//! tenant-scoped store.
//!
//! Lookup order is memory → durable. A durable hit is promoted into memory.
//! Writes go to both tiers. Durable-tier failures are logged and treated as a
//! miss / skipped write; the cache never fails an evaluation.

pub mod memory;
pub mod store;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub use memory::{CacheSettings, MemoryHealth, MemoryStats, MemoryTier};
pub use store::{EmbeddingStore, MemoryStore, StoredEmbedding};

use crate::telemetry::hex_digest;

/// Isolation boundary for cached embeddings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantScope {
    /// Entries created without a tenant. Never visible to a tenant.
    #[default]
    Global,
    Tenant(String),
}

impl TenantScope {
    pub fn tenant(id: impl Into<String>) -> Self {
        TenantScope::Tenant(id.into())
    }

    /// `None` or a blank id means the global scope.
    pub fn from_option(id: Option<&str>) -> Self {
        match id.map(str::trim) {
            Some(t) if !t.is_empty() => TenantScope::Tenant(t.to_string()),
            _ => TenantScope::Global,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            TenantScope::Global => None,
            TenantScope::Tenant(t) => Some(t.as_str()),
        }
    }

    /// Length-prefixed so no tenant id can forge another scope's prefix.
    fn hash_prefix(&self) -> String {
        match self {
            TenantScope::Global => "g:".to_string(),
            TenantScope::Tenant(t) => format!("t{}:{}:", t.len(), t),
        }
    }
}

/// Collapse whitespace runs and trim; the cache key ignores layout differences.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// SHA-256 hex digest of `(scope, normalized text)`.
pub fn content_hash(scope: &TenantScope, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(scope.hash_prefix().as_bytes());
    hasher.update(normalize_text(text).as_bytes());
    hex_digest(&hasher.finalize())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    Memory,
    Durable,
}

impl CacheTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::Memory => "memory",
            CacheTier::Durable => "durable",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub embedding: Vec<f32>,
    pub tier: CacheTier,
}

pub struct EmbeddingCache {
    memory: MemoryTier,
    durable: Option<Arc<dyn EmbeddingStore>>,
}

impl std::fmt::Debug for EmbeddingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingCache")
            .field("memory", &self.memory)
            .field("durable", &self.durable.as_ref().map(|s| s.name()))
            .finish()
    }
}

impl EmbeddingCache {
    pub fn new(settings: CacheSettings, durable: Arc<dyn EmbeddingStore>) -> Self {
        Self {
            memory: MemoryTier::new(settings),
            durable: Some(durable),
        }
    }

    /// Memory tier only (no durable write-through).
    pub fn memory_only(settings: CacheSettings) -> Self {
        Self {
            memory: MemoryTier::new(settings),
            durable: None,
        }
    }

    pub fn memory(&self) -> &MemoryTier {
        &self.memory
    }

    pub async fn lookup(&self, scope: &TenantScope, text: &str) -> Option<CacheHit> {
        let key = content_hash(scope, text);

        if let Some(embedding) = self.memory.get_key_at(&key, Instant::now()) {
            crate::metrics::cache_hit(CacheTier::Memory);
            return Some(CacheHit {
                embedding,
                tier: CacheTier::Memory,
            });
        }

        let store = match &self.durable {
            Some(s) => s,
            None => {
                crate::metrics::cache_miss();
                return None;
            }
        };

        match store.lookup(scope, &key).await {
            Ok(Some(row)) => {
                debug!(target: "embed_cache", hash = %short(&key), hits = row.hit_count, "durable hit");
                self.memory
                    .set_key_at(key, row.embedding.clone(), Instant::now());
                crate::metrics::cache_hit(CacheTier::Durable);
                Some(CacheHit {
                    embedding: row.embedding,
                    tier: CacheTier::Durable,
                })
            }
            Ok(None) => {
                crate::metrics::cache_miss();
                None
            }
            Err(e) => {
                warn!(target: "embed_cache", store = store.name(), error = %e, "durable lookup failed; treating as miss");
                crate::metrics::cache_miss();
                None
            }
        }
    }

    /// Write a freshly computed embedding to both tiers.
    pub async fn write_back(&self, scope: &TenantScope, text: &str, embedding: &[f32], model: &str) {
        let key = content_hash(scope, text);
        if let Some(store) = &self.durable {
            if let Err(e) = store.store(scope, &key, embedding, model).await {
                warn!(target: "embed_cache", store = store.name(), error = %e, "durable write failed");
            }
        }
        self.memory.set_key_at(key, embedding.to_vec(), Instant::now());
    }
}

fn short(hash: &str) -> &str {
    &hash[..hash.len().min(12)]
}
