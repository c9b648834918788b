//! Durable embedding tier: the capability the cache writes through to, plus an
//! in-process implementation.
//!
//! Rows are keyed by `(tenant scope, content hash)` and are unique per key: a
//! second `store` for an existing key keeps the original row. Lookups record a
//! hit and the access time for observability.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::TenantScope;

/// One durable cache row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEmbedding {
    pub content_hash: String,
    pub tenant: TenantScope,
    pub embedding: Vec<f32>,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub hit_count: u64,
}

#[async_trait::async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Fetch the row for `(scope, content_hash)`, recording the access.
    async fn lookup(&self, scope: &TenantScope, content_hash: &str)
        -> Result<Option<StoredEmbedding>>;

    /// Insert a row. Returns `false` when the key already existed (row untouched).
    async fn store(
        &self,
        scope: &TenantScope,
        content_hash: &str,
        embedding: &[f32],
        model: &str,
    ) -> Result<bool>;

    fn name(&self) -> &'static str;
}

/// `HashMap`-backed store for tests and single-node deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<(TenantScope, String), StoredEmbedding>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> MutexGuard<'_, HashMap<(TenantScope, String), StoredEmbedding>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read a row without touching its access statistics.
    pub fn peek(&self, scope: &TenantScope, content_hash: &str) -> Option<StoredEmbedding> {
        self.rows()
            .get(&(scope.clone(), content_hash.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl EmbeddingStore for MemoryStore {
    async fn lookup(
        &self,
        scope: &TenantScope,
        content_hash: &str,
    ) -> Result<Option<StoredEmbedding>> {
        let mut rows = self.rows();
        Ok(rows
            .get_mut(&(scope.clone(), content_hash.to_string()))
            .map(|row| {
                row.hit_count += 1;
                row.last_accessed = Utc::now();
                row.clone()
            }))
    }

    async fn store(
        &self,
        scope: &TenantScope,
        content_hash: &str,
        embedding: &[f32],
        model: &str,
    ) -> Result<bool> {
        let key = (scope.clone(), content_hash.to_string());
        let mut rows = self.rows();
        if rows.contains_key(&key) {
            return Ok(false);
        }
        let now = Utc::now();
        rows.insert(
            key,
            StoredEmbedding {
                content_hash: content_hash.to_string(),
                tenant: scope.clone(),
                embedding: embedding.to_vec(),
                model: model.to_string(),
                created_at: now,
                last_accessed: now,
                hit_count: 0,
            },
        );
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
