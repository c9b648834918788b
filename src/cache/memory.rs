//! Process-local embedding tier: bounded LRU with TTL and an optional soft
//! memory cap.
//!
//! One mutex guards the LRU and its accounting; `get` and `set` both take it,
//! and every eviction (capacity, memory cap) happens inline inside `set`.
//! All time-dependent operations have an `*_at(now)` variant for tests.

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::mem::size_of;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

use super::{content_hash, TenantScope};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

fn default_enabled() -> bool {
    true
}
fn default_max_entries() -> usize {
    5000
}
fn default_ttl_secs() -> u64 {
    6 * 60 * 60
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Soft cap on the summed entry estimate; `0` disables it.
    #[serde(default)]
    pub max_memory_mb: f64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_entries: default_max_entries(),
            ttl_secs: default_ttl_secs(),
            max_memory_mb: 0.0,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    fn memory_cap_bytes(&self) -> Option<usize> {
        (self.max_memory_mb > 0.0).then(|| (self.max_memory_mb * BYTES_PER_MB) as usize)
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    embedding: Vec<f32>,
    inserted_at: Instant,
}

/// Rough heap + inline footprint of one cached row.
fn estimate_entry_bytes(key: &str, embedding: &[f32]) -> usize {
    key.len()
        + size_of::<String>()
        + size_of::<MemoryEntry>()
        + embedding.len() * size_of::<f32>()
}

#[derive(Debug)]
struct MemoryState {
    lru: LruCache<String, MemoryEntry>,
    bytes: usize,
    hits: u64,
    misses: u64,
}

impl MemoryState {
    fn remove(&mut self, key: &str) -> bool {
        match self.lru.pop(key) {
            Some(old) => {
                self.bytes = self
                    .bytes
                    .saturating_sub(estimate_entry_bytes(key, &old.embedding));
                true
            }
            None => false,
        }
    }

    fn evict_oldest(&mut self) -> bool {
        match self.lru.pop_lru() {
            Some((k, old)) => {
                self.bytes = self
                    .bytes
                    .saturating_sub(estimate_entry_bytes(&k, &old.embedding));
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryStats {
    pub enabled: bool,
    pub size: usize,
    pub max_entries: usize,
    pub ttl_secs: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
    pub memory_estimate_mb: f64,
    pub max_memory_mb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryHealth {
    pub status: &'static str,
    pub items: usize,
    pub memory_mb: f64,
}

#[derive(Debug)]
pub struct MemoryTier {
    settings: CacheSettings,
    inner: Mutex<MemoryState>,
}

impl MemoryTier {
    pub fn new(mut settings: CacheSettings) -> Self {
        if settings.max_entries == 0 {
            settings.max_entries = 1;
        }
        let cap = NonZeroUsize::new(settings.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            settings,
            inner: Mutex::new(MemoryState {
                lru: LruCache::new(cap),
                bytes: 0,
                hits: 0,
                misses: 0,
            }),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, entry: &MemoryEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.inserted_at) > self.settings.ttl()
    }

    pub fn get(&self, text: &str, scope: &TenantScope) -> Option<Vec<f32>> {
        self.get_at(text, scope, Instant::now())
    }

    pub fn get_at(&self, text: &str, scope: &TenantScope, now: Instant) -> Option<Vec<f32>> {
        self.get_key_at(&content_hash(scope, text), now)
    }

    /// Lookup by precomputed content hash. Expired entries are removed and count as a miss.
    pub(crate) fn get_key_at(&self, key: &str, now: Instant) -> Option<Vec<f32>> {
        if !self.settings.enabled {
            return None;
        }
        let mut st = self.state();

        let expired = st.lru.peek(key).map(|entry| self.is_expired(entry, now));
        match expired {
            None => {
                st.misses += 1;
                None
            }
            Some(true) => {
                st.remove(key);
                st.misses += 1;
                None
            }
            Some(false) => {
                st.hits += 1;
                st.lru.get(key).map(|e| e.embedding.clone())
            }
        }
    }

    pub fn set(&self, text: &str, scope: &TenantScope, embedding: Vec<f32>) {
        self.set_at(text, scope, embedding, Instant::now())
    }

    pub fn set_at(&self, text: &str, scope: &TenantScope, embedding: Vec<f32>, now: Instant) {
        self.set_key_at(content_hash(scope, text), embedding, now)
    }

    pub(crate) fn set_key_at(&self, key: String, embedding: Vec<f32>, now: Instant) {
        if !self.settings.enabled {
            return;
        }
        let added = estimate_entry_bytes(&key, &embedding);
        let mut st = self.state();

        // `push` hands back either the replaced value or the evicted LRU row.
        if let Some((old_key, old)) = st.lru.push(
            key,
            MemoryEntry {
                embedding,
                inserted_at: now,
            },
        ) {
            st.bytes = st
                .bytes
                .saturating_sub(estimate_entry_bytes(&old_key, &old.embedding));
        }
        st.bytes += added;

        if let Some(cap) = self.settings.memory_cap_bytes() {
            let mut evicted = 0usize;
            while st.bytes > cap && st.evict_oldest() {
                evicted += 1;
            }
            if evicted > 0 {
                debug!(target: "embed_cache", evicted, bytes = st.bytes, cap, "memory cap eviction");
            }
        }
    }

    /// Store embeddings for well-known texts (system prompts, policies).
    pub fn preload<I, S>(&self, items: I, scope: &TenantScope)
    where
        I: IntoIterator<Item = (S, Vec<f32>)>,
        S: AsRef<str>,
    {
        let now = Instant::now();
        for (text, emb) in items {
            self.set_at(text.as_ref(), scope, emb, now);
        }
    }

    pub fn prune_expired(&self) -> usize {
        self.prune_expired_at(Instant::now())
    }

    /// Drop every expired row; returns how many were removed.
    pub fn prune_expired_at(&self, now: Instant) -> usize {
        let mut st = self.state();
        let expired: Vec<String> = st
            .lru
            .iter()
            .filter(|(_, e)| self.is_expired(e, now))
            .map(|(k, _)| k.clone())
            .collect();
        for k in &expired {
            st.remove(k);
        }
        expired.len()
    }

    /// Empty the tier and reset hit/miss counters.
    pub fn clear(&self) {
        let mut st = self.state();
        st.lru.clear();
        st.bytes = 0;
        st.hits = 0;
        st.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.state().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> MemoryStats {
        let st = self.state();
        let total = st.hits + st.misses;
        let hit_ratio = if total > 0 {
            st.hits as f64 / total as f64
        } else {
            0.0
        };
        MemoryStats {
            enabled: self.settings.enabled,
            size: st.lru.len(),
            max_entries: self.settings.max_entries,
            ttl_secs: self.settings.ttl_secs,
            hits: st.hits,
            misses: st.misses,
            hit_ratio: (hit_ratio * 10_000.0).round() / 10_000.0,
            memory_estimate_mb: st.bytes as f64 / BYTES_PER_MB,
            max_memory_mb: self.settings.max_memory_mb,
        }
    }

    pub fn health(&self) -> MemoryHealth {
        let st = self.state();
        MemoryHealth {
            status: if self.settings.enabled {
                "enabled"
            } else {
                "disabled"
            },
            items: st.lru.len(),
            memory_mb: ((st.bytes as f64 / BYTES_PER_MB) * 1000.0).round() / 1000.0,
        }
    }
}
