//! Embedding provider abstraction plus the two providers shipped in-tree.
//!
//! The real model client lives outside this crate; callers plug it in through
//! [`EmbeddingProvider`]. `HashedBagProvider` gives deterministic vectors for
//! local runs and tests, `DisabledProvider` refuses every call.

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::tokenizer::tokenize;

#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text. Errors are reported to the semantic engine, which fails open.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
    /// Model id recorded on durable cache rows.
    fn model(&self) -> &str;
}

pub type DynProvider = Arc<dyn EmbeddingProvider>;

/// Feature-hashing bag-of-words embedder.
///
/// Each token is hashed with SHA-256; the first 8 bytes pick a bucket and the
/// next byte picks the sign. The vector is L2-normalized. Same text, same
/// vector, on every platform.
#[derive(Debug, Clone)]
pub struct HashedBagProvider {
    dims: usize,
    model: String,
}

impl HashedBagProvider {
    pub const DEFAULT_DIMS: usize = 256;

    pub fn new(dims: usize) -> Self {
        let dims = dims.max(1);
        Self {
            dims,
            model: format!("hashed-bag-{dims}"),
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let mut idx = [0u8; 8];
        idx.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(idx) % self.dims as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (bucket, sign)
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dims];
        for tok in tokenize(text) {
            let (b, s) = self.bucket(&tok);
            v[b] += s;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }
}

impl Default for HashedBagProvider {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMS)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashedBagProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn name(&self) -> &'static str {
        "hashed-bag"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Provider that always errors; used when no embedding backend is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledProvider;

#[async_trait::async_trait]
impl EmbeddingProvider for DisabledProvider {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("embedding provider disabled")
    }

    fn name(&self) -> &'static str {
        "disabled"
    }

    fn model(&self) -> &str {
        "none"
    }
}
