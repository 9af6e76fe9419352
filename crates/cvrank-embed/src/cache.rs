//! Bounded embedding cache keyed by `(provider id, content hash)`.
//!
//! Consulted read-through: a cold cache never blocks correctness, it just
//! costs a provider call. Eviction is insertion-order, so long-running
//! services cannot grow without bound. Injected as a dependency rather
//! than hidden global state, so tests stay isolated.

use cvrank_core::ids::content_hash;
use cvrank_core::traits::Embedder;
use cvrank_core::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;

pub struct EmbeddingCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    order: Vec<String>,
    map: HashMap<String, Vec<f32>>,
    hits: u64,
    misses: u64,
}

impl EmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), inner: Mutex::new(CacheInner::default()) }
    }

    fn key(provider_id: &str, text: &str) -> String {
        format!("{provider_id}|{}", content_hash(text))
    }

    pub fn get(&self, provider_id: &str, text: &str) -> Option<Vec<f32>> {
        let mut inner = self.inner.lock();
        match inner.map.get(&Self::key(provider_id, text)).cloned() {
            Some(v) => {
                inner.hits += 1;
                Some(v)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    pub fn put(&self, provider_id: &str, text: &str, vector: Vec<f32>) {
        let key = Self::key(provider_id, text);
        let mut inner = self.inner.lock();
        if inner.map.insert(key.clone(), vector).is_none() {
            inner.order.push(key);
            if inner.order.len() > self.capacity {
                let evicted = inner.order.remove(0);
                inner.map.remove(&evicted);
            }
        }
    }

    pub fn stats(&self) -> (u64, u64) {
        let inner = self.inner.lock();
        (inner.hits, inner.misses)
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(4096)
    }
}

/// Embed `texts`, serving repeats and previously-seen content from the
/// cache and batching the misses into one provider call.
pub fn embed_cached(
    embedder: &dyn Embedder,
    cache: &EmbeddingCache,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let mut out: Vec<Option<Vec<f32>>> = texts
        .iter()
        .map(|t| cache.get(embedder.id(), t))
        .collect();

    let miss_idx: Vec<usize> = (0..texts.len()).filter(|&i| out[i].is_none()).collect();
    if !miss_idx.is_empty() {
        let miss_texts: Vec<String> = miss_idx.iter().map(|&i| texts[i].clone()).collect();
        let vectors = embedder.embed_batch(&miss_texts)?;
        if vectors.len() != miss_texts.len() {
            return Err(Error::EmbeddingUnavailable(format!(
                "provider {} returned {} vectors for {} texts",
                embedder.id(),
                vectors.len(),
                miss_texts.len()
            )));
        }
        for (&i, vector) in miss_idx.iter().zip(vectors.into_iter()) {
            cache.put(embedder.id(), &texts[i], vector.clone());
            out[i] = Some(vector);
        }
    }

    // Every slot was either a cache hit or filled from the batch above.
    Ok(out.into_iter().map(|v| v.unwrap_or_default()).collect())
}
