//! # cvrank-embed
//!
//! Embedding providers behind the [`cvrank_core::traits::Embedder`] seam:
//! a candle-backed local transformer encoder and a deterministic hashing
//! embedder for tests and offline use, plus the bounded content-hash
//! embedding cache.

pub mod cache;
pub mod hashing;
pub mod local;
pub mod pool;

pub use cache::{embed_cached, EmbeddingCache};
pub use hashing::HashingEmbedder;
pub use local::LocalModelEmbedder;

use cvrank_core::traits::Embedder;
use cvrank_core::Result;

/// Default provider selection: the hashing embedder when
/// `CVRANK_USE_FAKE_EMBEDDINGS` is set (or truthy), otherwise the local
/// candle encoder resolved from `CVRANK_MODEL_DIR`.
pub fn get_default_embedder() -> Result<Box<dyn Embedder>> {
    let use_fake = std::env::var("CVRANK_USE_FAKE_EMBEDDINGS")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if use_fake {
        tracing::info!("using hashing embedder (CVRANK_USE_FAKE_EMBEDDINGS)");
        return Ok(Box::new(HashingEmbedder::default()));
    }
    Ok(Box::new(LocalModelEmbedder::new()?))
}
