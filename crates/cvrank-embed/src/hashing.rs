//! Deterministic hashing embedder.
//!
//! Buckets tokens into a fixed-width vector by xxHash and L2-normalizes.
//! No model files, fully deterministic, and token overlap translates into
//! cosine similarity — enough for tests and offline runs where the real
//! encoder is unavailable.

use cvrank_core::traits::{l2_normalize, Embedder};
use cvrank_core::Result;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

pub struct HashingEmbedder {
    dim: usize,
    id: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, id: format!("hashing-{dim}") }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl Embedder for HashingEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let mut v = vec![0f32; self.dim];
            for token in text.to_lowercase().split_whitespace() {
                let mut hasher = XxHash64::with_seed(0);
                token.hash(&mut hasher);
                let h = hasher.finish();
                let idx = (h as usize) % self.dim;
                let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
                v[idx] += 0.5 + val;
            }
            l2_normalize(&mut v);
            out.push(v);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvrank_core::traits::dot;

    #[test]
    fn deterministic_and_unit_length() {
        let embedder = HashingEmbedder::default();
        let texts = vec!["docker kubernetes".to_string(), "docker kubernetes".to_string()];
        let embs = embedder.embed_batch(&texts).expect("embed");
        assert_eq!(embs[0].len(), 384);
        let norm: f32 = embs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
        assert!((dot(&embs[0], &embs[1]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn token_overlap_beats_disjoint_text() {
        let embedder = HashingEmbedder::default();
        let embs = embedder
            .embed_batch(&[
                "python docker aws".to_string(),
                "python docker gcp".to_string(),
                "violin orchestra".to_string(),
            ])
            .expect("embed");
        let close = dot(&embs[0], &embs[1]);
        let far = dot(&embs[0], &embs[2]);
        assert!(close > far, "shared tokens should score higher ({close} vs {far})");
    }
}
