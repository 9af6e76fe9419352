//! Traits at the seams between the core pipeline and its collaborators.

use crate::error::Result;

/// Black-box text-to-vector provider. Implementations must be deterministic
/// for identical input and return one `dim()`-length vector per text.
/// Callers batch texts per invocation; embedding is the dominant latency
/// cost, so one call with many texts beats many calls with one.
pub trait Embedder: Send + Sync {
    /// Stable identifier used in cache keys (model name or equivalent).
    fn id(&self) -> &str;

    fn dim(&self) -> usize;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// L2-normalize a vector in place. No-op on the zero vector.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Inner product; equals cosine similarity when both sides are unit-length.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
