//! Group-relative lexical retrieval features.
//!
//! BM25 is computed per candidate pool rather than against a shared index,
//! then min-max normalized within the pool so the learning-to-rank model
//! sees scores on a common `[0, 1]` scale regardless of pool size or
//! vocabulary.

pub mod bm25;
pub mod norm;

use std::collections::BTreeSet;

pub use bm25::{bm25_scores, weighted_query, Bm25Params};
pub use norm::minmax_normalize;

/// Full-text BM25 for one candidate pool, min-max normalized.
///
/// `corpus` holds each resume's tokens, `query` the job description's.
pub fn bm25_full_norm(corpus: &[Vec<String>], query: &[String], params: Bm25Params) -> Vec<f32> {
    minmax_normalize(&bm25_scores(corpus, query, params))
}

/// Skills-only BM25 for one candidate pool, min-max normalized.
///
/// Each extracted skill name acts as a single token, so multi-word skills
/// like "machine learning" match as a unit instead of by word overlap.
pub fn bm25_skills_norm(
    cv_skills: &[BTreeSet<String>],
    jd_skills: &BTreeSet<String>,
    params: Bm25Params,
) -> Vec<f32> {
    let corpus: Vec<Vec<String>> = cv_skills
        .iter()
        .map(|s| s.iter().cloned().collect())
        .collect();
    let query: Vec<String> = jd_skills.iter().cloned().collect();
    minmax_normalize(&bm25_scores(&corpus, &query, params))
}
