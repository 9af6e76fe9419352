//! Group-relative feature aggregation.
//!
//! All lexical and semantic sub-scores are computed against the pair's own
//! job group and min-max normalized within it, so a value of 0.8 means
//! "near the top of this pool", nothing more. Coverage is absolute but
//! Laplace-smoothed so a partial overlap is never mistaken for certainty.

use cvrank_core::traits::{dot, Embedder};
use cvrank_core::{CancelToken, CvId, FeatureVector, JdId, Pair, Result};
use cvrank_embed::{embed_cached, EmbeddingCache};
use cvrank_retrieval::{bm25_scores, minmax_normalize, weighted_query, Bm25Params};
use cvrank_text::normalize::tokenize;
use cvrank_text::{extract, ExtractorConfig, SkillIndex};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct FeatureParams {
    /// Full-text weight in `bm25_combo`.
    pub w_full: f32,
    /// Skills-only weight in `bm25_combo`.
    pub w_skills: f32,
    /// Coverage weight in `final_score`.
    pub w_skill: f32,
    /// Lexical-combo weight in `final_score`.
    pub w_lex: f32,
    /// Laplace smoothing for coverage.
    pub alpha: f32,
    pub beta: f32,
    pub bm25: Bm25Params,
    /// Integer boosts applied to full-text query terms; empty means every
    /// term weighs 1.
    pub term_weights: HashMap<String, u32>,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            w_full: 0.5,
            w_skills: 0.5,
            w_skill: 0.6,
            w_lex: 0.4,
            alpha: 1.0,
            beta: 1.0,
            bm25: Bm25Params::default(),
            term_weights: HashMap::new(),
        }
    }
}

/// Laplace-smoothed skill coverage. Exactly 0 when the job names no
/// skills: without a requirement there is nothing to cover.
pub fn skill_coverage(
    cv_skills: &BTreeSet<String>,
    jd_skills: &BTreeSet<String>,
    alpha: f32,
    beta: f32,
) -> f32 {
    if jd_skills.is_empty() {
        return 0.0;
    }
    let hit = cv_skills.intersection(jd_skills).count() as f32;
    (hit + alpha) / (jd_skills.len() as f32 + alpha + beta)
}

/// Builds the feature vectors for one job group.
///
/// The embedder is optional: without one (or when it fails) the semantic
/// column is all zeros and everything else still works.
pub fn build_group_features(
    jd_id: &JdId,
    jd_text: &str,
    candidates: &[(CvId, String)],
    index: &SkillIndex,
    embedder: Option<&dyn Embedder>,
    emb_cache: &EmbeddingCache,
    extractor: &ExtractorConfig,
    params: &FeatureParams,
) -> Vec<FeatureVector> {
    let jd_extraction = extract(jd_text, index, embedder, extractor);
    let jd_skills = jd_extraction.skill_names(index);
    let mut jd_tokens = tokenize(jd_text);
    if !params.term_weights.is_empty() {
        jd_tokens = weighted_query(&jd_tokens, &params.term_weights);
    }

    let cv_skills: Vec<BTreeSet<String>> = candidates
        .iter()
        .map(|(_, text)| extract(text, index, embedder, extractor).skill_names(index))
        .collect();
    let cv_tokens: Vec<Vec<String>> = candidates
        .iter()
        .map(|(_, text)| tokenize(text))
        .collect();

    let full_raw = bm25_scores(&cv_tokens, &jd_tokens, params.bm25);
    let full_norm = minmax_normalize(&full_raw);

    let skills_corpus: Vec<Vec<String>> = cv_skills
        .iter()
        .map(|s| s.iter().cloned().collect())
        .collect();
    let jd_skill_query: Vec<String> = jd_skills.iter().cloned().collect();
    let skills_raw = bm25_scores(&skills_corpus, &jd_skill_query, params.bm25);
    let skills_norm = minmax_normalize(&skills_raw);

    let emb_norm = semantic_similarity(jd_text, candidates, embedder, emb_cache);

    let w_combo = params.w_full + params.w_skills;
    let w_final = params.w_skill + params.w_lex;

    candidates
        .iter()
        .enumerate()
        .map(|(i, (cv_id, _))| {
            let coverage = skill_coverage(&cv_skills[i], &jd_skills, params.alpha, params.beta);
            let combo = if w_combo > 0.0 {
                (params.w_full * full_norm[i] + params.w_skills * skills_norm[i]) / w_combo
            } else {
                0.0
            };
            let final_score = if w_final > 0.0 {
                (params.w_skill * coverage + params.w_lex * combo) / w_final
            } else {
                0.0
            };
            FeatureVector {
                jd_id: jd_id.clone(),
                cv_id: cv_id.clone(),
                skill_coverage: coverage,
                bm25_full_norm: full_norm[i],
                bm25_skills_norm: skills_norm[i],
                bm25_combo: combo,
                emb_cosine_norm: emb_norm[i],
                final_score,
            }
        })
        .collect()
}

/// Group-normalized cosine similarity between the job text and each
/// resume, zero-filled when no embedder is available or it fails.
fn semantic_similarity(
    jd_text: &str,
    candidates: &[(CvId, String)],
    embedder: Option<&dyn Embedder>,
    emb_cache: &EmbeddingCache,
) -> Vec<f32> {
    let Some(embedder) = embedder else {
        return vec![0.0; candidates.len()];
    };

    let mut texts = Vec::with_capacity(candidates.len() + 1);
    texts.push(jd_text.to_string());
    texts.extend(candidates.iter().map(|(_, t)| t.clone()));

    match embed_cached(embedder, emb_cache, &texts) {
        Ok(vectors) => {
            let jd_vec = &vectors[0];
            let raw: Vec<f32> = vectors[1..].iter().map(|v| dot(jd_vec, v)).collect();
            minmax_normalize(&raw)
        }
        Err(e) => {
            warn!("semantic feature unavailable, zero-filling: {e}");
            vec![0.0; candidates.len()]
        }
    }
}

/// Builds features for many groups, e.g. to assemble a training set.
/// Checks the cancellation token between groups.
#[allow(clippy::too_many_arguments)]
pub fn build_features(
    pairs: &[Pair],
    index: &SkillIndex,
    embedder: Option<&dyn Embedder>,
    emb_cache: &EmbeddingCache,
    extractor: &ExtractorConfig,
    params: &FeatureParams,
    cancel: &CancelToken,
) -> Result<Vec<FeatureVector>> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_group: HashMap<&str, Vec<&Pair>> = HashMap::new();
    for pair in pairs {
        by_group
            .entry(pair.jd_id.as_str())
            .or_insert_with(|| {
                order.push(pair.jd_id.as_str());
                Vec::new()
            })
            .push(pair);
    }

    let mut out = Vec::with_capacity(pairs.len());
    for group in order {
        cancel.check()?;
        let members = &by_group[group];
        let jd_text = members[0].jd_text.as_str();
        let candidates: Vec<(CvId, String)> = members
            .iter()
            .map(|p| (p.cv_id.clone(), p.resume_text.clone()))
            .collect();
        out.extend(build_group_features(
            &group.to_string(),
            jd_text,
            &candidates,
            index,
            embedder,
            emb_cache,
            extractor,
            params,
        ));
    }
    Ok(out)
}
