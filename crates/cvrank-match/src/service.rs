//! The matching service: vocabulary, model, and index lifecycles plus the
//! request-scoped ranking path.
//!
//! Mutable state lives in swap-on-publish cells. A ranking request only
//! ever sees complete snapshots of the skill index and the model; reloads
//! build replacements off-path and publish them whole.

use crate::features::{build_group_features, FeatureParams};
use cvrank_ann::AnnStore;
use cvrank_core::traits::Embedder;
use cvrank_core::{
    stable_hash_id, CvId, Error, FeatureVector, RankRequest, RankedResult, Result, SwapCell,
};
use cvrank_embed::{embed_cached, EmbeddingCache};
use cvrank_rank::Ranker;
use cvrank_text::{CentroidCache, ExtractorConfig, SkillIndex, SkillVocabulary};
use std::path::Path;
use tracing::{info, warn};

pub struct MatchService {
    skill_index: SwapCell<SkillIndex>,
    ranker: SwapCell<Ranker>,
    embedder: Option<Box<dyn Embedder>>,
    emb_cache: EmbeddingCache,
    centroid_cache: CentroidCache,
    ann: Option<AnnStore>,
    extractor: ExtractorConfig,
    features: FeatureParams,
}

impl MatchService {
    pub fn new(embedder: Option<Box<dyn Embedder>>) -> Self {
        Self {
            skill_index: SwapCell::empty(),
            ranker: SwapCell::empty(),
            embedder,
            emb_cache: EmbeddingCache::default(),
            centroid_cache: CentroidCache::new(64),
            ann: None,
            extractor: ExtractorConfig::default(),
            features: FeatureParams::default(),
        }
    }

    pub fn with_ann(mut self, ann: AnnStore) -> Self {
        self.ann = Some(ann);
        self
    }

    pub fn with_extractor(mut self, extractor: ExtractorConfig) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_features(mut self, features: FeatureParams) -> Self {
        self.features = features;
        self
    }

    /// Builds a fresh skill index from the vocabulary and publishes it
    /// whole. Centroids are embedded when a provider is available, so the
    /// fuzzy tier comes up with the index.
    pub fn load_vocabulary(&self, vocab: SkillVocabulary) -> Result<()> {
        let mut index = SkillIndex::build(vocab)?;
        if let Some(embedder) = self.embedder.as_deref() {
            if let Err(e) = index.embed(embedder, &self.centroid_cache) {
                warn!("skill centroids unavailable, fuzzy tier disabled: {e}");
            }
        }
        info!(skills = index.num_skills(), "published skill index");
        self.skill_index.publish(index);
        Ok(())
    }

    /// Loads a serialized ranking model and swaps it in atomically.
    pub fn reload_model(&self, dir: &Path) -> Result<()> {
        let ranker = Ranker::load(dir)?;
        self.ranker.publish(ranker);
        Ok(())
    }

    /// Publishes an in-process model, e.g. straight after training.
    pub fn publish_model(&self, ranker: Ranker) {
        self.ranker.publish(ranker);
    }

    pub fn is_ready(&self) -> bool {
        self.skill_index.is_published() && self.ranker.is_published()
    }

    /// Scores and ranks one request. A single-candidate request returns an
    /// empty ranking: with nothing to compare against, every group-relative
    /// feature degenerates and a score would be fabricated.
    pub fn rank(&self, request: &RankRequest) -> Result<Vec<RankedResult>> {
        let vectors = self.score(request)?;
        if vectors.is_empty() {
            return Ok(Vec::new());
        }
        let ranker = self.ranker.load().ok_or(Error::ModelNotReady)?;
        ranker.rank(&vectors, request.topk)
    }

    /// Computes feature vectors for a request without ranking them, for
    /// diagnostics and training-set assembly.
    pub fn score(&self, request: &RankRequest) -> Result<Vec<FeatureVector>> {
        let index = self
            .skill_index
            .load()
            .ok_or_else(|| Error::Config("skill vocabulary not loaded".into()))?;

        let jd_text = merge_jd_text(&request.job_requirement, &request.job_description);
        let jd_id = stable_hash_id(&jd_text, "jd-");

        let candidates: Vec<(CvId, String)> = request
            .candidates
            .iter()
            .map(|c| {
                let id = c
                    .cv_id
                    .clone()
                    .unwrap_or_else(|| stable_hash_id(&c.resume_text, "cv-"));
                (id, c.resume_text.clone())
            })
            .collect();

        if candidates.len() < 2 {
            info!(
                jd = %jd_id,
                candidates = candidates.len(),
                "group too small to rank, returning empty result"
            );
            return Ok(Vec::new());
        }

        Ok(build_group_features(
            &jd_id,
            &jd_text,
            &candidates,
            &index,
            self.embedder.as_deref(),
            &self.emb_cache,
            &self.extractor,
            &self.features,
        ))
    }

    /// Embeds a resume and appends it to the ANN index. The returned id is
    /// derived from the text when not supplied, so re-upserting identical
    /// text is idempotent at the identity level.
    pub fn upsert_resume(&self, cv_id: Option<CvId>, resume_text: &str) -> Result<CvId> {
        let embedder = self
            .embedder
            .as_deref()
            .ok_or_else(|| Error::EmbeddingUnavailable("no provider configured".into()))?;
        let ann = self.ann.as_ref().ok_or(Error::IndexNotLoaded)?;

        let id = cv_id.unwrap_or_else(|| stable_hash_id(resume_text, "cv-"));
        let vectors = embed_cached(embedder, &self.emb_cache, &[resume_text.to_string()])?;
        ann.add(vec![id.clone()], vectors)?;
        Ok(id)
    }

    /// Coarse top-n candidates for a job by embedding similarity, for
    /// narrowing a large corpus before exact ranking.
    pub fn shortlist(&self, jd_text: &str, n: usize) -> Result<Vec<(CvId, f32)>> {
        let embedder = self
            .embedder
            .as_deref()
            .ok_or_else(|| Error::EmbeddingUnavailable("no provider configured".into()))?;
        let ann = self.ann.as_ref().ok_or(Error::IndexNotLoaded)?;

        let query = embed_cached(embedder, &self.emb_cache, &[jd_text.to_string()])?;
        let mut hits = ann.search(&query, n)?;
        Ok(hits.pop().unwrap_or_default())
    }
}

/// Requirement and description joined with a blank line; either side may
/// be empty.
fn merge_jd_text(requirement: &str, description: &str) -> String {
    match (requirement.trim(), description.trim()) {
        (r, "") => r.to_string(),
        ("", d) => d.to_string(),
        (r, d) => format!("{r}\n\n{d}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jd_text_merge_skips_empty_sides() {
        assert_eq!(merge_jd_text("need rust", ""), "need rust");
        assert_eq!(merge_jd_text("", "long text"), "long text");
        assert_eq!(merge_jd_text("a", "b"), "a\n\nb");
    }
}
