//! Skill index: alias automaton plus optional embedding centroids.
//!
//! Built wholesale from a [`SkillVocabulary`] at startup or reload; never
//! mutated in place. The automaton is a single leftmost-longest
//! Aho-Corasick alternation over every alias of every skill, matched
//! case-insensitively with word-boundary guards applied at the edges.

use aho_corasick::{AhoCorasick, MatchKind};
use cvrank_core::traits::{l2_normalize, Embedder};
use cvrank_core::{Error, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::vocab::SkillVocabulary;

pub struct SkillIndex {
    vocab: SkillVocabulary,
    automaton: AhoCorasick,
    /// pattern index → skill index
    pattern_skill: Vec<usize>,
    /// lower-cased alias strings, for filtering fuzzy candidates
    alias_set: HashSet<String>,
    /// blake3 hash over the full alias set, part of the centroid cache key
    alias_hash: String,
    /// one unit-length centroid per canonical skill, when embedded
    centroids: Option<Vec<Vec<f32>>>,
}

impl SkillIndex {
    pub fn build(vocab: SkillVocabulary) -> Result<Self> {
        let mut patterns: Vec<String> = Vec::new();
        let mut pattern_skill = Vec::new();
        let mut alias_set = HashSet::new();
        for (skill_idx, skill) in vocab.skills.iter().enumerate() {
            for alias in &skill.aliases {
                let lowered = alias.to_lowercase();
                alias_set.insert(lowered.clone());
                patterns.push(lowered);
                pattern_skill.push(skill_idx);
            }
        }
        if patterns.is_empty() {
            return Err(Error::Config("skill vocabulary has no aliases".into()));
        }
        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::LeftmostLongest)
            .build(&patterns)
            .map_err(|e| Error::Config(format!("failed to build alias automaton: {e}")))?;

        let mut hasher = blake3::Hasher::new();
        for skill in &vocab.skills {
            hasher.update(skill.canonical.as_bytes());
            for alias in &skill.aliases {
                hasher.update(b"|");
                hasher.update(alias.to_lowercase().as_bytes());
            }
            hasher.update(b"\n");
        }
        let alias_hash = hasher.finalize().to_hex().to_string();

        Ok(Self {
            vocab,
            automaton,
            pattern_skill,
            alias_set,
            alias_hash,
            centroids: None,
        })
    }

    pub fn vocab(&self) -> &SkillVocabulary {
        &self.vocab
    }

    pub fn automaton(&self) -> &AhoCorasick {
        &self.automaton
    }

    pub fn skill_for_pattern(&self, pattern: usize) -> usize {
        self.pattern_skill[pattern]
    }

    pub fn canonical_name(&self, skill: usize) -> &str {
        &self.vocab.skills[skill].canonical
    }

    pub fn num_skills(&self) -> usize {
        self.vocab.skills.len()
    }

    pub fn is_known_alias(&self, candidate: &str) -> bool {
        self.alias_set.contains(candidate)
    }

    pub fn alias_hash(&self) -> &str {
        &self.alias_hash
    }

    pub fn centroids(&self) -> Option<&[Vec<f32>]> {
        self.centroids.as_deref()
    }

    /// Compute one centroid per canonical skill: the L2-normalized mean of
    /// its alias embeddings. Expensive, so results are cached by
    /// `(provider id, alias-set hash)`.
    pub fn embed(&mut self, embedder: &dyn Embedder, cache: &CentroidCache) -> Result<()> {
        let key = (embedder.id().to_string(), self.alias_hash.clone());
        if let Some(hit) = cache.get(&key) {
            tracing::debug!("centroid cache hit for {}", embedder.id());
            self.centroids = Some(hit.as_ref().clone());
            return Ok(());
        }

        let flat: Vec<String> = self
            .vocab
            .skills
            .iter()
            .flat_map(|s| s.aliases.iter().map(|a| a.to_lowercase()))
            .collect();
        let embeddings = embedder.embed_batch(&flat)?;
        let dim = embedder.dim();

        let mut centroids = Vec::with_capacity(self.vocab.skills.len());
        let mut offset = 0usize;
        for skill in &self.vocab.skills {
            let k = skill.aliases.len();
            let mut mean = vec![0.0f32; dim];
            for row in &embeddings[offset..offset + k] {
                for (m, v) in mean.iter_mut().zip(row.iter()) {
                    *m += v;
                }
            }
            for m in mean.iter_mut() {
                *m /= k as f32;
            }
            l2_normalize(&mut mean);
            centroids.push(mean);
            offset += k;
        }

        cache.put(key, Arc::new(centroids.clone()));
        self.centroids = Some(centroids);
        Ok(())
    }
}

impl std::fmt::Debug for SkillIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillIndex")
            .field("skills", &self.vocab.skills.len())
            .field("patterns", &self.pattern_skill.len())
            .field("embedded", &self.centroids.is_some())
            .finish()
    }
}

type CentroidKey = (String, String);

/// Bounded process-wide cache of per-vocabulary centroid matrices, keyed by
/// `(provider id, alias-set hash)`. Insertion-order eviction; read-through.
pub struct CentroidCache {
    capacity: usize,
    inner: Mutex<(Vec<CentroidKey>, HashMap<CentroidKey, Arc<Vec<Vec<f32>>>>)>,
}

impl CentroidCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new((Vec::new(), HashMap::new())),
        }
    }

    fn get(&self, key: &CentroidKey) -> Option<Arc<Vec<Vec<f32>>>> {
        self.inner.lock().1.get(key).cloned()
    }

    fn put(&self, key: CentroidKey, value: Arc<Vec<Vec<f32>>>) {
        let mut guard = self.inner.lock();
        let (order, map) = &mut *guard;
        if map.insert(key.clone(), value).is_none() {
            order.push(key);
            if order.len() > self.capacity {
                let evicted = order.remove(0);
                map.remove(&evicted);
            }
        }
    }
}

impl Default for CentroidCache {
    fn default() -> Self {
        Self::new(4)
    }
}
