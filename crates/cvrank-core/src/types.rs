//! Domain types shared by the extraction, scoring, and ranking crates.

use serde::{Deserialize, Serialize};

pub type JdId = String;
pub type CvId = String;

/// One (job, resume) pair — the unit of scoring. Pairs sharing a `jd_id`
/// form a job group, the unit over which relative scores are normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pair {
    pub jd_id: JdId,
    pub cv_id: CvId,
    pub jd_text: String,
    pub resume_text: String,
}

/// Which extraction tier produced a span. Exact outranks Fuzzy when
/// overlapping candidates compete for the same offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpanSource {
    Fuzzy,
    Exact,
}

/// A labeled substring of a normalized document naming a detected skill.
/// Offsets are byte offsets into the normalized text; `skill` indexes into
/// the skill index that produced the span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub skill: usize,
    pub source: SpanSource,
    pub confidence: f32,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Blended per-pair features. Every `*_norm` field is min-max normalized
/// within the pair's job group and is meaningless outside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    pub jd_id: JdId,
    pub cv_id: CvId,
    pub skill_coverage: f32,
    pub bm25_full_norm: f32,
    pub bm25_skills_norm: f32,
    pub bm25_combo: f32,
    pub emb_cosine_norm: f32,
    pub final_score: f32,
}

impl FeatureVector {
    /// Names of the model-facing feature columns, in `features()` order.
    pub const FEATURE_NAMES: [&'static str; 5] = [
        "skill_coverage",
        "bm25_full_norm",
        "bm25_skills_norm",
        "bm25_combo",
        "emb_cosine_norm",
    ];

    /// The model-facing feature columns. `final_score` is a blended
    /// diagnostic, not a model input.
    pub fn features(&self) -> [f32; 5] {
        [
            self.skill_coverage,
            self.bm25_full_norm,
            self.bm25_skills_norm,
            self.bm25_combo,
            self.emb_cosine_norm,
        ]
    }
}

/// One ranked entry within a job group, descending by `pred`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub jd_id: JdId,
    pub cv_id: CvId,
    pub pred: f32,
    pub rank: u32,
}

/// A candidate resume submitted for ranking. `cv_id` is derived from the
/// resume text when absent, so repeated submissions of identical text get
/// an idempotent identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub cv_id: Option<CvId>,
    pub resume_text: String,
}

/// A ranking request: one job against a slate of candidate resumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankRequest {
    #[serde(default)]
    pub job_requirement: String,
    #[serde(default)]
    pub job_description: String,
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub topk: Option<usize>,
}
