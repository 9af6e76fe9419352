//! # cvrank-text
//!
//! Text-side of the matching pipeline: normalization and tokenization,
//! the canonical-skill vocabulary, the alias-automaton skill index, and
//! the tiered span extractor.

pub mod extract;
pub mod normalize;
pub mod skills;
pub mod vocab;

pub use extract::{extract, extract_batch, resolve_overlaps, Extraction, ExtractorConfig};
pub use skills::{CentroidCache, SkillIndex};
pub use vocab::{Skill, SkillVocabulary};
