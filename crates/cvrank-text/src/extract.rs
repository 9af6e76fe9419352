//! Tiered skill-span extraction.
//!
//! Tier 1 matches aliases exactly through the index automaton. Tier 2
//! embeds n-gram windows of the remaining text and compares them against
//! canonical centroids. Overlapping candidates are then resolved into a
//! non-overlapping span set by a fixed, deterministic precedence.
//!
//! Extraction is a pure function of (text, index, embedder); a failing
//! embedding provider degrades the result to exact-tier-only, it never
//! fails the call.

use cvrank_core::cancel::CancelToken;
use cvrank_core::traits::{dot, Embedder};
use cvrank_core::types::{Span, SpanSource};
use cvrank_core::Result;
use std::collections::BTreeSet;

use crate::normalize::{clean_text, token_spans, Token};
use crate::skills::SkillIndex;

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Minimum cosine similarity for a fuzzy window to count as a skill.
    pub fuzzy_threshold: f32,
    /// Longest n-gram window, capped at 4.
    pub max_alias_len: usize,
    pub use_fuzzy: bool,
    /// Cap on distinct fuzzy candidate strings embedded per document.
    pub max_fuzzy_candidates: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.70,
            max_alias_len: 4,
            use_fuzzy: true,
            max_fuzzy_candidates: 500,
        }
    }
}

/// The result of extracting one document. Span offsets index into
/// `normalized`, not the raw input.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub normalized: String,
    pub spans: Vec<Span>,
}

impl Extraction {
    /// Distinct canonical skill names, sorted for determinism.
    pub fn skill_names(&self, index: &SkillIndex) -> BTreeSet<String> {
        self.spans
            .iter()
            .map(|s| index.canonical_name(s.skill).to_string())
            .collect()
    }
}

/// Extract the skills present in `raw`. Empty or whitespace-only input
/// yields an empty span set.
pub fn extract(
    raw: &str,
    index: &SkillIndex,
    embedder: Option<&dyn Embedder>,
    cfg: &ExtractorConfig,
) -> Extraction {
    let normalized = clean_text(raw);
    if normalized.is_empty() {
        return Extraction { normalized, spans: Vec::new() };
    }

    let mut candidates = exact_tier(&normalized, index);

    if cfg.use_fuzzy {
        if let (Some(embedder), Some(centroids)) = (embedder, index.centroids()) {
            match fuzzy_tier(&normalized, index, embedder, centroids, &candidates, cfg) {
                Ok(mut fuzzy) => candidates.append(&mut fuzzy),
                Err(e) => {
                    tracing::warn!("fuzzy tier unavailable, keeping exact matches only: {e}");
                }
            }
        }
    }

    let spans = resolve_overlaps(candidates);
    Extraction { normalized, spans }
}

/// Extract a batch of documents, checking the cancellation token between
/// documents.
pub fn extract_batch(
    texts: &[String],
    index: &SkillIndex,
    embedder: Option<&dyn Embedder>,
    cfg: &ExtractorConfig,
    cancel: &CancelToken,
) -> Result<Vec<Extraction>> {
    let mut out = Vec::with_capacity(texts.len());
    for text in texts {
        cancel.check()?;
        out.push(extract(text, index, embedder, cfg));
    }
    Ok(out)
}

fn exact_tier(normalized: &str, index: &SkillIndex) -> Vec<Span> {
    let bytes = normalized.as_bytes();
    index
        .automaton()
        .find_iter(normalized)
        .filter(|m| word_bounded(bytes, m.start(), m.end()))
        .map(|m| Span {
            start: m.start(),
            end: m.end(),
            skill: index.skill_for_pattern(m.pattern().as_usize()),
            source: SpanSource::Exact,
            confidence: 1.0,
        })
        .collect()
}

/// Word-boundary guard: an alias occurrence does not count when glued to
/// an alphanumeric or underscore on either side (`java` inside
/// `javascript`), while punctuation-edged aliases like `c++` still match.
fn word_bounded(bytes: &[u8], start: usize, end: usize) -> bool {
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    let before_ok = start == 0 || !is_word(bytes[start - 1]);
    let after_ok = end == bytes.len() || !is_word(bytes[end]);
    before_ok && after_ok
}

fn fuzzy_tier(
    normalized: &str,
    index: &SkillIndex,
    embedder: &dyn Embedder,
    centroids: &[Vec<f32>],
    exact: &[Span],
    cfg: &ExtractorConfig,
) -> Result<Vec<Span>> {
    let tokens = token_spans(normalized);
    let windows = candidate_windows(normalized, &tokens, index, exact, cfg);
    if windows.is_empty() {
        return Ok(Vec::new());
    }

    // one embedding per distinct candidate string
    let mut unique_texts: Vec<String> = Vec::new();
    let mut text_slot: Vec<usize> = Vec::with_capacity(windows.len());
    for w in &windows {
        match unique_texts.iter().position(|t| t == &w.text) {
            Some(i) => text_slot.push(i),
            None => {
                text_slot.push(unique_texts.len());
                unique_texts.push(w.text.clone());
            }
        }
    }
    let embeddings = embedder.embed_batch(&unique_texts)?;

    let mut spans = Vec::new();
    for (w, &slot) in windows.iter().zip(text_slot.iter()) {
        let vec = &embeddings[slot];
        let mut best_skill = 0usize;
        let mut best_sim = f32::MIN;
        for (skill, centroid) in centroids.iter().enumerate() {
            let sim = dot(vec, centroid);
            if sim > best_sim {
                best_sim = sim;
                best_skill = skill;
            }
        }
        if best_sim >= cfg.fuzzy_threshold {
            spans.push(Span {
                start: w.start,
                end: w.end,
                skill: best_skill,
                source: SpanSource::Fuzzy,
                confidence: best_sim.min(1.0),
            });
        }
    }
    Ok(spans)
}

struct Window {
    start: usize,
    end: usize,
    text: String,
}

fn candidate_windows(
    normalized: &str,
    tokens: &[Token],
    index: &SkillIndex,
    exact: &[Span],
    cfg: &ExtractorConfig,
) -> Vec<Window> {
    let max_n = cfg.max_alias_len.clamp(1, 4);
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut windows = Vec::new();
    'outer: for n in 1..=max_n {
        for i in 0..tokens.len().saturating_sub(n - 1) {
            let slice = &tokens[i..i + n];
            if slice.iter().all(Token::is_stop) || slice.iter().all(Token::is_numeric) {
                continue;
            }
            let (start, end) = (slice[0].start, slice[n - 1].end);
            let text = &normalized[start..end];
            if text.len() < 2 || text.len() > 64 {
                continue;
            }
            // exact aliases are tier-1 territory, covered spans already won
            if index.is_known_alias(text) {
                continue;
            }
            if exact.iter().any(|s| s.start <= start && end <= s.end) {
                continue;
            }
            if !seen.insert(text.to_string()) {
                continue;
            }
            windows.push(Window { start, end, text: text.to_string() });
            if seen.len() >= cfg.max_fuzzy_candidates {
                break 'outer;
            }
        }
    }
    windows
}

/// Resolve overlapping candidates into a non-overlapping accepted set.
/// Precedence: source rank (Exact > Fuzzy), then span length, then
/// confidence; ties fall to the leftmost start. Pure function, stable.
pub fn resolve_overlaps(mut candidates: Vec<Span>) -> Vec<Span> {
    candidates.sort_by(|a, b| {
        b.source
            .cmp(&a.source)
            .then_with(|| b.len().cmp(&a.len()))
            .then_with(|| b.confidence.total_cmp(&a.confidence))
            .then_with(|| a.start.cmp(&b.start))
    });

    let mut accepted: Vec<Span> = Vec::new();
    for candidate in candidates {
        if !accepted.iter().any(|a| a.overlaps(&candidate)) {
            accepted.push(candidate);
        }
    }
    accepted.sort_by_key(|s| s.start);
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::SkillIndex;
    use crate::vocab::{Skill, SkillVocabulary};

    fn index() -> SkillIndex {
        let vocab = SkillVocabulary {
            skills: vec![
                Skill {
                    canonical: "python".into(),
                    aliases: vec!["Python".into(), "python3".into()],
                },
                Skill {
                    canonical: "fastapi".into(),
                    aliases: vec!["FastAPI".into(), "fast api".into()],
                },
                Skill { canonical: "java".into(), aliases: vec!["Java".into()] },
                Skill {
                    canonical: "javascript".into(),
                    aliases: vec!["JavaScript".into()],
                },
            ],
        };
        SkillIndex::build(vocab).expect("index")
    }

    fn exact(raw: &str) -> Extraction {
        extract(raw, &index(), None, &ExtractorConfig::default())
    }

    #[test]
    fn exact_matches_regardless_of_case_and_spacing() {
        let ex = exact("Experienced in PYTHON3 and Fast   API");
        let names = ex.skill_names(&index());
        assert!(names.contains("python"));
        assert!(names.contains("fastapi"));
    }

    #[test]
    fn word_boundaries_block_substring_matches() {
        let ex = exact("JavaScript only, no JVM here");
        let names = ex.skill_names(&index());
        assert!(names.contains("javascript"));
        assert!(!names.contains("java"), "java must not match inside javascript");
    }

    #[test]
    fn spans_are_pairwise_non_overlapping() {
        let ex = exact("python python3 fast api fastapi java javascript");
        for (i, a) in ex.spans.iter().enumerate() {
            for b in &ex.spans[i + 1..] {
                assert!(!a.overlaps(b), "spans {a:?} and {b:?} overlap");
            }
        }
    }

    #[test]
    fn empty_input_yields_no_spans() {
        let ex = exact("   \n\t  ");
        assert!(ex.spans.is_empty());
    }

    #[test]
    fn overlap_resolution_prefers_exact_then_longer() {
        let candidates = vec![
            Span { start: 0, end: 6, skill: 0, source: SpanSource::Fuzzy, confidence: 0.99 },
            Span { start: 0, end: 10, skill: 1, source: SpanSource::Exact, confidence: 1.0 },
            Span { start: 12, end: 16, skill: 2, source: SpanSource::Fuzzy, confidence: 0.8 },
            Span { start: 12, end: 20, skill: 3, source: SpanSource::Fuzzy, confidence: 0.75 },
        ];
        let accepted = resolve_overlaps(candidates);
        assert_eq!(accepted.len(), 2);
        assert_eq!(accepted[0].skill, 1, "exact span wins the first overlap");
        assert_eq!(accepted[1].skill, 3, "longer fuzzy span wins the second");
    }

    #[test]
    fn overlap_resolution_tie_breaks_by_confidence_then_start() {
        let candidates = vec![
            Span { start: 4, end: 8, skill: 0, source: SpanSource::Fuzzy, confidence: 0.9 },
            Span { start: 6, end: 10, skill: 1, source: SpanSource::Fuzzy, confidence: 0.7 },
        ];
        let accepted = resolve_overlaps(candidates);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].skill, 0);
    }

    #[test]
    fn batch_extraction_respects_cancellation() {
        let token = CancelToken::new();
        token.cancel();
        let texts = vec!["python".to_string(); 3];
        let err = extract_batch(&texts, &index(), None, &ExtractorConfig::default(), &token);
        assert!(err.is_err());
    }
}
