//! BM25 Okapi scoring over small ad-hoc corpora.
//!
//! Each job posting's candidate pool is its own mini-corpus: document
//! frequencies, average length, and therefore every idf value are computed
//! from the resumes competing for that one posting, never from a global
//! index. This keeps scores comparable only within a group, which is all
//! the downstream features need.

use std::collections::HashMap;

/// BM25 Okapi parameters.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// Scores every document in `corpus` against `query` with BM25 Okapi.
///
/// Returns one raw score per document, in corpus order. A corpus of zero
/// or one documents yields all-zero scores: idf is meaningless without at
/// least two documents to discriminate between.
pub fn bm25_scores(corpus: &[Vec<String>], query: &[String], params: Bm25Params) -> Vec<f32> {
    let n_docs = corpus.len();
    if n_docs <= 1 || query.is_empty() {
        return vec![0.0; n_docs];
    }

    let doc_lengths: Vec<f32> = corpus.iter().map(|d| d.len() as f32).collect();
    let total_len: f32 = doc_lengths.iter().sum();
    let avgdl = if total_len > 0.0 {
        total_len / n_docs as f32
    } else {
        return vec![0.0; n_docs];
    };

    // Document frequency per term, counted once per document.
    let mut df: HashMap<&str, f32> = HashMap::new();
    for doc in corpus {
        let mut seen: HashMap<&str, ()> = HashMap::with_capacity(doc.len());
        for term in doc {
            if seen.insert(term.as_str(), ()).is_none() {
                *df.entry(term.as_str()).or_insert(0.0) += 1.0;
            }
        }
    }

    let n = n_docs as f32;
    let Bm25Params { k1, b } = params;
    let mut scores = vec![0.0f32; n_docs];

    for term in query {
        let Some(&term_df) = df.get(term.as_str()) else {
            continue;
        };
        // IDF: log((N - df + 0.5) / (df + 0.5) + 1)
        let idf = ((n - term_df + 0.5) / (term_df + 0.5) + 1.0).ln();

        for (i, doc) in corpus.iter().enumerate() {
            let tf = doc.iter().filter(|t| t.as_str() == term.as_str()).count() as f32;
            if tf == 0.0 {
                continue;
            }
            let dl = doc_lengths[i];
            let tf_norm = (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * dl / avgdl));
            scores[i] += idf * tf_norm;
        }
    }

    scores
}

/// Expands a query by repeating each term according to an integer weight.
///
/// Terms absent from `weights` keep weight 1; weights of 0 drop the term.
/// Repetition raises a term's tf contribution without changing the BM25
/// formula itself.
pub fn weighted_query(query: &[String], weights: &HashMap<String, u32>) -> Vec<String> {
    let mut out = Vec::with_capacity(query.len());
    for term in query {
        let w = weights.get(term.as_str()).copied().unwrap_or(1);
        for _ in 0..w {
            out.push(term.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|d| d.iter().map(|t| t.to_string()).collect())
            .collect()
    }

    fn query(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn singleton_corpus_scores_zero() {
        let corpus = docs(&[&["python", "developer"]]);
        let scores = bm25_scores(&corpus, &query(&["python"]), Bm25Params::default());
        assert_eq!(scores, vec![0.0]);
    }

    #[test]
    fn empty_corpus_scores_empty() {
        let scores = bm25_scores(&[], &query(&["python"]), Bm25Params::default());
        assert!(scores.is_empty());
    }

    #[test]
    fn matching_doc_outscores_non_matching() {
        let corpus = docs(&[
            &["python", "django", "postgres"],
            &["java", "spring", "oracle"],
            &["python", "flask"],
        ]);
        let scores = bm25_scores(&corpus, &query(&["python"]), Bm25Params::default());
        assert!(scores[0] > 0.0);
        assert_eq!(scores[1], 0.0);
        assert!(scores[2] > 0.0);
        // Shorter matching doc gets the higher normalized tf.
        assert!(scores[2] > scores[0]);
    }

    #[test]
    fn idf_is_positive_even_for_ubiquitous_terms() {
        // The +1 inside the log keeps idf non-negative when df == N.
        let corpus = docs(&[&["rust"], &["rust"], &["rust"]]);
        let scores = bm25_scores(&corpus, &query(&["rust"]), Bm25Params::default());
        for s in scores {
            assert!(s > 0.0);
        }
    }

    #[test]
    fn weighted_query_repeats_terms() {
        let q = query(&["python", "sql"]);
        let mut w = HashMap::new();
        w.insert("python".to_string(), 3u32);
        w.insert("sql".to_string(), 0u32);
        let expanded = weighted_query(&q, &w);
        assert_eq!(expanded, vec!["python", "python", "python"]);
    }
}
