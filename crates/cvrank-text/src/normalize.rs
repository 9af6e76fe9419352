//! Text canonicalization and tokenization.
//!
//! Raw job descriptions and resumes arrive as arbitrary UTF-8, frequently
//! with markup, links, and inconsistent casing. Everything downstream
//! (alias matching, BM25, embeddings) operates on the output of
//! [`clean_text`], so offsets inside extracted spans refer to the
//! normalized text, not the raw input.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag regex"));
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://\S+|www\.\S+").expect("url regex"));
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email regex")
});
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("ws regex"));
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9][a-z0-9+._/#-]*").expect("token regex"));

/// Canonical replacements applied after lowercasing, so common synonym
/// spellings collapse to one form before alias matching.
static CANON_REPLACEMENTS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\bk8s\b", "kubernetes"),
        (r"\bgolang\b", "go"),
        (r"\bci/?cd\b", "ci cd"),
        (r"\bnode\.?js\b", "node.js"),
        (r"\breact\.?js\b", "react.js"),
        (r"\bnext\.?js\b", "next.js"),
    ]
    .iter()
    .map(|(pat, rep)| (Regex::new(pat).expect("replacement regex"), *rep))
    .collect()
});

/// English stop list: function words plus CV/JD boilerplate and calendar
/// terms that carry no matching signal.
pub static EN_STOP: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        // base function words
        "the", "a", "an", "and", "or", "in", "on", "for", "of", "to", "with", "at", "as", "by",
        "is", "are", "was", "were", "be", "been", "being", "this", "that", "these", "those",
        "from", "into", "within", "via", "using", "use", "it", "we", "you", "they", "our",
        "their", "your", "i", "he", "she", "his", "her", "them", "me", "my", "us", "also",
        // cv/jd common noise
        "responsible", "responsibilities", "experienced", "experience", "experiences",
        "familiar", "knowledge", "skills", "skill", "ability", "abilities", "proficient",
        "expert", "strong", "good", "excellent", "great", "working", "work", "worked", "team",
        "teams", "environment", "environments", "company", "companies", "project", "projects",
        "role", "roles", "tasks", "task", "duties", "duty", "objective", "objectives",
        "summary", "description", "descriptions", "requirement", "requirements", "preferred",
        "plus", "nice", "including", "etc", "etc.", "eg", "e.g", "ie", "i.e", "based", "per",
        "performs", "perform", "performing", "developing", "develop", "developed", "build",
        "building", "built", "design", "designing", "designed", "implement", "implementation",
        "implemented", "maintain", "maintaining", "maintained", "support", "supporting",
        "supported", "lead", "leading", "led", "manage", "managing", "managed", "mentor",
        "mentoring", "coordinate", "coordinating", "coordinated", "collaborate",
        "collaboration", "collaborated", "degree", "bachelor", "master", "phd", "university",
        "college", "certification", "certificate", "junior", "senior", "intern", "internship",
        "full-time", "part-time", "contract", "freelance", "remote",
        // time/date
        "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
        "january", "february", "march", "april", "may", "june", "july", "august", "september",
        "october", "november", "december", "jan", "feb", "mar", "apr", "jun", "jul", "aug",
        "sep", "sept", "oct", "nov", "dec", "year", "years", "month", "months",
    ]
    .into_iter()
    .collect()
});

fn unescape_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

/// Canonicalize raw text: strip markup/urls/emails and control characters,
/// collapse whitespace, lowercase, and apply synonym replacements.
pub fn clean_text(raw: &str) -> String {
    let s = unescape_entities(raw);
    let s = TAG_RE.replace_all(&s, " ");
    let s = URL_RE.replace_all(&s, " ");
    let s = EMAIL_RE.replace_all(&s, " ");
    let s: String = s
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let s = WS_RE.replace_all(&s, " ");
    let mut s = s.trim().to_lowercase();
    for (pat, rep) in CANON_REPLACEMENTS.iter() {
        s = pat.replace_all(&s, *rep).into_owned();
    }
    s
}

/// A token in normalized text, with byte offsets into that text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn is_stop(&self) -> bool {
        EN_STOP.contains(self.text.as_str())
    }

    pub fn is_numeric(&self) -> bool {
        !self.text.is_empty() && self.text.chars().all(|c| c.is_ascii_digit())
    }
}

/// All tokens of already-normalized text, stop words included.
pub fn token_spans(normalized: &str) -> Vec<Token> {
    TOKEN_RE
        .find_iter(normalized)
        .map(|m| Token {
            text: m.as_str().to_string(),
            start: m.start(),
            end: m.end(),
        })
        .collect()
}

/// Normalize and tokenize, dropping stop words. This is the analyzer used
/// by the BM25 scorers.
pub fn tokenize(raw: &str) -> Vec<String> {
    let cleaned = clean_text(raw);
    TOKEN_RE
        .find_iter(&cleaned)
        .map(|m| m.as_str().to_string())
        .filter(|t| !EN_STOP.contains(t.as_str()))
        .collect()
}
