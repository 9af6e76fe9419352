//! Canonical-skill vocabulary loading.
//!
//! External vocabularies are JSON documents of shape
//! `{category: {canonical: [aliases...]}}`. Multiple files merge by
//! canonical-name union. Each known external shape goes through one
//! explicit adapter; anything else is a [`Error::Config`], never a
//! silently empty vocabulary.

use cvrank_core::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use crate::normalize::clean_text;

/// One canonical skill with its alias set. Aliases are deduplicated
/// case-insensitively; the first-seen casing is kept for display, while
/// matching always runs on the lower-cased form.
#[derive(Debug, Clone)]
pub struct Skill {
    pub canonical: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SkillVocabulary {
    pub skills: Vec<Skill>,
}

impl SkillVocabulary {
    /// Load and merge vocabulary sources. `path` may be a single JSON file
    /// or a directory whose `*.json` files are read in sorted order.
    pub fn load(path: &Path) -> Result<Self> {
        let files = vocab_files(path)?;
        let mut merged: MergeMap = MergeMap::default();
        for file in &files {
            let raw = std::fs::read_to_string(file)?;
            let value: Value = match serde_json::from_str(&raw) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!("skipping vocabulary file {}: {}", file.display(), e);
                    continue;
                }
            };
            match flatten_categorized(&value) {
                Ok(entries) => {
                    for (canonical, aliases) in entries {
                        merged.insert(canonical, aliases);
                    }
                }
                Err(e) => {
                    return Err(Error::Config(format!(
                        "unrecognized vocabulary shape in {}: {e}",
                        file.display()
                    )))
                }
            }
        }
        let vocab = merged.into_vocabulary();
        if vocab.skills.is_empty() {
            return Err(Error::Config(format!(
                "no valid skill entries found under {}",
                path.display()
            )));
        }
        tracing::info!(
            skills = vocab.skills.len(),
            files = files.len(),
            "loaded skill vocabulary"
        );
        Ok(vocab)
    }

    /// Drop aliases that are not plain ASCII English. Very short aliases
    /// are noise except for the well-known `c#`/`c++`/`go`.
    pub fn retain_english_only(&mut self) {
        self.skills.retain_mut(|skill| {
            skill.aliases.retain(|a| is_ascii_english(a));
            is_ascii_english(&skill.canonical) && !skill.aliases.is_empty()
        });
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

fn vocab_files(path: &Path) -> Result<Vec<std::path::PathBuf>> {
    if path.is_dir() {
        let mut files: Vec<_> = walkdir::WalkDir::new(path)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_type().is_file()
                    && e.path().extension().is_some_and(|ext| ext == "json")
            })
            .map(|e| e.into_path())
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(Error::Config(format!(
                "no *.json vocabulary files in {}",
                path.display()
            )));
        }
        Ok(files)
    } else if path.is_file() {
        Ok(vec![path.to_path_buf()])
    } else {
        Err(Error::Config(format!("vocabulary path not found: {}", path.display())))
    }
}

/// Adapter for the `{category: {canonical: [aliases...]}}` shape. Alias
/// values may be a list of strings or a single string.
fn flatten_categorized(value: &Value) -> std::result::Result<Vec<(String, Vec<String>)>, String> {
    let top = value.as_object().ok_or("top level is not an object")?;
    let mut out = Vec::new();
    for (category, mapping) in top {
        let mapping = mapping
            .as_object()
            .ok_or_else(|| format!("category '{category}' is not an object"))?;
        for (canonical, aliases) in mapping {
            let alias_strings: Vec<String> = match aliases {
                Value::Array(items) => items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string)
                    .collect(),
                Value::String(s) => vec![s.clone()],
                other => {
                    return Err(format!(
                        "aliases of '{canonical}' must be a string or array, got {other}"
                    ))
                }
            };
            out.push((canonical.clone(), alias_strings));
        }
    }
    Ok(out)
}

fn is_ascii_english(s: &str) -> bool {
    if !s.is_ascii() {
        return false;
    }
    let low = s.trim().to_lowercase();
    low.len() > 2 || matches!(low.as_str(), "c#" | "c++" | "go")
}

/// Accumulates canonical → aliases across files, unioning duplicate
/// canonicals and deduplicating aliases case-insensitively.
#[derive(Default)]
struct MergeMap {
    order: Vec<String>,
    entries: HashMap<String, Vec<String>>,
}

impl MergeMap {
    fn insert(&mut self, canonical: String, aliases: Vec<String>) {
        let canon_norm = clean_text(&canonical);
        if canon_norm.is_empty() {
            return;
        }
        let slot = self.entries.entry(canon_norm.clone()).or_insert_with(|| {
            self.order.push(canon_norm.clone());
            Vec::new()
        });
        // the canonical name itself always counts as an alias
        for alias in std::iter::once(canonical).chain(aliases) {
            let display = alias.trim();
            if display.is_empty() || clean_text(display).is_empty() {
                continue;
            }
            let lowered = display.to_lowercase();
            if !slot.iter().any(|a: &String| a.to_lowercase() == lowered) {
                slot.push(display.to_string());
            }
        }
    }

    fn into_vocabulary(mut self) -> SkillVocabulary {
        let skills = self
            .order
            .iter()
            .filter_map(|canonical| {
                let aliases = self.entries.remove(canonical)?;
                if aliases.is_empty() {
                    return None;
                }
                Some(Skill { canonical: canonical.clone(), aliases })
            })
            .collect();
        SkillVocabulary { skills }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> SkillVocabulary {
        let value: Value = serde_json::from_str(json).unwrap();
        let mut merged = MergeMap::default();
        for (c, a) in flatten_categorized(&value).unwrap() {
            merged.insert(c, a);
        }
        merged.into_vocabulary()
    }

    #[test]
    fn flattens_categories_and_unions_duplicates() {
        let vocab = parse(
            r#"{
                "languages": {"Python": ["python3", "py"]},
                "backend": {"python": ["CPython"]}
            }"#,
        );
        assert_eq!(vocab.len(), 1);
        let skill = &vocab.skills[0];
        assert_eq!(skill.canonical, "python");
        let mut lowered: Vec<String> = skill.aliases.iter().map(|a| a.to_lowercase()).collect();
        lowered.sort();
        assert_eq!(lowered, vec!["cpython", "py", "python", "python3"]);
    }

    #[test]
    fn dedup_is_case_insensitive_keeping_first_casing() {
        let vocab = parse(r#"{"c": {"Docker": ["docker", "DOCKER", "Moby"]}}"#);
        assert_eq!(vocab.skills[0].aliases, vec!["Docker", "Moby"]);
    }

    #[test]
    fn string_alias_value_is_accepted() {
        let vocab = parse(r#"{"c": {"Kubernetes": "k8s"}}"#);
        assert_eq!(vocab.skills[0].aliases, vec!["Kubernetes", "k8s"]);
    }

    #[test]
    fn unrecognized_shape_is_rejected() {
        let value: Value = serde_json::from_str(r#"["python", "docker"]"#).unwrap();
        assert!(flatten_categorized(&value).is_err());
    }

    #[test]
    fn english_only_filter_keeps_short_exceptions() {
        let mut vocab = parse(r#"{"c": {"C++": ["cpp"], "Go": ["go"], "Pythonista": ["票"]}}"#);
        vocab.retain_english_only();
        let names: Vec<_> = vocab.skills.iter().map(|s| s.canonical.as_str()).collect();
        assert!(names.contains(&"c++"));
        assert!(names.contains(&"go"));
        // the non-ascii alias is dropped but the canonical survives via itself
        assert!(names.contains(&"pythonista"));
    }
}
