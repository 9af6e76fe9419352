//! Stable content-hash identities for jobs and resumes.
//!
//! Ids are derived from whitespace-collapsed, lower-cased text so that
//! repeated submissions of the same document map to the same id.

fn norm_for_id(s: &str) -> String {
    s.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `prefix` + first 12 hex chars of the blake3 hash of the normalized text.
pub fn stable_hash_id(text: &str, prefix: &str) -> String {
    let digest = blake3::hash(norm_for_id(text).as_bytes());
    let hex = digest.to_hex();
    format!("{prefix}{}", &hex.as_str()[..12])
}

/// Full blake3 hex digest of the normalized text, for cache keys.
pub fn content_hash(text: &str) -> String {
    blake3::hash(norm_for_id(text).as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_after_whitespace_and_case_changes() {
        let a = stable_hash_id("Python  FastAPI\nDocker", "cv-");
        let b = stable_hash_id("python fastapi docker", "cv-");
        assert_eq!(a, b);
        assert!(a.starts_with("cv-"));
        assert_eq!(a.len(), "cv-".len() + 12);
    }

    #[test]
    fn distinct_texts_get_distinct_ids() {
        assert_ne!(
            stable_hash_id("java spring", "cv-"),
            stable_hash_id("python fastapi", "cv-")
        );
    }
}
