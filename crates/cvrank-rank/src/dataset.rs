//! Training data assembly: label encoding, group filtering, holdout split.

use cvrank_core::{Error, FeatureVector, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// A relevance label as it arrives from training data: either a judgment
/// string ("good", "perfect") or a number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawLabel {
    Number(f64),
    Text(String),
}

/// Encodes raw labels to non-negative integer grades.
///
/// Text labels require an explicit map; numbers are rounded to the nearest
/// integer. The result is shifted so the minimum grade is 0, which the
/// exponential NDCG gain assumes.
pub fn encode_labels(labels: &[RawLabel], map: Option<&HashMap<String, i64>>) -> Result<Vec<f32>> {
    let mut grades = Vec::with_capacity(labels.len());
    for label in labels {
        let grade = match label {
            RawLabel::Number(n) => n.round() as i64,
            RawLabel::Text(s) => {
                let map = map.ok_or_else(|| {
                    Error::Config(format!("text label {s:?} but no label map configured"))
                })?;
                *map.get(s.as_str()).ok_or_else(|| {
                    Error::Config(format!("label {s:?} missing from label map"))
                })?
            }
        };
        grades.push(grade);
    }
    let min = grades.iter().copied().min().unwrap_or(0);
    Ok(grades.iter().map(|&g| (g - min) as f32).collect())
}

/// Feature rows with labels and group keys, ready for the booster.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub rows: Vec<Vec<f32>>,
    pub labels: Vec<f32>,
    pub groups: Vec<String>,
}

impl Dataset {
    pub fn from_feature_vectors(vectors: &[FeatureVector], labels: Vec<f32>) -> Self {
        let rows = vectors.iter().map(|v| v.features().to_vec()).collect();
        let groups = vectors.iter().map(|v| v.jd_id.clone()).collect();
        Self { rows, labels, groups }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.rows.first().map_or(0, |r| r.len())
    }

    /// Row indices per group, in first-seen group order.
    pub fn group_indices(&self) -> Vec<(String, Vec<usize>)> {
        let mut order: Vec<String> = Vec::new();
        let mut by_group: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, g) in self.groups.iter().enumerate() {
            let slot = by_group.entry(g.as_str()).or_insert_with(|| {
                order.push(g.clone());
                Vec::new()
            });
            slot.push(i);
        }
        order
            .into_iter()
            .map(|g| {
                let idx = by_group.remove(g.as_str()).unwrap_or_default();
                (g, idx)
            })
            .collect()
    }

    /// Drops groups that cannot produce a ranking gradient: fewer than two
    /// members, or every label identical. Errors when nothing survives.
    pub fn filter_trainable_groups(self) -> Result<Dataset> {
        let mut keep = vec![false; self.rows.len()];
        let mut kept_groups = 0usize;
        for (group, idx) in self.group_indices() {
            if idx.len() < 2 {
                warn!(group = %group, size = idx.len(), "dropping group: too small to rank");
                continue;
            }
            let first = self.labels[idx[0]];
            if idx.iter().all(|&i| self.labels[i] == first) {
                warn!(group = %group, "dropping group: no label variance");
                continue;
            }
            kept_groups += 1;
            for &i in &idx {
                keep[i] = true;
            }
        }
        if kept_groups == 0 {
            return Err(Error::InsufficientData(
                "no group has >= 2 members with label variance".into(),
            ));
        }

        let mut rows = Vec::new();
        let mut labels = Vec::new();
        let mut groups = Vec::new();
        for (i, k) in keep.into_iter().enumerate() {
            if k {
                rows.push(self.rows[i].clone());
                labels.push(self.labels[i]);
                groups.push(self.groups[i].clone());
            }
        }
        Ok(Dataset { rows, labels, groups })
    }

    /// Group-aware holdout: whole groups go to one side or the other, so
    /// validation pairs are never half-seen during training. Returns
    /// (train, validation) row indices. Validation is empty when the
    /// fraction rounds down to zero groups or only one group exists.
    pub fn holdout_split(&self, validation_fraction: f32, seed: u64) -> (Vec<usize>, Vec<usize>) {
        let grouped = self.group_indices();
        let n_groups = grouped.len();
        let n_valid = ((n_groups as f32) * validation_fraction).floor() as usize;
        if n_valid == 0 || n_valid >= n_groups {
            let all: Vec<usize> = (0..self.rows.len()).collect();
            return (all, Vec::new());
        }

        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let mut order: Vec<usize> = (0..n_groups).collect();
        order.shuffle(&mut rng);

        let mut train = Vec::new();
        let mut valid = Vec::new();
        for (pos, &gi) in order.iter().enumerate() {
            let target = if pos < n_valid { &mut valid } else { &mut train };
            target.extend(grouped[gi].1.iter().copied());
        }
        train.sort_unstable();
        valid.sort_unstable();
        (train, valid)
    }
}
