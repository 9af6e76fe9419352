//! Gradient-boosted ranking model with pairwise gradients.
//!
//! Trees are fitted to RankNet-style gradients computed within job groups:
//! for every in-group pair whose labels differ, the lower-labeled row
//! pushes the higher-labeled one up and vice versa. Combined with the
//! monotone trees in [`crate::tree`], a higher feature value can only ever
//! help a candidate.

use crate::dataset::Dataset;
use crate::metrics::{ndcg_at_k, weighted_pearson, weighted_spearman};
use crate::tree::{Tree, TreeParams};
use cvrank_core::{Error, FeatureVector, RankedResult, Result};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankerParams {
    pub n_trees: usize,
    pub learning_rate: f32,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub lambda: f32,
    /// Row fraction sampled per tree.
    pub subsample: f32,
    /// Feature fraction sampled per tree.
    pub colsample: f32,
    pub validation_fraction: f32,
    pub seed: u64,
}

impl Default for RankerParams {
    fn default() -> Self {
        Self {
            n_trees: 120,
            learning_rate: 0.1,
            max_depth: 4,
            min_samples_leaf: 1,
            lambda: 1.0,
            subsample: 1.0,
            colsample: 1.0,
            validation_fraction: 0.2,
            seed: 42,
        }
    }
}

/// Quality summary from a training run. Metrics come from the holdout
/// groups when any exist, otherwise from the training groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitReport {
    pub ndcg_at_5: f32,
    pub ndcg_at_10: f32,
    pub pearson: f32,
    pub spearman: f32,
    pub train_groups: usize,
    pub valid_groups: usize,
}

#[derive(Serialize, Deserialize)]
struct ModelFile {
    params: RankerParams,
    n_features: usize,
    feature_names: Vec<String>,
    label_map: Option<HashMap<String, i64>>,
    trees: Vec<Tree>,
}

/// Human-readable companion to `model.json`: everything needed to feed the
/// model correctly without the training code path.
#[derive(Serialize)]
struct ConfigFile<'a> {
    params: &'a RankerParams,
    feature_names: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    label_map: Option<&'a HashMap<String, i64>>,
}

#[derive(Debug)]
pub struct Ranker {
    params: RankerParams,
    trees: Vec<Tree>,
    n_features: usize,
    feature_names: Vec<String>,
    label_map: Option<HashMap<String, i64>>,
}

impl Ranker {
    pub fn new(params: RankerParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            n_features: 0,
            feature_names: Vec::new(),
            label_map: None,
        }
    }

    /// Records the text-to-grade mapping used when encoding labels, so a
    /// saved model documents how its training labels were produced.
    pub fn set_label_map(&mut self, map: Option<HashMap<String, i64>>) {
        self.label_map = map;
    }

    /// Column names in the order `predict` and `rank` expect them.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn label_map(&self) -> Option<&HashMap<String, i64>> {
        self.label_map.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Trains on the dataset. Untrainable groups are dropped first; an
    /// empty remainder is `Error::InsufficientData`.
    pub fn fit(&mut self, dataset: Dataset) -> Result<FitReport> {
        let dataset = dataset.filter_trainable_groups()?;
        self.n_features = dataset.n_features();
        self.feature_names = if self.n_features == FeatureVector::FEATURE_NAMES.len() {
            FeatureVector::FEATURE_NAMES
                .iter()
                .map(|n| n.to_string())
                .collect()
        } else {
            (0..self.n_features).map(|i| format!("f{i}")).collect()
        };

        let (train_idx, valid_idx) =
            dataset.holdout_split(self.params.validation_fraction, self.params.seed);
        let train_groups = group_rows(&dataset, &train_idx);
        let valid_groups = group_rows(&dataset, &valid_idx);

        let tree_params = TreeParams {
            max_depth: self.params.max_depth,
            min_samples_leaf: self.params.min_samples_leaf,
            lambda: self.params.lambda,
        };
        let mut rng = rand::rngs::StdRng::seed_from_u64(self.params.seed);
        let mut preds = vec![0.0f32; dataset.len()];
        self.trees.clear();

        for round in 0..self.params.n_trees {
            let (grad, hess) = pairwise_gradients(&dataset, &train_groups, &preds);

            let rows_idx = sample_rows(&train_idx, self.params.subsample, &mut rng);
            let features = sample_features(self.n_features, self.params.colsample, &mut rng);

            let tree = Tree::fit(
                &dataset.rows,
                &rows_idx,
                &grad,
                &hess,
                &features,
                &tree_params,
            );
            for (i, row) in dataset.rows.iter().enumerate() {
                preds[i] += self.params.learning_rate * tree.predict(row);
            }
            self.trees.push(tree);

            if (round + 1) % 20 == 0 && !valid_groups.is_empty() {
                let ndcg = mean_group_ndcg(&dataset, &valid_groups, &preds, 10);
                debug!(round = round + 1, valid_ndcg10 = ndcg, "boosting progress");
            }
        }

        let eval_groups = if valid_groups.is_empty() {
            &train_groups
        } else {
            &valid_groups
        };
        let report = FitReport {
            ndcg_at_5: mean_group_ndcg(&dataset, eval_groups, &preds, 5),
            ndcg_at_10: mean_group_ndcg(&dataset, eval_groups, &preds, 10),
            pearson: mean_group_corr(&dataset, eval_groups, &preds, weighted_pearson),
            spearman: mean_group_corr(&dataset, eval_groups, &preds, weighted_spearman),
            train_groups: train_groups.len(),
            valid_groups: valid_groups.len(),
        };
        info!(
            trees = self.trees.len(),
            ndcg5 = report.ndcg_at_5,
            ndcg10 = report.ndcg_at_10,
            "ranker trained"
        );
        Ok(report)
    }

    /// Raw model scores, one per row. `Error::ModelNotReady` until a model
    /// has been trained or loaded.
    pub fn predict(&self, rows: &[Vec<f32>]) -> Result<Vec<f32>> {
        if !self.is_fitted() {
            return Err(Error::ModelNotReady);
        }
        Ok(rows
            .iter()
            .map(|row| {
                self.trees
                    .iter()
                    .map(|t| t.predict(row))
                    .sum::<f32>()
                    * self.params.learning_rate
            })
            .collect())
    }

    /// Ranks feature vectors within their job groups. Groups smaller than
    /// two are dropped (nothing relative to rank against); each surviving
    /// group is sorted descending by score and truncated to `topk`.
    pub fn rank(
        &self,
        vectors: &[FeatureVector],
        topk: Option<usize>,
    ) -> Result<Vec<RankedResult>> {
        let rows: Vec<Vec<f32>> = vectors.iter().map(|v| v.features().to_vec()).collect();
        let preds = self.predict(&rows)?;

        let mut order: Vec<String> = Vec::new();
        let mut by_group: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, v) in vectors.iter().enumerate() {
            by_group
                .entry(v.jd_id.as_str())
                .or_insert_with(|| {
                    order.push(v.jd_id.clone());
                    Vec::new()
                })
                .push(i);
        }

        let mut out = Vec::new();
        for group in &order {
            let idx = &by_group[group.as_str()];
            if idx.len() < 2 {
                warn!(group = %group, "skipping group of one: nothing to rank against");
                continue;
            }
            let mut scored: Vec<usize> = idx.clone();
            scored.sort_by(|&a, &b| {
                preds[b]
                    .total_cmp(&preds[a])
                    .then_with(|| vectors[a].cv_id.cmp(&vectors[b].cv_id))
            });
            if let Some(k) = topk {
                scored.truncate(k);
            }
            for (pos, &i) in scored.iter().enumerate() {
                out.push(RankedResult {
                    jd_id: vectors[i].jd_id.clone(),
                    cv_id: vectors[i].cv_id.clone(),
                    pred: preds[i],
                    rank: (pos + 1) as u32,
                });
            }
        }
        Ok(out)
    }

    /// Writes `model.json` (trees + params + column contract) and
    /// `config.json` (the same contract without the trees, pretty-printed
    /// for humans) into `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        if !self.is_fitted() {
            return Err(Error::ModelNotReady);
        }
        fs::create_dir_all(dir)?;
        let file = ModelFile {
            params: self.params.clone(),
            n_features: self.n_features,
            feature_names: self.feature_names.clone(),
            label_map: self.label_map.clone(),
            trees: self.trees.clone(),
        };
        fs::write(dir.join("model.json"), serde_json::to_vec(&file)?)?;
        let config = ConfigFile {
            params: &self.params,
            feature_names: &self.feature_names,
            label_map: self.label_map.as_ref(),
        };
        fs::write(
            dir.join("config.json"),
            serde_json::to_vec_pretty(&config)?,
        )?;
        Ok(())
    }

    /// A missing or malformed model file is a configuration problem, not a
    /// transient I/O one: the caller pointed at the wrong directory.
    pub fn load(dir: &Path) -> Result<Ranker> {
        let path = dir.join("model.json");
        let bytes = fs::read(&path)
            .map_err(|e| Error::Config(format!("cannot read model file {}: {e}", path.display())))?;
        let file: ModelFile = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Config(format!("cannot parse model file {}: {e}", path.display())))?;
        info!(trees = file.trees.len(), dir = %dir.display(), "ranker loaded");
        Ok(Ranker {
            params: file.params,
            trees: file.trees,
            n_features: file.n_features,
            feature_names: file.feature_names,
            label_map: file.label_map,
        })
    }
}

fn group_rows(dataset: &Dataset, idx: &[usize]) -> Vec<Vec<usize>> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_group: HashMap<&str, Vec<usize>> = HashMap::new();
    for &i in idx {
        let g = dataset.groups[i].as_str();
        by_group
            .entry(g)
            .or_insert_with(|| {
                order.push(g);
                Vec::new()
            })
            .push(i);
    }
    order.into_iter().map(|g| by_group[g].clone()).collect()
}

/// RankNet gradients and hessians over all in-group label-discordant
/// pairs. For labels `l_i > l_j` the pair contributes `-rho` to row i and
/// `+rho` to row j, where `rho = sigmoid(s_j - s_i)`.
fn pairwise_gradients(
    dataset: &Dataset,
    groups: &[Vec<usize>],
    preds: &[f32],
) -> (Vec<f32>, Vec<f32>) {
    let mut grad = vec![0.0f32; dataset.len()];
    let mut hess = vec![0.0f32; dataset.len()];
    for group in groups {
        for a in 0..group.len() {
            for b in a + 1..group.len() {
                let (i, j) = (group[a], group[b]);
                let (hi, lo) = match dataset.labels[i]
                    .partial_cmp(&dataset.labels[j])
                    .unwrap_or(std::cmp::Ordering::Equal)
                {
                    std::cmp::Ordering::Greater => (i, j),
                    std::cmp::Ordering::Less => (j, i),
                    std::cmp::Ordering::Equal => continue,
                };
                let s = preds[hi] - preds[lo];
                let rho = 1.0 / (1.0 + s.exp());
                let h = (rho * (1.0 - rho)).max(1e-6);
                grad[hi] -= rho;
                grad[lo] += rho;
                hess[hi] += h;
                hess[lo] += h;
            }
        }
    }
    (grad, hess)
}

fn sample_rows(train_idx: &[usize], subsample: f32, rng: &mut impl Rng) -> Vec<usize> {
    if subsample >= 1.0 {
        return train_idx.to_vec();
    }
    let sampled: Vec<usize> = train_idx
        .iter()
        .copied()
        .filter(|_| rng.gen::<f32>() < subsample)
        .collect();
    if sampled.is_empty() {
        train_idx.to_vec()
    } else {
        sampled
    }
}

fn sample_features(n_features: usize, colsample: f32, rng: &mut impl Rng) -> Vec<usize> {
    let all: Vec<usize> = (0..n_features).collect();
    if colsample >= 1.0 {
        return all;
    }
    let take = ((n_features as f32 * colsample).ceil() as usize).clamp(1, n_features);
    let mut shuffled = all;
    shuffled.shuffle(rng);
    shuffled.truncate(take);
    shuffled.sort_unstable();
    shuffled
}

fn mean_group_ndcg(dataset: &Dataset, groups: &[Vec<usize>], preds: &[f32], k: usize) -> f32 {
    if groups.is_empty() {
        return 0.0;
    }
    let mut total = 0.0f32;
    for group in groups {
        let labels: Vec<f32> = group.iter().map(|&i| dataset.labels[i]).collect();
        let scores: Vec<f32> = group.iter().map(|&i| preds[i]).collect();
        total += ndcg_at_k(&labels, &scores, k);
    }
    total / groups.len() as f32
}

/// Size-weighted mean of a per-group correlation.
fn mean_group_corr(
    dataset: &Dataset,
    groups: &[Vec<usize>],
    preds: &[f32],
    corr: fn(&[f32], &[f32], &[f32]) -> f32,
) -> f32 {
    let total_rows: usize = groups.iter().map(|g| g.len()).sum();
    if total_rows == 0 {
        return 0.0;
    }
    let mut acc = 0.0f32;
    for group in groups {
        let labels: Vec<f32> = group.iter().map(|&i| dataset.labels[i]).collect();
        let scores: Vec<f32> = group.iter().map(|&i| preds[i]).collect();
        let w = vec![1.0f32; group.len()];
        acc += corr(&scores, &labels, &w) * group.len() as f32;
    }
    acc / total_rows as f32
}
