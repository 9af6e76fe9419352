//! Regression trees with non-decreasing monotonicity constraints.
//!
//! Every feature is a relevance signal, so predictions must never drop as
//! a feature rises. Two mechanisms enforce this the way constrained
//! gradient boosters do: a split whose left Newton weight exceeds its
//! right is rejected outright, and each child inherits a value interval
//! bounded at the split's midpoint so deeper splits cannot re-violate an
//! ancestor's ordering.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// L2 regularization on leaf weights.
    pub lambda: f32,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 4,
            min_samples_leaf: 1,
            lambda: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub feature: usize,
    pub threshold: f32,
    pub left: u32,
    pub right: u32,
    pub leaf: bool,
    pub value: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

struct SplitChoice {
    feature: usize,
    threshold: f32,
    gain: f32,
    left_weight: f32,
    right_weight: f32,
}

impl Tree {
    /// Fits one tree to (gradient, hessian) pairs via Newton steps.
    /// `rows_idx` selects the training rows, `features` the columns this
    /// tree may split on.
    pub fn fit(
        rows: &[Vec<f32>],
        rows_idx: &[usize],
        grad: &[f32],
        hess: &[f32],
        features: &[usize],
        params: &TreeParams,
    ) -> Tree {
        let mut tree = Tree { nodes: Vec::new() };
        let idx: Vec<usize> = rows_idx.to_vec();
        build(
            &mut tree.nodes,
            rows,
            &idx,
            grad,
            hess,
            features,
            params,
            0,
            f32::NEG_INFINITY,
            f32::INFINITY,
        );
        tree
    }

    pub fn predict(&self, row: &[f32]) -> f32 {
        let mut cursor = 0usize;
        loop {
            let node = &self.nodes[cursor];
            if node.leaf {
                return node.value;
            }
            cursor = if row[node.feature] < node.threshold {
                node.left as usize
            } else {
                node.right as usize
            };
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }
}

fn newton_weight(sum_g: f32, sum_h: f32, lambda: f32, lo: f32, hi: f32) -> f32 {
    (-sum_g / (sum_h + lambda)).clamp(lo, hi)
}

#[allow(clippy::too_many_arguments)]
fn build(
    nodes: &mut Vec<Node>,
    rows: &[Vec<f32>],
    idx: &[usize],
    grad: &[f32],
    hess: &[f32],
    features: &[usize],
    params: &TreeParams,
    depth: usize,
    lo: f32,
    hi: f32,
) -> u32 {
    let sum_g: f32 = idx.iter().map(|&i| grad[i]).sum();
    let sum_h: f32 = idx.iter().map(|&i| hess[i]).sum();
    let leaf_value = newton_weight(sum_g, sum_h, params.lambda, lo, hi);

    let this = nodes.len() as u32;
    nodes.push(Node {
        feature: 0,
        threshold: 0.0,
        left: 0,
        right: 0,
        leaf: true,
        value: leaf_value,
    });

    if depth >= params.max_depth || idx.len() < 2 * params.min_samples_leaf {
        return this;
    }

    let Some(split) = best_split(rows, idx, grad, hess, features, params, sum_g, sum_h, lo, hi)
    else {
        return this;
    };

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = idx
        .iter()
        .partition(|&&i| rows[i][split.feature] < split.threshold);

    // Children may not cross the split midpoint, which keeps every path
    // through this node ordered left <= right.
    let mid = 0.5 * (split.left_weight + split.right_weight);
    let left = build(
        nodes, rows, &left_idx, grad, hess, features, params, depth + 1, lo, mid,
    );
    let right = build(
        nodes, rows, &right_idx, grad, hess, features, params, depth + 1, mid, hi,
    );

    let node = &mut nodes[this as usize];
    node.leaf = false;
    node.feature = split.feature;
    node.threshold = split.threshold;
    node.left = left;
    node.right = right;
    this
}

#[allow(clippy::too_many_arguments)]
fn best_split(
    rows: &[Vec<f32>],
    idx: &[usize],
    grad: &[f32],
    hess: &[f32],
    features: &[usize],
    params: &TreeParams,
    sum_g: f32,
    sum_h: f32,
    lo: f32,
    hi: f32,
) -> Option<SplitChoice> {
    let lambda = params.lambda;
    let parent_score = sum_g * sum_g / (sum_h + lambda);
    let mut best: Option<SplitChoice> = None;

    for &f in features {
        let mut order: Vec<usize> = idx.to_vec();
        order.sort_unstable_by(|&a, &b| rows[a][f].total_cmp(&rows[b][f]));

        let mut gl = 0.0f32;
        let mut hl = 0.0f32;
        for pos in 0..order.len() - 1 {
            let i = order[pos];
            gl += grad[i];
            hl += hess[i];

            let here = rows[i][f];
            let next = rows[order[pos + 1]][f];
            if next <= here {
                continue;
            }
            let n_left = pos + 1;
            let n_right = order.len() - n_left;
            if n_left < params.min_samples_leaf || n_right < params.min_samples_leaf {
                continue;
            }

            let gr = sum_g - gl;
            let hr = sum_h - hl;
            let wl = newton_weight(gl, hl, lambda, lo, hi);
            let wr = newton_weight(gr, hr, lambda, lo, hi);
            // Monotone non-decreasing: higher feature values may never map
            // to a lower prediction.
            if wl > wr {
                continue;
            }

            let gain = gl * gl / (hl + lambda) + gr * gr / (hr + lambda) - parent_score;
            if gain <= 1e-9 {
                continue;
            }
            if best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(SplitChoice {
                    feature: f,
                    threshold: 0.5 * (here + next),
                    gain,
                    left_weight: wl,
                    right_weight: wr,
                });
            }
        }
    }
    best
}
