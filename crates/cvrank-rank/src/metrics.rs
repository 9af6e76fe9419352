//! Ranking quality metrics: NDCG@k and weighted correlation.

/// NDCG@k with exponential gain `2^label - 1` and log2 position discount.
/// Returns 0 when the ideal DCG is 0 (all labels zero).
pub fn ndcg_at_k(labels: &[f32], preds: &[f32], k: usize) -> f32 {
    debug_assert_eq!(labels.len(), preds.len());
    if labels.is_empty() || k == 0 {
        return 0.0;
    }

    let mut order: Vec<usize> = (0..preds.len()).collect();
    order.sort_by(|&a, &b| preds[b].total_cmp(&preds[a]));
    let dcg = dcg_at_k(&order, labels, k);

    let mut ideal: Vec<usize> = (0..labels.len()).collect();
    ideal.sort_by(|&a, &b| labels[b].total_cmp(&labels[a]));
    let idcg = dcg_at_k(&ideal, labels, k);

    if idcg <= 0.0 {
        0.0
    } else {
        dcg / idcg
    }
}

fn dcg_at_k(order: &[usize], labels: &[f32], k: usize) -> f32 {
    order
        .iter()
        .take(k)
        .enumerate()
        .map(|(pos, &i)| {
            let gain = 2.0f32.powf(labels[i]) - 1.0;
            gain / (pos as f32 + 2.0).log2()
        })
        .sum()
}

/// Pearson correlation with per-sample weights. Returns 0 when either
/// side has no weighted variance.
pub fn weighted_pearson(x: &[f32], y: &[f32], w: &[f32]) -> f32 {
    debug_assert_eq!(x.len(), y.len());
    debug_assert_eq!(x.len(), w.len());
    let sw: f32 = w.iter().sum();
    if sw <= 0.0 {
        return 0.0;
    }
    let mx: f32 = x.iter().zip(w).map(|(a, b)| a * b).sum::<f32>() / sw;
    let my: f32 = y.iter().zip(w).map(|(a, b)| a * b).sum::<f32>() / sw;

    let mut cov = 0.0f32;
    let mut vx = 0.0f32;
    let mut vy = 0.0f32;
    for i in 0..x.len() {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        cov += w[i] * dx * dy;
        vx += w[i] * dx * dx;
        vy += w[i] * dy * dy;
    }
    if vx <= 0.0 || vy <= 0.0 {
        return 0.0;
    }
    cov / (vx.sqrt() * vy.sqrt())
}

/// Spearman correlation: weighted Pearson over rank transforms, with ties
/// assigned the average of their positions.
pub fn weighted_spearman(x: &[f32], y: &[f32], w: &[f32]) -> f32 {
    weighted_pearson(&rank_transform(x), &rank_transform(y), w)
}

fn rank_transform(values: &[f32]) -> Vec<f32> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0f32; values.len()];
    let mut pos = 0usize;
    while pos < order.len() {
        let mut end = pos + 1;
        while end < order.len() && values[order[end]] == values[order[pos]] {
            end += 1;
        }
        // 1-based average rank over the tie run
        let avg = ((pos + 1 + end) as f32) / 2.0;
        for &i in &order[pos..end] {
            ranks[i] = avg;
        }
        pos = end;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_ranking_scores_one() {
        let labels = [3.0, 2.0, 1.0, 0.0];
        let preds = [0.9, 0.7, 0.4, 0.1];
        assert!((ndcg_at_k(&labels, &preds, 4) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn all_zero_labels_score_zero() {
        let labels = [0.0, 0.0, 0.0];
        let preds = [0.3, 0.2, 0.1];
        assert_eq!(ndcg_at_k(&labels, &preds, 3), 0.0);
    }

    #[test]
    fn reversed_ranking_scores_below_one() {
        let labels = [0.0, 1.0, 2.0];
        let preds = [0.9, 0.5, 0.1];
        let score = ndcg_at_k(&labels, &preds, 3);
        assert!(score > 0.0 && score < 1.0);
    }

    #[test]
    fn pearson_detects_sign() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let up = [1.0, 2.0, 3.0, 4.0];
        let down = [4.0, 3.0, 2.0, 1.0];
        let w = [1.0; 4];
        assert!((weighted_pearson(&x, &up, &w) - 1.0).abs() < 1e-6);
        assert!((weighted_pearson(&x, &down, &w) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn constant_input_correlates_zero() {
        let x = [2.0, 2.0, 2.0];
        let y = [1.0, 2.0, 3.0];
        let w = [1.0; 3];
        assert_eq!(weighted_pearson(&x, &y, &w), 0.0);
    }

    #[test]
    fn spearman_ignores_monotone_distortion() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [1.0, 8.0, 27.0, 64.0];
        let w = [1.0; 4];
        assert!((weighted_spearman(&x, &y, &w) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rank_transform_averages_ties() {
        assert_eq!(rank_transform(&[5.0, 1.0, 5.0]), vec![2.5, 1.0, 2.5]);
    }
}
