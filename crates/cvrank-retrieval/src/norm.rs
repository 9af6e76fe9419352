//! Group-wise score normalization.

/// Min-max normalizes one group of raw scores into `[0, 1]`.
///
/// Groups of zero or one members normalize to all zeros, as do groups
/// where every score is identical: a constant column carries no ranking
/// signal and zero is the honest value for it.
pub fn minmax_normalize(scores: &[f32]) -> Vec<f32> {
    if scores.len() <= 1 {
        return vec![0.0; scores.len()];
    }
    let mut lo = f32::INFINITY;
    let mut hi = f32::NEG_INFINITY;
    for &s in scores {
        lo = lo.min(s);
        hi = hi.max(s);
    }
    if hi <= lo {
        return vec![0.0; scores.len()];
    }
    let denom = (hi - lo) + 1e-12;
    scores.iter().map(|&s| (s - lo) / denom).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singleton_group_is_zero() {
        assert_eq!(minmax_normalize(&[42.0]), vec![0.0]);
    }

    #[test]
    fn constant_group_is_zero() {
        assert_eq!(minmax_normalize(&[3.0, 3.0, 3.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn output_is_bounded_and_order_preserving() {
        let out = minmax_normalize(&[1.0, 5.0, 3.0, -2.0]);
        for &v in &out {
            assert!((0.0..=1.0).contains(&v));
        }
        assert_eq!(out[3], 0.0);
        assert!(out[1] > out[2]);
        assert!(out[2] > out[0]);
        assert!(out[0] > out[3]);
    }

    #[test]
    fn max_maps_near_one() {
        let out = minmax_normalize(&[0.0, 10.0]);
        assert!((out[1] - 1.0).abs() < 1e-6);
    }
}
