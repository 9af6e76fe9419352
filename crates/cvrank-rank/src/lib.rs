//! Learning-to-rank over group-relative match features.

pub mod dataset;
pub mod metrics;
pub mod model;
pub mod tree;

pub use dataset::{encode_labels, Dataset, RawLabel};
pub use metrics::{ndcg_at_k, weighted_pearson, weighted_spearman};
pub use model::{FitReport, Ranker, RankerParams};
