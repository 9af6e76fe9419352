//! End-to-end resume/job matching: feature blending over the extraction,
//! retrieval, and embedding crates, plus the serving-side match service.

pub mod features;
pub mod service;

pub use features::{build_features, build_group_features, skill_coverage, FeatureParams};
pub use service::MatchService;
