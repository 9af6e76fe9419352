//! # cvrank-core
//!
//! Shared foundation for the cvrank matching pipeline: the error taxonomy,
//! configuration loader, domain types, cancellation token, and the
//! swap-on-publish cell that model/vocabulary reloads go through.

pub mod cancel;
pub mod config;
pub mod error;
pub mod ids;
pub mod swap;
pub mod traits;
pub mod types;

pub use cancel::CancelToken;
pub use config::Config;
pub use error::{Error, Result};
pub use ids::{content_hash, stable_hash_id};
pub use swap::SwapCell;
pub use types::{
    Candidate, CvId, FeatureVector, JdId, Pair, RankRequest, RankedResult, Span, SpanSource,
};
