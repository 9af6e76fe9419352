//! Persistent approximate-nearest-neighbor index for resume vectors.
//!
//! Cosine similarity via inner product over L2-normalized vectors, with an
//! exact flat backend for small pools and an HNSW graph for larger ones.

pub mod flat;
pub mod hnsw;
pub mod store;
mod visited;

pub use flat::FlatIndex;
pub use hnsw::{HnswIndex, HnswParams};
pub use store::{AnnStore, IndexKind};
