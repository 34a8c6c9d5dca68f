//! Vector records and similarity scoring.
//!
//! This module holds the data the engine moves around ([`VectorRecord`]) and
//! the brute-force cosine scoring every shard performs locally. Embedding
//! generation happens outside the engine; vectors arrive ready to store.

mod similarity;
mod types;

// Re-export core types for public API
pub use similarity::{compare_hits, cosine_similarity};
pub use types::{Metadata, SearchHit, VectorRecord};
