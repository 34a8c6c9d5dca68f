//! Similarity scoring and result ordering.
//!
//! Scores use cosine similarity: `dot(a, b) / (|a| * |b|)`, in [-1.0, 1.0],
//! where 1.0 is an exact directional match. Ranked results order by score
//! descending, then by insertion sequence ascending so ties always resolve to
//! the first-inserted record no matter which shard holds it.

use std::cmp::Ordering;

use crate::vector::SearchHit;

/// Computes cosine similarity between two vectors.
///
/// Returns 0.0 when either vector has zero magnitude or when the dimensions
/// differ, so a malformed embedding never outranks a real match.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        // Rounding can push exact matches a hair past 1.0
        (dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0)
    }
}

/// Total order for ranked results: higher score first, then earlier insertion.
pub fn compare_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.sequence.cmp(&b.sequence))
}
