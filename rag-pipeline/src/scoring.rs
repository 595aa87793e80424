use std::cmp::Ordering;

/// Number of candidates retrieval keeps for the reranker, regardless of the
/// `top_n` a caller asked for.
pub const SHORTLIST_SIZE: usize = 5;

/// Cosine similarity in [-1, 1]. Mismatched lengths and zero-norm inputs
/// score 0.0 rather than erroring, so a degenerate row can never outrank a
/// real match.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot = x.mul_add(*y, dot);
        norm_a = x.mul_add(*x, norm_a);
        norm_b = y.mul_add(*y, norm_b);
    }

    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Scores every matrix row against the query vector and returns the `limit`
/// best as (row index, similarity), descending. Equal scores fall back to the
/// lower row index so repeated chunks rank deterministically.
pub fn top_shortlist(
    query_vector: &[f32],
    matrix: &[Vec<f32>],
    limit: usize,
) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = matrix
        .iter()
        .enumerate()
        .map(|(index, row)| (index, cosine_similarity(query_vector, row)))
        .collect();

    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    ranked.truncate(limit);
    ranked
}
