use rayon::prelude::*;

use crate::{
    database::VectorIndex,
    error::{Error, Result},
};

/// One scored row of the index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub index: usize,
    pub score: f32,
}

/// Cosine similarity between two equal-length vectors.
///
/// Database vectors are expected pre-normalized, but the metric is computed
/// as true cosine similarity so non-normalized inputs still score correctly.
/// A zero vector scores 0.0 against everything.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Score every row of the index against the query and return the `k` best.
///
/// Results are in descending score order; ties keep the original row order.
/// `k` must be between 1 and the number of rows, never clamped.
pub fn find_top_k(index: &VectorIndex, query: &[f32], k: usize) -> Result<Vec<Match>> {
    if k == 0 || k > index.len() {
        return Err(Error::Config(format!(
            "top_k must be between 1 and the number of indexed chunks ({}), got {k}",
            index.len()
        )));
    }
    if query.len() != index.dim() {
        return Err(Error::DimensionMismatch {
            expected: index.dim(),
            found: query.len(),
        });
    }

    let embeddings = index.embeddings();
    let matches: Vec<Match> = (0..index.len())
        .into_par_iter()
        .map(|i| Match {
            index: i,
            score: cosine(embeddings.row(i), query),
        })
        .collect();

    Ok(select_top_k(matches, k))
}

/// Keep the `k` highest-scoring matches, descending.
///
/// The sort is stable, so equal scores preserve the incoming order (first
/// occurrence wins) and selection stays deterministic.
pub fn select_top_k(mut matches: Vec<Match>, k: usize) -> Vec<Match> {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches.truncate(k);
    matches
}
