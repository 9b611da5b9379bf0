//! Reciprocal-rank fusion of a text-search list and a vector-search list.

use std::collections::HashMap;

use crate::types::SearchResult;

/// Reciprocal-rank fusion constant and per-list weights. Defaults to
/// `k = 60`, `text = 0.4`, `vector = 0.6`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RrfConfig {
    pub k: f32,
    pub text_weight: f32,
    pub vector_weight: f32,
}

impl Default for RrfConfig {
    fn default() -> Self {
        Self {
            k: 60.0,
            text_weight: 0.4,
            vector_weight: 0.6,
        }
    }
}

fn rrf_score(rank: usize, weight: f32, k: f32) -> f32 {
    weight / (k + rank as f32)
}

/// Fuse two already-ranked result lists into one, accumulating weighted
/// reciprocal rank per chunk key. When a chunk appears in both lists, the
/// text-side row (preserving its BM25 `.score` for inspection) is kept as
/// the payload, but `.score` is overwritten with the fused value. Sorted
/// descending by fused score, truncated to `limit`.
pub fn fuse(text_results: &[SearchResult], vector_results: &[SearchResult], config: RrfConfig, limit: usize) -> Vec<SearchResult> {
    let mut scores: HashMap<&str, f32> = HashMap::new();
    let mut payloads: HashMap<&str, &SearchResult> = HashMap::new();

    for (rank, result) in text_results.iter().enumerate() {
        *scores.entry(result.chunk_key.as_str()).or_insert(0.0) += rrf_score(rank, config.text_weight, config.k);
        payloads.entry(result.chunk_key.as_str()).or_insert(result);
    }
    for (rank, result) in vector_results.iter().enumerate() {
        *scores.entry(result.chunk_key.as_str()).or_insert(0.0) += rrf_score(rank, config.vector_weight, config.k);
        payloads.entry(result.chunk_key.as_str()).or_insert(result);
    }

    let mut fused: Vec<SearchResult> = scores
        .into_iter()
        .map(|(key, score)| {
            let mut result = (*payloads[key]).clone();
            result.score = score;
            result
        })
        .collect();

    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    fused.truncate(limit);
    fused
}
