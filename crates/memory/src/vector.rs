//! Vector similarity utilities.

use chatrelay_core::vector_store::Document;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 for empty, mismatched or zero-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank documents by cosine similarity to a query embedding.
///
/// Documents without an embedding, or scoring below `min_score`, are
/// skipped. The result is sorted best first with `score` filled in and the
/// embedding stripped, truncated to `limit`.
pub fn rank_documents(
    documents: &[Document],
    query_embedding: &[f32],
    limit: usize,
    min_score: f32,
) -> Vec<Document> {
    let mut scored: Vec<Document> = documents
        .iter()
        .filter_map(|doc| {
            let sim = cosine_similarity(doc.embedding.as_ref()?, query_embedding);
            (sim >= min_score).then(|| Document {
                score: sim,
                embedding: None,
                ..doc.clone()
            })
        })
        .collect();

    // Stable sort keeps insertion order among equal scores
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}
