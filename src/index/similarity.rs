/// Cosine similarity of two equal-length vectors; `0.0` for degenerate input.
pub fn cosine_similarity(query: &[f32], candidate: &[f32]) -> f32 {
    if query.is_empty() || query.len() != candidate.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut query_norm = 0.0f64;
    let mut candidate_norm = 0.0f64;
    for (q, c) in query.iter().zip(candidate) {
        let (q, c) = (f64::from(*q), f64::from(*c));
        dot += q * c;
        query_norm += q * q;
        candidate_norm += c * c;
    }

    let denom = query_norm.sqrt() * candidate_norm.sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (dot / denom) as f32
}
