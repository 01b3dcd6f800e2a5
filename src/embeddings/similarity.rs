/// Cosine similarity between two vectors.
///
/// Accumulates in `f64` and clamps to `[-1, 1]`. Returns 0.0 when either vector
/// is empty or all-zero, or when the lengths differ, so the result is never NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f64::EPSILON {
        0.0
    } else {
        #[allow(clippy::cast_possible_truncation)]
        let similarity = (dot / denom).clamp(-1.0, 1.0) as f32;
        similarity
    }
}
