//! Vector helpers shared by the reranker and the evaluator.

/// Cosine similarity; 0.0 for empty, mismatched or zero-norm inputs.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() { return 0.0; }
    let (mut dot, mut na, mut nb) = (0f32, 0f32, 0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    let denom = na.sqrt() * nb.sqrt();
    if denom <= f32::EPSILON { return 0.0; }
    let sim = dot / denom;
    if sim.is_finite() { sim } else { 0.0 }
}

/// Cosine similarity clamped into `[0, 1]`.
pub fn unit_cosine(a: &[f32], b: &[f32]) -> f32 { clamp_unit(cosine(a, b)) }

/// Clamp into `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(x: f32) -> f32 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() { 0.0 } else { values.iter().sum::<f32>() / values.len() as f32 }
}
