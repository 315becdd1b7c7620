//! Metric functions over precomputed embeddings and raw text.

use ragline_core::similarity::{clamp_unit, cosine, mean, unit_cosine};

const COMPLETE_WORDS: f32 = 100.0;
const COMPLETE_SENTENCES: f32 = 5.0;

/// `1 - mean pairwise cosine`; 1.0 for fewer than two vectors.
pub fn context_diversity(vectors: &[Vec<f32>]) -> f32 {
    if vectors.len() < 2 { return 1.0; }
    let mut sims = Vec::with_capacity(vectors.len() * (vectors.len() - 1) / 2);
    for (i, a) in vectors.iter().enumerate() {
        for b in &vectors[i + 1..] {
            sims.push(cosine(a, b));
        }
    }
    clamp_unit(1.0 - mean(&sims))
}

pub fn sentence_count(text: &str) -> usize {
    text.split(['.', '!', '?']).filter(|s| !s.trim().is_empty()).count()
}

/// Mean of the word-count and sentence-count saturations.
pub fn answer_completeness(answer: &str) -> f32 {
    let words = answer.split_whitespace().count() as f32;
    let sentences = sentence_count(answer) as f32;
    clamp_unit(((words / COMPLETE_WORDS).min(1.0) + (sentences / COMPLETE_SENTENCES).min(1.0)) / 2.0)
}

/// Mean similarity of `query` to each document vector.
pub fn mean_relevance(query: &[f32], documents: &[Vec<f32>]) -> f32 {
    let sims: Vec<f32> = documents.iter().map(|d| unit_cosine(query, d)).collect();
    clamp_unit(mean(&sims))
}

/// Share of `from` vectors whose best match in `against` reaches `threshold`.
pub fn matched_share(from: &[Vec<f32>], against: &[Vec<f32>], threshold: f32) -> f32 {
    if from.is_empty() || against.is_empty() { return 0.0; }
    let matched = from
        .iter()
        .filter(|f| against.iter().map(|a| cosine(f, a)).fold(f32::NEG_INFINITY, f32::max) >= threshold)
        .count();
    matched as f32 / from.len() as f32
}
