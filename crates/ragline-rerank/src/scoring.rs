//! The four per-document criteria. Each returns a value in `[0, 1]`.

use std::collections::HashSet;

use ragline_core::classification::QueryClassification;
use ragline_core::types::DocumentMetadata;

const STOP_WORDS: &[&str] = &[
    "le", "la", "les", "un", "une", "des", "de", "du", "et", "ou", "à", "dans", "pour", "sur", "avec", "par", "ce", "qui",
    "que", "dont", "où",
];

const BUSINESS_KEYWORDS: &[&str] = &["client", "projet", "livrable", "méthodologie", "équipe", "expertise", "solution"];

const STRUCTURE_MARKERS: &[&str] = &["\n-", "\n•", "\n1.", "\n2.", "##", "###"];

fn content_words(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity of content-word sets; 0 when the query has none.
pub fn keyword_overlap(query: &str, content: &str) -> f32 {
    let q = content_words(query);
    if q.is_empty() { return 0.0; }
    let d = content_words(content);
    let union = q.union(&d).count();
    if union == 0 { return 0.0; }
    q.intersection(&d).count() as f32 / union as f32
}

fn same_label(a: &str, b: &str) -> bool { a.trim().to_lowercase() == b.trim().to_lowercase() }

pub fn metadata_relevance(metadata: &DocumentMetadata, classification: &QueryClassification) -> f32 {
    let ai = &classification.ai_classification;
    let mut score = 0.0f32;
    if let (Some(expected), Some(actual)) = (&ai.probable_sector, &metadata.sector) {
        if same_label(expected, actual) { score += 0.3; }
    }
    if let Some(domain) = &metadata.domain {
        if classification.entities.domains.iter().any(|d| same_label(d, domain)) { score += 0.3; }
    }
    if let (Some(expected), Some(actual)) = (&ai.project_type, &metadata.project_type) {
        if same_label(expected, actual) { score += 0.2; }
    }
    if classification.budget_intent() && metadata.has_budget_info() { score += 0.2; }
    score.min(1.0)
}

pub fn length_score(len: usize) -> f32 {
    match len {
        100..=2000 => 1.0,
        0..=99 => len as f32 / 100.0,
        _ => (2000.0 / len as f32).max(0.5),
    }
}

pub fn document_quality(content: &str) -> f32 {
    let length = length_score(content.chars().count());
    let lowered = content.to_lowercase();
    let keywords = BUSINESS_KEYWORDS.iter().filter(|k| lowered.contains(*k)).count();
    let richness = (keywords as f32 / BUSINESS_KEYWORDS.len() as f32).min(1.0);
    let markers = STRUCTURE_MARKERS.iter().filter(|m| content.contains(*m)).count();
    let structure = (markers as f32 / 3.0).min(1.0);
    (length + richness + structure) / 3.0
}
