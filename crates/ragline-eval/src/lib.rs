//! Reference-free answer evaluation, plus reference-based context metrics
//! for offline benchmarking.
//!
//! Every metric lies in `[0, 1]`. Embeddings for one evaluation come from a
//! single batch call; if that call fails, the embedding-based metrics are 0.0
//! and the report carries an `EvaluationDegraded` entry.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ragline_core::call::run_blocking;
use ragline_core::config::EvaluationSettings;
use ragline_core::similarity::{clamp_unit, unit_cosine};
use ragline_core::traits::Embedder;
use ragline_core::types::{Degradable, Degradation, DegradationKind, Document};

pub mod metrics;

pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.75;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub query_document_relevance: f32,
    pub answer_faithfulness: f32,
    pub answer_relevance: f32,
    pub context_diversity: f32,
    pub answer_completeness: f32,
    pub overall_score: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degradations: Vec<Degradation>,
}

impl EvaluationReport {
    fn finish(mut self) -> Self {
        self.overall_score = clamp_unit(
            0.25 * self.query_document_relevance
                + 0.25 * self.answer_faithfulness
                + 0.25 * self.answer_relevance
                + 0.125 * self.context_diversity
                + 0.125 * self.answer_completeness,
        );
        self
    }
}

/// Retrieved context compared against a hand-picked reference set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceReport {
    /// Share of reference passages matched by some retrieved passage.
    pub semantic_context_recall: f32,
    /// Share of retrieved passages matching some reference passage.
    pub semantic_precision: f32,
    /// Similarity of the joined retrieved text to the joined reference text.
    pub context_relevance: f32,
}

pub struct Evaluator {
    embedder: Arc<dyn Embedder>,
    timeout: Duration,
}

impl Evaluator {
    pub fn new(embedder: Arc<dyn Embedder>, settings: &EvaluationSettings) -> Self {
        Self { embedder, timeout: Duration::from_millis(settings.embed_timeout_ms) }
    }

    pub async fn evaluate(&self, query: &str, answer: &str, documents: &[Document]) -> EvaluationReport {
        if documents.is_empty() { return EvaluationReport::default(); }

        let context = documents.iter().map(|d| d.content.as_str()).collect::<Vec<_>>().join("\n");
        let mut texts = vec![query.to_string(), answer.to_string(), context];
        texts.extend(documents.iter().map(|d| d.content.clone()));

        let completeness = metrics::answer_completeness(answer);
        let vectors = match self.embed("evaluation embedding", texts).await {
            Ok(v) => v,
            Err(reason) => {
                warn!("Evaluation degraded: {}", reason);
                return EvaluationReport {
                    context_diversity: if documents.len() < 2 { 1.0 } else { 0.0 },
                    answer_completeness: completeness,
                    degradations: vec![Degradation::new(DegradationKind::EvaluationDegraded, reason)],
                    ..EvaluationReport::default()
                }
                .finish();
            }
        };

        let (q, a, ctx, docs) = (&vectors[0], &vectors[1], &vectors[2], &vectors[3..]);
        let report = EvaluationReport {
            query_document_relevance: metrics::mean_relevance(q, docs),
            answer_faithfulness: unit_cosine(a, ctx),
            answer_relevance: unit_cosine(q, a),
            context_diversity: metrics::context_diversity(docs),
            answer_completeness: completeness,
            overall_score: 0.0,
            degradations: Vec::new(),
        }
        .finish();
        debug!("Evaluation overall score {:.3}", report.overall_score);
        report
    }

    /// Reference-based metrics; all zero when either side is empty.
    pub async fn evaluate_against_reference(
        &self,
        retrieved: &[String],
        reference: &[String],
        threshold: f32,
    ) -> Degradable<ReferenceReport> {
        if retrieved.is_empty() || reference.is_empty() { return Degradable::ok(ReferenceReport::default()); }

        let mut texts = vec![retrieved.join("\n"), reference.join("\n")];
        texts.extend(retrieved.iter().cloned());
        texts.extend(reference.iter().cloned());

        match self.embed("reference embedding", texts).await {
            Ok(vectors) => {
                let (joined, rest) = vectors.split_at(2);
                let (ret, refs) = rest.split_at(retrieved.len());
                Degradable::ok(ReferenceReport {
                    semantic_context_recall: metrics::matched_share(refs, ret, threshold),
                    semantic_precision: metrics::matched_share(ret, refs, threshold),
                    context_relevance: unit_cosine(&joined[0], &joined[1]),
                })
            }
            Err(reason) => {
                warn!("Reference evaluation degraded: {}", reason);
                Degradable::degraded(ReferenceReport::default(), DegradationKind::EvaluationDegraded, reason)
            }
        }
    }

    async fn embed(&self, label: &'static str, texts: Vec<String>) -> Result<Vec<Vec<f32>>, String> {
        let expected = texts.len();
        let embedder = Arc::clone(&self.embedder);
        let vectors = run_blocking(label, self.timeout, move || embedder.embed_batch(&texts))
            .await
            .map_err(|e| e.to_string())?;
        if vectors.len() != expected {
            return Err(format!("expected {} embeddings, got {}", expected, vectors.len()));
        }
        Ok(vectors)
    }
}
