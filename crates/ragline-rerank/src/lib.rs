//! Post-retrieval multi-criteria reranking.
//!
//! Each candidate gets four sub-scores (semantic similarity, keyword
//! overlap, metadata relevance, document quality) combined with configurable
//! weights that must sum to 1.0. Ordering is a stable descending sort, so
//! ties keep the retrieval order.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use ragline_core::call::run_blocking;
use ragline_core::classification::QueryClassification;
use ragline_core::config::{RerankSettings, RerankWeights};
use ragline_core::similarity::unit_cosine;
use ragline_core::traits::Embedder;
use ragline_core::types::{Degradable, Degradation, DegradationKind, Document, Meta};

pub mod scoring;

const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum RerankError {
    #[error("invalid rerank weights: {0}")]
    InvalidWeights(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub semantic_similarity: f32,
    pub keyword_overlap: f32,
    pub metadata_relevance: f32,
    pub document_quality: f32,
    /// Semantic similarity was zeroed because embedding failed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub semantic_degraded: bool,
}

impl ScoreBreakdown {
    pub fn weighted(&self, w: &RerankWeights) -> f32 {
        let score = self.semantic_similarity * w.semantic_similarity
            + self.keyword_overlap * w.keyword_overlap
            + self.metadata_relevance * w.metadata_relevance
            + self.document_quality * w.document_quality;
        if score.is_finite() { score } else { 0.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedDocument {
    pub document: Document,
    pub score: f32,
    /// 1-based position in the reranked list.
    pub rank: usize,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RerankedResult {
    pub documents: Vec<RankedDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degradations: Vec<Degradation>,
}

impl RerankedResult {
    pub fn into_documents(self) -> Vec<Document> { self.documents.into_iter().map(|r| r.document).collect() }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentExplanation {
    pub document_index: usize,
    pub final_score: f32,
    pub detail_scores: ScoreBreakdown,
    pub content_preview: String,
    pub metadata: Meta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankExplanation {
    pub query: String,
    pub reranking_weights: RerankWeights,
    pub document_explanations: Vec<DocumentExplanation>,
}

pub struct DocumentReranker {
    embedder: Arc<dyn Embedder>,
    weights: RerankWeights,
    embed_timeout: Duration,
}

impl DocumentReranker {
    pub fn new(embedder: Arc<dyn Embedder>, settings: &RerankSettings) -> Result<Self, RerankError> {
        settings.weights.validate().map_err(RerankError::InvalidWeights)?;
        Ok(Self { embedder, weights: settings.weights, embed_timeout: Duration::from_millis(settings.embed_timeout_ms) })
    }

    pub fn weights(&self) -> &RerankWeights { &self.weights }

    /// Rank `documents` and keep the best `min(top_k, len)`.
    pub async fn rerank(&self, query: &str, documents: Vec<Document>, classification: &QueryClassification, top_k: usize) -> RerankedResult {
        if documents.is_empty() || top_k == 0 { return RerankedResult::default(); }
        let similarities = self.semantic_similarities(query, &documents).await;
        let breakdowns = self.score_with(query, &documents, classification, &similarities);
        let (_, degradation) = similarities.into_parts();

        let mut scored: Vec<(Document, ScoreBreakdown, f32)> = documents
            .into_iter()
            .zip(breakdowns)
            .map(|(doc, b)| {
                let score = b.weighted(&self.weights);
                (doc, b, score)
            })
            .collect();
        scored.sort_by(|a, b| b.2.total_cmp(&a.2));

        let documents: Vec<RankedDocument> = scored
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(i, (document, breakdown, score))| RankedDocument { document, score, rank: i + 1, breakdown })
            .collect();
        debug!("Reranked to {} documents", documents.len());
        RerankedResult { documents, degradations: degradation.into_iter().collect() }
    }

    /// Per-document sub-scores in input order; does not reorder anything.
    pub async fn explain(&self, query: &str, documents: &[Document], classification: &QueryClassification) -> RerankExplanation {
        let similarities = self.semantic_similarities(query, documents).await;
        let document_explanations = self
            .score_with(query, documents, classification, &similarities)
            .into_iter()
            .zip(documents)
            .enumerate()
            .map(|(i, (detail_scores, doc))| DocumentExplanation {
                document_index: i,
                final_score: detail_scores.weighted(&self.weights),
                detail_scores,
                content_preview: doc.preview(PREVIEW_CHARS),
                metadata: doc.metadata.to_meta(),
            })
            .collect();
        RerankExplanation { query: query.to_string(), reranking_weights: self.weights, document_explanations }
    }

    /// Sub-scores given precomputed semantic similarities (one per document).
    pub fn score_with(
        &self,
        query: &str,
        documents: &[Document],
        classification: &QueryClassification,
        similarities: &Degradable<Vec<f32>>,
    ) -> Vec<ScoreBreakdown> {
        documents
            .iter()
            .enumerate()
            .map(|(i, doc)| ScoreBreakdown {
                semantic_similarity: similarities.value.get(i).copied().unwrap_or(0.0),
                keyword_overlap: scoring::keyword_overlap(query, &doc.content),
                metadata_relevance: scoring::metadata_relevance(&doc.metadata, classification),
                document_quality: scoring::document_quality(&doc.content),
                semantic_degraded: similarities.is_degraded(),
            })
            .collect()
    }

    /// Query and documents embedded in one batch; zeros on failure.
    async fn semantic_similarities(&self, query: &str, documents: &[Document]) -> Degradable<Vec<f32>> {
        let mut texts = Vec::with_capacity(documents.len() + 1);
        texts.push(query.to_string());
        texts.extend(documents.iter().map(|d| d.content.clone()));
        let expected = texts.len();
        let embedder = Arc::clone(&self.embedder);

        let outcome = run_blocking("rerank embedding", self.embed_timeout, move || embedder.embed_batch(&texts))
            .await
            .map_err(|e| e.to_string())
            .and_then(|vectors| {
                if vectors.len() == expected { Ok(vectors) } else { Err(format!("expected {} embeddings, got {}", expected, vectors.len())) }
            });
        match outcome {
            Ok(vectors) => {
                let (q, docs) = vectors.split_at(1);
                Degradable::ok(docs.iter().map(|d| unit_cosine(&q[0], d)).collect())
            }
            Err(reason) => {
                warn!("Semantic similarity degraded: {}", reason);
                Degradable::degraded(vec![0.0; documents.len()], DegradationKind::RerankDegraded, reason)
            }
        }
    }
}
