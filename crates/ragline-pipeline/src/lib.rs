//! Request orchestration: classify, retrieve, rerank, generate, log and
//! evaluate.
//!
//! Only two outcomes are terminal for the caller: nothing relevant was
//! retrieved (`AnswerStatus::NoRelevantContent`) and generation failed
//! (`PipelineError::Generation`). Every other failure is recorded as a
//! degradation and the request proceeds.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use ragline_classify::QueryClassifier;
use ragline_core::call::{run_blocking, CallError};
use ragline_core::classification::{QueryClassification, SearchStrategy, BUDGET, EXAMPLE};
use ragline_core::config::Settings;
use ragline_core::error::GenerationError;
use ragline_core::traits::{GenerationLog, Generator};
use ragline_core::types::{Degradation, Document, Filters, GenerationRecord};
use ragline_eval::{EvaluationReport, Evaluator};
use ragline_hybrid::HybridRetriever;
use ragline_rerank::{DocumentReranker, RerankExplanation};

pub mod log;
pub mod prompt;

pub use log::JsonlGenerationLog;

pub const NO_CONTENT_RESPONSE: &str = "Aucun contenu pertinent trouvé dans la base de connaissance.";

/// How long a one-shot runtime waits for pending generation log writes.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const LOG_CONTEXT_CHARS: usize = 1000;
const EXAMPLE_FINAL_K: usize = 6;
const BUDGET_FINAL_K: usize = 5;
const DEFAULT_FINAL_K: usize = 4;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    Answered,
    NoRelevantContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugBundle {
    pub search_strategy: SearchStrategy,
    pub initial_documents: usize,
    pub reranked_documents: usize,
    pub combined_filters: Filters,
    pub fell_back: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reranking_explanation: Option<RerankExplanation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degradations: Vec<Degradation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResult {
    pub status: AnswerStatus,
    pub response: String,
    pub documents_used: usize,
    pub classification: QueryClassification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<EvaluationReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugBundle>,
}

pub struct RagPipeline {
    classifier: QueryClassifier,
    retriever: HybridRetriever,
    reranker: DocumentReranker,
    generator: Arc<dyn Generator>,
    generation_timeout: Duration,
    evaluator: Option<Evaluator>,
    log: Option<Arc<dyn GenerationLog>>,
}

impl RagPipeline {
    pub fn new(
        classifier: QueryClassifier,
        retriever: HybridRetriever,
        reranker: DocumentReranker,
        generator: Arc<dyn Generator>,
        settings: &Settings,
    ) -> Self {
        Self {
            classifier,
            retriever,
            reranker,
            generator,
            generation_timeout: Duration::from_secs(settings.generation.timeout_secs.max(1)),
            evaluator: None,
            log: None,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn with_log(mut self, log: Arc<dyn GenerationLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn classifier(&self) -> &QueryClassifier { &self.classifier }

    pub fn retriever(&self) -> &HybridRetriever { &self.retriever }

    pub async fn answer(&self, query: &str, filters: &Filters, debug: bool) -> Result<AnswerResult, PipelineError> {
        info!("Classifying query");
        let classification = self.classifier.classify(query).await;
        let strategy = &classification.search_strategy;
        let combined = combined_filters(filters, &classification);
        let search_text = if strategy.expand_query { classification.enhanced_query.as_str() } else { query };

        info!("Retrieving documents");
        let retrieval = self.retriever.retrieve(search_text, self.retriever.candidate_count(strategy.search_k), &combined).await;
        let mut degradations = classification.degradations.clone();
        degradations.extend(retrieval.degradations.iter().cloned());

        if retrieval.is_empty() {
            info!("No relevant content for query");
            let debug = debug.then(|| DebugBundle {
                search_strategy: strategy.clone(),
                initial_documents: 0,
                reranked_documents: 0,
                combined_filters: combined.clone(),
                fell_back: retrieval.fell_back,
                reranking_explanation: None,
                final_metadata: None,
                degradations: degradations.clone(),
            });
            return Ok(AnswerResult {
                status: AnswerStatus::NoRelevantContent,
                response: NO_CONTENT_RESPONSE.to_string(),
                documents_used: 0,
                classification,
                evaluation: None,
                debug,
            });
        }

        let initial_documents = retrieval.documents.len();
        let k = final_k(&classification).min(initial_documents);
        info!("Reranking {} documents down to {}", initial_documents, k);
        let reranked = self.reranker.rerank(query, retrieval.documents, &classification, k).await;
        degradations.extend(reranked.degradations.iter().cloned());
        let documents = reranked.into_documents();

        let context = documents.iter().map(|d| d.content.as_str()).collect::<Vec<_>>().join("\n\n");
        let metadata = final_metadata(&documents, &classification, initial_documents, &combined);
        let prompt = prompt::build_prompt(query, &context, &metadata, &classification, &combined);

        info!("Generating response");
        let generator = Arc::clone(&self.generator);
        let timeout = self.generation_timeout;
        let response = run_blocking("generation", timeout, move || generator.generate(&prompt))
            .await
            .map_err(|e| match e {
                CallError::Timeout { .. } => GenerationError::Timeout(timeout),
                CallError::Failed { error, .. } => error,
                CallError::Aborted { reason, .. } => GenerationError::Request(reason),
            })?;

        self.log_generation(query, &context, &metadata, &response);

        let evaluation = match &self.evaluator {
            Some(evaluator) => {
                let report = evaluator.evaluate(query, &response, &documents).await;
                degradations.extend(report.degradations.iter().cloned());
                Some(report)
            }
            None => None,
        };

        let debug = if debug {
            let explanation = self.reranker.explain(query, &documents, &classification).await;
            Some(DebugBundle {
                search_strategy: classification.search_strategy.clone(),
                initial_documents,
                reranked_documents: documents.len(),
                combined_filters: combined,
                fell_back: retrieval.fell_back,
                reranking_explanation: Some(explanation),
                final_metadata: Some(metadata),
                degradations,
            })
        } else {
            None
        };

        Ok(AnswerResult {
            status: AnswerStatus::Answered,
            response,
            documents_used: documents.len(),
            classification,
            evaluation,
            debug,
        })
    }

    /// Hands the record to the sink on the blocking pool without waiting.
    fn log_generation(&self, query: &str, context: &str, metadata: &serde_json::Value, response: &str) {
        let Some(log) = &self.log else { return };
        let record = GenerationRecord {
            timestamp: chrono::Utc::now(),
            query: query.to_string(),
            context: context.chars().take(LOG_CONTEXT_CHARS).collect(),
            metadata: metadata.clone(),
            response: response.to_string(),
        };
        let log = Arc::clone(log);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = log.record(&record) {
                warn!("Failed to record generation: {:#}", e);
            }
        });
    }
}

/// Drives `future` on a fresh runtime, then gives detached blocking work
/// (the generation log write) up to `grace` to finish before the runtime
/// is torn down.
pub fn run_to_completion<F: std::future::Future>(future: F, grace: Duration) -> std::io::Result<F::Output> {
    let rt = tokio::runtime::Runtime::new()?;
    let output = rt.block_on(future);
    rt.shutdown_timeout(grace);
    Ok(output)
}

/// Caller filters, plus the first detected sector and domain when the
/// strategy asks for filtering. Caller values win.
pub fn combined_filters(filters: &Filters, classification: &QueryClassification) -> Filters {
    let mut combined = filters.clone();
    if classification.search_strategy.use_filters {
        let entities = &classification.entities;
        for (key, first) in [("secteur", entities.sectors.first()), ("domaine", entities.domains.first())] {
            let caller_set = combined.get(key).is_some_and(|v| !v.trim().is_empty());
            if let (Some(value), false) = (first, caller_set) {
                combined.insert(key.to_string(), value.clone());
            }
        }
    }
    debug!("Combined filters: {:?}", combined);
    combined
}

/// Documents kept after reranking, before bounding by the candidate count.
pub fn final_k(classification: &QueryClassification) -> usize {
    if classification.has_type(EXAMPLE) {
        EXAMPLE_FINAL_K
    } else if classification.has_type(BUDGET) {
        BUDGET_FINAL_K
    } else {
        DEFAULT_FINAL_K
    }
}

/// Metadata of the selected documents (later documents override earlier
/// keys) merged with a summary of the classification.
pub fn final_metadata(
    documents: &[Document],
    classification: &QueryClassification,
    documents_analyzed: usize,
    filters: &Filters,
) -> serde_json::Value {
    let mut merged = serde_json::Map::new();
    for doc in documents {
        for (k, v) in doc.metadata.to_meta() {
            merged.insert(k, serde_json::Value::String(v));
        }
    }
    merged.insert("query_type".into(), serde_json::json!(classification.query_type));
    merged.insert("query_complexity".into(), serde_json::json!(classification.complexity.level.as_str()));
    merged.insert(
        "ai_classification".into(),
        serde_json::to_value(&classification.ai_classification).unwrap_or(serde_json::Value::Null),
    );
    merged.insert("reranking_applied".into(), serde_json::Value::Bool(true));
    merged.insert("documents_analyzed".into(), serde_json::json!(documents_analyzed));
    merged.insert("documents_selected".into(), serde_json::json!(documents.len()));
    if !filters.is_empty() {
        merged.insert("filtres_appliques".into(), serde_json::json!(filters));
    }
    serde_json::Value::Object(merged)
}
