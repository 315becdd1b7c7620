//! Hybrid lexical + dense retrieval.
//!
//! Both branches run concurrently on the blocking pool under a timeout. Their
//! hits are fused, resolved to documents, post-filtered against the full
//! filter map and deduplicated by content. When filters eliminate every
//! candidate, retrieval is re-run without them.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use ragline_core::call::run_blocking;
use ragline_core::config::RetrievalSettings;
use ragline_core::traits::{Embedder, TextIndexer, VectorIndexer};
use ragline_core::types::{DegradationKind, Degradation, DocId, Document, Filters, SearchHit};

pub mod fusion;

pub use fusion::FusionStrategy;

/// Outcome of one retrieval.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    pub documents: Vec<Document>,
    /// Filters eliminated every candidate and the unfiltered set was used.
    pub fell_back: bool,
    /// The returned documents satisfy the requested filters.
    pub filtered: bool,
    pub degradations: Vec<Degradation>,
}

impl Retrieval {
    pub fn is_empty(&self) -> bool { self.documents.is_empty() }
}

pub struct HybridRetriever {
    text: Arc<dyn TextIndexer>,
    vector: Arc<dyn VectorIndexer>,
    embedder: Arc<dyn Embedder>,
    corpus: Arc<HashMap<DocId, Document>>,
    fusion: FusionStrategy,
    settings: RetrievalSettings,
}

impl HybridRetriever {
    /// Wrap indexes that already hold `documents`.
    pub fn new(
        text: Arc<dyn TextIndexer>,
        vector: Arc<dyn VectorIndexer>,
        embedder: Arc<dyn Embedder>,
        documents: Vec<Document>,
        settings: RetrievalSettings,
    ) -> Self {
        let mut corpus: HashMap<DocId, Document> = HashMap::with_capacity(documents.len());
        for doc in documents {
            match corpus.entry(doc.id.clone()) {
                Entry::Occupied(_) => warn!("Duplicate document id {}; keeping the first occurrence", doc.id),
                Entry::Vacant(slot) => {
                    slot.insert(doc);
                }
            }
        }
        Self { text, vector, embedder, corpus: Arc::new(corpus), fusion: FusionStrategy::from_settings(&settings), settings }
    }

    /// Embed and index `documents` into both indexes, then wrap them.
    /// Blocking; run it before serving or on the blocking pool.
    pub fn build(
        text: Arc<dyn TextIndexer>,
        vector: Arc<dyn VectorIndexer>,
        embedder: Arc<dyn Embedder>,
        documents: Vec<Document>,
        settings: RetrievalSettings,
    ) -> Result<Self> {
        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let embeddings = embedder.embed_batch(&texts)?;
        if let Some(e) = embeddings.iter().find(|e| e.len() != embedder.dim()) {
            anyhow::bail!("embedder returned dim {} but declares {}", e.len(), embedder.dim());
        }
        vector.index(&documents, &embeddings)?;
        text.index(&documents)?;
        info!("Indexed {} documents (lexical + dense)", documents.len());
        Ok(Self::new(text, vector, embedder, documents, settings))
    }

    pub fn with_fusion(mut self, fusion: FusionStrategy) -> Self {
        self.fusion = fusion;
        self
    }

    pub fn corpus_size(&self) -> usize { self.corpus.len() }

    /// Candidates requested from each source for a strategy's `search_k`.
    pub fn candidate_count(&self, search_k: usize) -> usize {
        search_k.clamp(self.settings.min_candidates, self.settings.max_candidates)
    }

    /// Up to `top_k` documents for `query` matching `filters`. When the
    /// filters eliminate every candidate, the same `query` text is searched
    /// again without them; callers wanting the raw query for that second pass
    /// must pass it here.
    pub async fn retrieve(&self, query: &str, top_k: usize, filters: &Filters) -> Retrieval {
        let active: Filters = filters.iter().filter(|(_, v)| !v.trim().is_empty()).map(|(k, v)| (k.clone(), v.clone())).collect();
        if top_k == 0 { return Retrieval::default(); }

        if active.is_empty() {
            let (documents, degradations) = self.search_once(query, top_k, &active).await;
            return Retrieval { documents, fell_back: false, filtered: false, degradations };
        }

        let (documents, mut degradations) = self.search_once(query, top_k, &active).await;
        if !documents.is_empty() {
            debug!("Filtered retrieval kept {} documents", documents.len());
            return Retrieval { documents, fell_back: false, filtered: true, degradations };
        }

        info!("No document matches filters {:?}; retrying without filters", active);
        let (documents, more) = self.search_once(query, top_k, &Filters::new()).await;
        degradations.extend(more);
        Retrieval { documents, fell_back: true, filtered: false, degradations }
    }

    async fn search_once(&self, query: &str, top_k: usize, filters: &Filters) -> (Vec<Document>, Vec<Degradation>) {
        let timeout = Duration::from_millis(self.settings.source_timeout_ms);
        let mut degradations = Vec::new();

        let lexical = {
            let text = Arc::clone(&self.text);
            let (q, f) = (query.to_string(), filters.clone());
            run_blocking("lexical search", timeout, move || text.search(&q, top_k, &f))
        };
        let dense = {
            let vector = Arc::clone(&self.vector);
            let embedder = Arc::clone(&self.embedder);
            let (q, f) = (query.to_string(), filters.clone());
            run_blocking("dense search", timeout, move || {
                let q_vec = embedder
                    .embed_batch(&[q])?
                    .into_iter()
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("embedder returned no vector for the query"))?;
                vector.search_vec(&q_vec, top_k, &f)
            })
        };
        let (lexical, dense) = tokio::join!(lexical, dense);

        let mut take = |branch: Result<Vec<SearchHit>, ragline_core::call::CallError<anyhow::Error>>| match branch {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Retrieval source failed: {}", e);
                degradations.push(Degradation::new(DegradationKind::RetrievalSourceFailed, e.to_string()));
                Vec::new()
            }
        };
        let lexical_hits = take(lexical);
        let dense_hits = take(dense);
        debug!("Lexical hits: {}, dense hits: {}", lexical_hits.len(), dense_hits.len());

        let fused = self.fusion.fuse(&lexical_hits, &dense_hits);
        (self.resolve(&fused, filters, top_k), degradations)
    }

    /// Ids → documents, keeping those matching `filters`, first occurrence of
    /// each content only, at most `top_k`.
    fn resolve(&self, ids: &[DocId], filters: &Filters, top_k: usize) -> Vec<Document> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();
        for id in ids {
            let Some(doc) = self.corpus.get(id) else {
                debug!("Hit {} is not in the loaded corpus", id);
                continue;
            };
            if !doc.metadata.matches(filters) || !seen.insert(doc.content.as_str()) { continue; }
            out.push(doc.clone());
            if out.len() == top_k { break; }
        }
        out
    }
}
