use crate::error::GenerationError;
use crate::types::{Document, Filters, GenerationRecord, SearchHit};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Sparse (term-frequency) index. Filters it cannot express natively are
/// ignored here; the retriever re-checks every hit.
pub trait TextIndexer: Send + Sync {
    fn index(&self, documents: &[Document]) -> anyhow::Result<()>;
    fn search(&self, query: &str, k: usize, filters: &Filters) -> anyhow::Result<Vec<SearchHit>>;
}

pub trait VectorIndexer: Send + Sync {
    fn index(&self, documents: &[Document], embeddings: &[Vec<f32>]) -> anyhow::Result<()>;
    fn search_vec(&self, query_vec: &[f32], k: usize, filters: &Filters) -> anyhow::Result<Vec<SearchHit>>;
}

pub trait Generator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Sink for completed generations. Callers treat failures as warnings.
pub trait GenerationLog: Send + Sync {
    fn record(&self, entry: &GenerationRecord) -> anyhow::Result<()>;
}
