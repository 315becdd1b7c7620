use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use proptest::prelude::*;
use ragline_core::config::RetrievalSettings;
use ragline_core::data_processor::DataProcessor;
use ragline_core::similarity::cosine;
use ragline_core::traits::{Embedder, TextIndexer, VectorIndexer};
use ragline_core::types::{DegradationKind, Document, DocumentMetadata, Filters, SearchHit, SourceKind};
use ragline_embed::HashEmbedder;
use ragline_hybrid::{FusionStrategy, HybridRetriever};
use ragline_text::TantivyIndexer;

/// Returns a fixed id list for every query.
struct FixedIndex {
    ids: Vec<String>,
    fail: bool,
    delay: Option<Duration>,
}

impl FixedIndex {
    fn new(ids: &[&str]) -> Self { Self { ids: ids.iter().map(|s| s.to_string()).collect(), fail: false, delay: None } }

    fn hits(&self, k: usize, source: SourceKind) -> anyhow::Result<Vec<SearchHit>> {
        if let Some(d) = self.delay { std::thread::sleep(d); }
        if self.fail { anyhow::bail!("index unavailable"); }
        Ok(self.ids.iter().take(k).map(|id| SearchHit { id: id.clone(), score: 1.0, source }).collect())
    }
}

impl TextIndexer for FixedIndex {
    fn index(&self, _documents: &[Document]) -> anyhow::Result<()> { Ok(()) }
    fn search(&self, _query: &str, k: usize, _filters: &Filters) -> anyhow::Result<Vec<SearchHit>> { self.hits(k, SourceKind::Lexical) }
}

impl VectorIndexer for FixedIndex {
    fn index(&self, _documents: &[Document], _embeddings: &[Vec<f32>]) -> anyhow::Result<()> { Ok(()) }
    fn search_vec(&self, _q: &[f32], k: usize, _filters: &Filters) -> anyhow::Result<Vec<SearchHit>> { self.hits(k, SourceKind::Dense) }
}

/// Remembers every query text it is asked for.
#[derive(Default)]
struct RecordingTextIndex {
    queries: Mutex<Vec<String>>,
}

impl TextIndexer for RecordingTextIndex {
    fn index(&self, _documents: &[Document]) -> anyhow::Result<()> { Ok(()) }
    fn search(&self, query: &str, k: usize, _filters: &Filters) -> anyhow::Result<Vec<SearchHit>> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(["a", "b"].iter().take(k).map(|id| SearchHit { id: id.to_string(), score: 1.0, source: SourceKind::Lexical }).collect())
    }
}

/// Brute-force cosine index; ignores filters.
#[derive(Default)]
struct MemoryVectorIndex {
    rows: Mutex<Vec<(String, Vec<f32>)>>,
}

impl VectorIndexer for MemoryVectorIndex {
    fn index(&self, documents: &[Document], embeddings: &[Vec<f32>]) -> anyhow::Result<()> {
        let mut rows = self.rows.lock().unwrap();
        *rows = documents.iter().map(|d| d.id.clone()).zip(embeddings.iter().cloned()).collect();
        Ok(())
    }

    fn search_vec(&self, q: &[f32], k: usize, _filters: &Filters) -> anyhow::Result<Vec<SearchHit>> {
        let rows = self.rows.lock().unwrap();
        let mut hits: Vec<SearchHit> = rows
            .iter()
            .map(|(id, v)| SearchHit { id: id.clone(), score: cosine(q, v), source: SourceKind::Dense })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }
}

fn doc(id: &str, content: &str, sector: &str) -> Document {
    Document::new(id, content).with_metadata(DocumentMetadata { sector: Some(sector.to_string()), ..DocumentMetadata::default() })
}

fn corpus() -> Vec<Document> {
    vec![
        doc("a", "Migration cloud pour une banque", "banque"),
        doc("b", "Refonte du portail assurance", "assurance"),
        doc("c", "Migration cloud pour une banque", "banque"),
        doc("d", "Audit de sécurité industrielle", "industrie"),
    ]
}

fn retriever(text: FixedIndex, vector: FixedIndex, settings: RetrievalSettings) -> HybridRetriever {
    HybridRetriever::new(Arc::new(text), Arc::new(vector), Arc::new(HashEmbedder::new(32)), corpus(), settings)
}

fn filters(pairs: &[(&str, &str)]) -> Filters {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn ids(docs: &[Document]) -> Vec<&str> { docs.iter().map(|d| d.id.as_str()).collect() }

#[tokio::test]
async fn concatenates_lexical_then_dense_and_dedups_content() {
    let r = retriever(FixedIndex::new(&["a", "b"]), FixedIndex::new(&["c", "d", "a"]), RetrievalSettings::default());
    let out = r.retrieve("migration", 10, &Filters::new()).await;
    assert_eq!(ids(&out.documents), vec!["a", "b", "d"]);
    assert!(!out.fell_back && !out.filtered);
    assert!(out.degradations.is_empty());
}

#[tokio::test]
async fn truncates_to_top_k() {
    let r = retriever(FixedIndex::new(&["a", "b"]), FixedIndex::new(&["d"]), RetrievalSettings::default());
    let out = r.retrieve("q", 2, &Filters::new()).await;
    assert_eq!(ids(&out.documents), vec!["a", "b"]);
}

#[tokio::test]
async fn post_filters_every_hit() {
    let r = retriever(FixedIndex::new(&["a", "b"]), FixedIndex::new(&["d"]), RetrievalSettings::default());
    let out = r.retrieve("q", 10, &filters(&[("secteur", "banque")])).await;
    assert_eq!(ids(&out.documents), vec!["a"]);
    assert!(out.filtered && !out.fell_back);
}

#[tokio::test]
async fn falls_back_when_filters_eliminate_everything() {
    let r = retriever(FixedIndex::new(&["a", "b"]), FixedIndex::new(&["d"]), RetrievalSettings::default());
    let out = r.retrieve("q", 10, &filters(&[("secteur", "santé")])).await;
    assert!(out.fell_back);
    assert!(!out.filtered);
    assert_eq!(ids(&out.documents), vec!["a", "b", "d"]);
}

#[tokio::test]
async fn fallback_searches_the_same_text_it_was_given() {
    let text = Arc::new(RecordingTextIndex::default());
    let r = HybridRetriever::new(
        text.clone(),
        Arc::new(FixedIndex::new(&[])),
        Arc::new(HashEmbedder::new(32)),
        corpus(),
        RetrievalSettings::default(),
    );
    let out = r.retrieve("migration cloud banque bancaire", 10, &filters(&[("secteur", "santé")])).await;
    assert!(out.fell_back);
    assert_eq!(*text.queries.lock().unwrap(), vec!["migration cloud banque bancaire"; 2]);
}

#[tokio::test]
async fn blank_filter_values_do_not_trigger_filtering() {
    let r = retriever(FixedIndex::new(&["b"]), FixedIndex::new(&[]), RetrievalSettings::default());
    let out = r.retrieve("q", 10, &filters(&[("secteur", " ")])).await;
    assert_eq!(ids(&out.documents), vec!["b"]);
    assert!(!out.filtered && !out.fell_back);
}

#[tokio::test]
async fn failing_branch_degrades_but_other_branch_answers() {
    let mut dense = FixedIndex::new(&["d"]);
    dense.fail = true;
    let r = retriever(FixedIndex::new(&["b"]), dense, RetrievalSettings::default());
    let out = r.retrieve("q", 10, &Filters::new()).await;
    assert_eq!(ids(&out.documents), vec!["b"]);
    assert_eq!(out.degradations.len(), 1);
    assert_eq!(out.degradations[0].kind, DegradationKind::RetrievalSourceFailed);
    assert!(out.degradations[0].reason.contains("dense search"));
}

#[tokio::test]
async fn slow_branch_times_out() {
    let mut text = FixedIndex::new(&["b"]);
    text.delay = Some(Duration::from_millis(500));
    let settings = RetrievalSettings { source_timeout_ms: 50, ..RetrievalSettings::default() };
    let r = retriever(text, FixedIndex::new(&["d"]), settings);
    let out = r.retrieve("q", 10, &Filters::new()).await;
    assert_eq!(ids(&out.documents), vec!["d"]);
    assert!(out.degradations[0].reason.contains("timed out"));
}

#[tokio::test]
async fn both_sources_empty_is_not_an_error() {
    let r = retriever(FixedIndex::new(&[]), FixedIndex::new(&["unknown-id"]), RetrievalSettings::default());
    let out = r.retrieve("q", 10, &filters(&[("secteur", "banque")])).await;
    assert!(out.is_empty());
    assert!(out.fell_back);
}

#[tokio::test]
async fn reciprocal_rank_fusion_promotes_agreement() {
    let r = retriever(FixedIndex::new(&["b", "d"]), FixedIndex::new(&["d", "a"]), RetrievalSettings::default())
        .with_fusion(FusionStrategy::ReciprocalRank { k: 60 });
    let out = r.retrieve("q", 10, &Filters::new()).await;
    assert_eq!(ids(&out.documents), vec!["d", "b", "a"]);
}

#[test]
fn candidate_count_is_clamped() {
    let r = retriever(FixedIndex::new(&[]), FixedIndex::new(&[]), RetrievalSettings::default());
    assert_eq!(r.candidate_count(4), 8);
    assert_eq!(r.candidate_count(10), 10);
    assert_eq!(r.candidate_count(30), 12);
}

#[tokio::test]
async fn build_indexes_real_lexical_and_memory_dense() {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(128));
    let r = tokio::task::spawn_blocking(move || {
        HybridRetriever::build(
            Arc::new(TantivyIndexer::in_memory()?),
            Arc::new(MemoryVectorIndex::default()),
            embedder,
            corpus(),
            RetrievalSettings::default(),
        )
    })
    .await
    .unwrap()
    .expect("build");

    assert_eq!(r.corpus_size(), 4);
    let out = r.retrieve("portail assurance", 8, &Filters::new()).await;
    assert_eq!(out.documents.first().map(|d| d.id.as_str()), Some("b"));
    let contents: HashSet<&str> = out.documents.iter().map(|d| d.content.as_str()).collect();
    assert_eq!(contents.len(), out.documents.len());
}

#[tokio::test]
async fn same_stem_files_are_both_retrievable() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir(tmp.path().join("a")).unwrap();
    std::fs::create_dir(tmp.path().join("b")).unwrap();
    std::fs::write(tmp.path().join("a/notes.txt"), "Migration cloud alpha").unwrap();
    std::fs::write(tmp.path().join("b/notes.txt"), "Refonte portail bravo").unwrap();
    let documents = DataProcessor::new().load(tmp.path()).unwrap();

    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(128));
    let r = tokio::task::spawn_blocking(move || {
        HybridRetriever::build(
            Arc::new(TantivyIndexer::in_memory()?),
            Arc::new(MemoryVectorIndex::default()),
            embedder,
            documents,
            RetrievalSettings::default(),
        )
    })
    .await
    .unwrap()
    .expect("build");
    assert_eq!(r.corpus_size(), 2);

    let alpha = r.retrieve("alpha", 1, &Filters::new()).await;
    assert_eq!(alpha.documents[0].content, "Migration cloud alpha");
    let bravo = r.retrieve("bravo", 1, &Filters::new()).await;
    assert_eq!(bravo.documents[0].content, "Refonte portail bravo");
}

#[tokio::test]
async fn duplicate_ids_keep_the_first_document() {
    let docs = vec![Document::new("x", "premier"), Document::new("x", "second")];
    let r = HybridRetriever::new(
        Arc::new(FixedIndex::new(&["x"])),
        Arc::new(FixedIndex::new(&[])),
        Arc::new(HashEmbedder::new(8)),
        docs,
        RetrievalSettings::default(),
    );
    assert_eq!(r.corpus_size(), 1);
    let out = r.retrieve("q", 5, &Filters::new()).await;
    assert_eq!(out.documents[0].content, "premier");
}

proptest! {
    #[test]
    fn output_never_repeats_content(
        contents in proptest::collection::vec(0u8..4, 1..12),
        top_k in 1usize..8,
    ) {
        let docs: Vec<Document> = contents
            .iter()
            .enumerate()
            .map(|(i, c)| Document::new(format!("d{i}"), format!("contenu {c}")))
            .collect();
        let all: Vec<String> = docs.iter().map(|d| d.id.clone()).collect();
        let (front, back) = all.split_at(all.len() / 2);
        let text = FixedIndex { ids: front.to_vec(), fail: false, delay: None };
        let vector = FixedIndex { ids: back.iter().rev().cloned().collect(), fail: false, delay: None };
        let r = HybridRetriever::new(Arc::new(text), Arc::new(vector), Arc::new(HashEmbedder::new(8)), docs, RetrievalSettings::default());

        let rt = tokio::runtime::Runtime::new().unwrap();
        let out = rt.block_on(r.retrieve("contenu", top_k, &Filters::new()));

        let unique: HashSet<&str> = out.documents.iter().map(|d| d.content.as_str()).collect();
        prop_assert_eq!(unique.len(), out.documents.len());
        prop_assert!(out.documents.len() <= top_k);
    }
}
