//! `ragline` command line: answer, classify or retrieve against a corpus.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ragline_classify::QueryClassifier;
use ragline_core::config::{Config, LogFormat, LoggingSettings, Settings};
use ragline_core::data_processor::{ChunkingConfig, DataProcessor};
use ragline_core::taxonomy::Taxonomy;
use ragline_core::traits::{Embedder, Generator};
use ragline_core::types::Filters;
use ragline_embed::get_default_embedder;
use ragline_eval::Evaluator;
use ragline_hybrid::HybridRetriever;
use ragline_llm::ChatCompletionsGenerator;
use ragline_pipeline::{run_to_completion, AnswerStatus, JsonlGenerationLog, RagPipeline, SHUTDOWN_GRACE};
use ragline_rerank::DocumentReranker;
use ragline_text::TantivyIndexer;
use ragline_vector::LanceDenseIndex;

#[derive(Parser, Debug)]
#[command(name = "ragline", version, about = "Retrieval, classification and reranking over a consulting corpus")]
struct Cli {
    /// Directory holding config.toml
    #[arg(long, global = true, default_value = ".", env = "RAGLINE_CONFIG_DIR")]
    config_dir: PathBuf,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer a question from the corpus
    Ask {
        query: String,
        /// Metadata filter, repeatable (`secteur=banque`)
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
        #[arg(long)]
        debug: bool,
    },
    /// Show how a query is classified
    Classify {
        query: String,
        /// Skip the model-based sub-classification
        #[arg(long)]
        offline: bool,
    },
    /// Run hybrid retrieval only
    Retrieve {
        query: String,
        #[arg(long, default_value_t = 8)]
        k: usize,
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw.split_once('=').ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.trim().is_empty() { return Err(format!("empty filter key in '{raw}'")); }
    Ok((key.trim().to_string(), value.trim().to_string()))
}

fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry.with(fmt::layer().json().with_writer(std::io::stderr)).init(),
        LogFormat::Text => registry.with(fmt::layer().with_writer(std::io::stderr)).init(),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load_from(&cli.config_dir)?;
    let settings = config.settings()?;
    init_tracing(&settings.logging);

    match cli.command {
        Command::Classify { ref query, offline } => {
            let taxonomy = Taxonomy::load(&config.resolve(&settings.data.taxonomy))?;
            let generator = if offline { None } else { optional_generator(&settings) };
            let classifier = QueryClassifier::new(taxonomy, generator, settings.classifier.clone())?;
            let classification = run_to_completion(classifier.classify(query), SHUTDOWN_GRACE)?;
            println!("{}", serde_json::to_string_pretty(&classification)?);
        }
        Command::Retrieve { ref query, k, ref filters } => {
            let embedder = get_default_embedder(&settings.embedding)?;
            let retriever = build_retriever(&config, &settings, embedder)?;
            let filters: Filters = filters.iter().cloned().collect();
            let retrieval = run_to_completion(retriever.retrieve(query, k, &filters), SHUTDOWN_GRACE)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&retrieval.documents)?);
            } else {
                if retrieval.fell_back { println!("(no document matched the filters; showing unfiltered results)"); }
                for (i, doc) in retrieval.documents.iter().enumerate() {
                    println!("{}. [{}] {}", i + 1, doc.id, doc.preview(160));
                }
            }
        }
        Command::Ask { ref query, ref filters, debug } => {
            let generator: Arc<dyn Generator> = Arc::new(ChatCompletionsGenerator::from_settings(&settings.generation)?);
            let taxonomy = Taxonomy::load(&config.resolve(&settings.data.taxonomy))?;
            let classifier = QueryClassifier::new(taxonomy, Some(Arc::clone(&generator)), settings.classifier.clone())?;
            let embedder = get_default_embedder(&settings.embedding)?;
            let retriever = build_retriever(&config, &settings, Arc::clone(&embedder))?;
            let reranker = DocumentReranker::new(Arc::clone(&embedder), &settings.rerank)?;

            let mut pipeline = RagPipeline::new(classifier, retriever, reranker, generator, &settings)
                .with_log(Arc::new(JsonlGenerationLog::new(config.resolve(&settings.data.generation_log))));
            if settings.evaluation.enabled {
                pipeline = pipeline.with_evaluator(Evaluator::new(embedder, &settings.evaluation));
            }

            let filters: Filters = filters.iter().cloned().collect();
            let result = run_to_completion(pipeline.answer(query, &filters, debug), SHUTDOWN_GRACE)??;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.response);
                if result.status == AnswerStatus::Answered {
                    println!("\n({} documents used)", result.documents_used);
                }
                if let Some(report) = &result.evaluation {
                    println!("Evaluation overall score: {:.2}", report.overall_score);
                }
            }
        }
    }
    Ok(())
}

/// Generation client for the classifier, or `None` when unusable.
fn optional_generator(settings: &Settings) -> Option<Arc<dyn Generator>> {
    if !settings.classifier.ai_enabled { return None; }
    match ChatCompletionsGenerator::from_settings(&settings.generation) {
        Ok(g) => Some(Arc::new(g)),
        Err(e) => {
            warn!("AI classification disabled: {}", e);
            None
        }
    }
}

/// Load and chunk the corpus, then build both indexes. Runs outside any
/// async runtime.
fn build_retriever(config: &Config, settings: &Settings, embedder: Arc<dyn Embedder>) -> anyhow::Result<HybridRetriever> {
    let corpus = config.resolve(&settings.data.corpus);
    let processor = DataProcessor::with_chunking(ChunkingConfig {
        max_chars: settings.data.chunk_chars,
        overlap_chars: settings.data.overlap_chars,
    });
    let documents = processor.load(&corpus).with_context(|| format!("loading corpus {}", corpus.display()))?;
    info!("Loaded {} chunks from {}", documents.len(), corpus.display());

    let lance_dir = config.resolve(&settings.data.lancedb_dir);
    let vector = LanceDenseIndex::new(lance_dir.to_string_lossy(), settings.data.table.clone(), embedder.dim());
    HybridRetriever::build(
        Arc::new(TantivyIndexer::in_memory()?),
        Arc::new(vector),
        embedder,
        documents,
        settings.retrieval.clone(),
    )
}
