//! Layered configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml`, `config.<env>.toml`
//! and `APP_*` env vars (`__` separates nested keys, e.g.
//! `APP_RETRIEVAL__MAX_CANDIDATES=10`). Provides helpers to expand `~` and
//! `${VAR}` and to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Merge `config.toml`, `config.<env>.toml` and `APP_*` variables found
    /// relative to `base_dir`. Missing keys fall back to `Settings::default()`.
    pub fn load_from(base_dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(base_dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(base_dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base_dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base_dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, base_dir: base_dir.to_path_buf() };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))
    }

    /// Resolve a configured path against the directory the config was loaded from.
    pub fn resolve(&self, p: &str) -> PathBuf { resolve_with_base(&self.base_dir, p) }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        let settings = self.settings()?;
        settings.rerank.weights.validate().map_err(|e| anyhow::anyhow!(e))?;
        if settings.retrieval.min_candidates == 0 || settings.retrieval.min_candidates > settings.retrieval.max_candidates {
            anyhow::bail!(
                "retrieval.min_candidates ({}) must be in 1..=max_candidates ({})",
                settings.retrieval.min_candidates,
                settings.retrieval.max_candidates
            );
        }
        if matches!(env, "prod" | "production") && settings.embedding.kind == EmbeddingKind::Hash {
            tracing::warn!("hash embeddings configured in production; semantic scores will be lexical only");
        }
        Ok(())
    }
}

/// Typed view of the whole configuration tree. Every section has defaults,
/// so an empty or missing `config.toml` is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub classifier: ClassifierSettings,
    pub retrieval: RetrievalSettings,
    pub rerank: RerankSettings,
    pub evaluation: EvaluationSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub corpus: String,
    pub taxonomy: String,
    pub lancedb_dir: String,
    pub table: String,
    pub generation_log: String,
    pub chunk_chars: usize,
    pub overlap_chars: usize,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            corpus: "data/corpus".to_string(),
            taxonomy: "data/taxonomie.yaml".to_string(),
            lancedb_dir: "data/indexes/lancedb".to_string(),
            table: "documents".to_string(),
            generation_log: "storage/generated_responses.jsonl".to_string(),
            chunk_chars: 1000,
            overlap_chars: 150,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingKind {
    Hash,
    BgeM3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub kind: EmbeddingKind,
    pub model_dir: Option<String>,
    pub dim: usize,
    pub max_len: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self { Self { kind: EmbeddingKind::Hash, model_dir: None, dim: 1024, max_len: 256, batch_size: 32 } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key: None,
            api_key_env: "GROQ_API_KEY".to_string(),
            temperature: 0.0,
            max_tokens: 1024,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub ai_enabled: bool,
    pub ai_timeout_ms: u64,
}

impl Default for ClassifierSettings {
    fn default() -> Self { Self { ai_enabled: true, ai_timeout_ms: 30_000 } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionKind {
    Concatenate,
    ReciprocalRank,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub min_candidates: usize,
    pub max_candidates: usize,
    pub source_timeout_ms: u64,
    pub fusion: FusionKind,
    pub rrf_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { min_candidates: 8, max_candidates: 12, source_timeout_ms: 10_000, fusion: FusionKind::Concatenate, rrf_k: 60 }
    }
}

/// Weights of the four rerank criteria. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankWeights {
    pub semantic_similarity: f32,
    pub keyword_overlap: f32,
    pub metadata_relevance: f32,
    pub document_quality: f32,
}

impl Default for RerankWeights {
    fn default() -> Self {
        Self { semantic_similarity: 0.4, keyword_overlap: 0.2, metadata_relevance: 0.2, document_quality: 0.2 }
    }
}

impl RerankWeights {
    pub fn sum(&self) -> f32 {
        self.semantic_similarity + self.keyword_overlap + self.metadata_relevance + self.document_quality
    }

    pub fn validate(&self) -> Result<(), String> {
        let parts = [self.semantic_similarity, self.keyword_overlap, self.metadata_relevance, self.document_quality];
        if parts.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(format!("rerank weights must be finite and non-negative: {self:?}"));
        }
        if (self.sum() - 1.0).abs() > 1e-4 {
            return Err(format!("rerank weights must sum to 1.0, got {}", self.sum()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankSettings {
    pub weights: RerankWeights,
    pub embed_timeout_ms: u64,
}

impl Default for RerankSettings {
    fn default() -> Self { Self { weights: RerankWeights::default(), embed_timeout_ms: 10_000 } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationSettings {
    pub enabled: bool,
    pub embed_timeout_ms: u64,
}

impl Default for EvaluationSettings {
    fn default() -> Self { Self { enabled: true, embed_timeout_ms: 10_000 } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self { Self { level: "info".to_string(), format: LogFormat::Text } }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
