//! Sentence embedders behind the core `Embedder` trait.
//!
//! `EmbeddingModel` runs BGE-M3 (XLM-RoBERTa) locally with candle;
//! `HashEmbedder` is a deterministic hashed bag-of-words used in tests and
//! when no model files are available.

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use ragline_core::config::{EmbeddingKind, EmbeddingSettings};
use ragline_core::traits::Embedder;

mod device;
mod pool;
mod tokenize;

pub use device::select_device;
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_batch;

pub struct EmbeddingModel {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    batch_size: usize,
}

impl EmbeddingModel {
    pub fn new(model_dir: &Path, settings: &EmbeddingSettings) -> Result<Self> {
        let device = select_device();
        info!("Loading BGE-M3 model from {}", model_dir.display());

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config: XLMRobertaConfig = serde_json::from_str(&raw_config)?;

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        info!("BGE-M3 model loaded");

        Ok(Self {
            model,
            tokenizer,
            device,
            dim: settings.dim,
            max_len: settings.max_len,
            batch_size: settings.batch_size.max(1),
        })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let token_type_ids = Tensor::zeros((texts.len(), self.max_len), DType::I64, &self.device)?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        if let Some(row) = rows.iter().find(|r| r.len() != self.dim) {
            return Err(anyhow!("model produced dim {} but {} is configured", row.len(), self.dim));
        }
        debug!("Embedded {} texts in {:?}", texts.len(), start.elapsed());
        Ok(rows)
    }
}

impl Embedder for EmbeddingModel {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            out.extend(self.embed_chunk(chunk)?);
        }
        Ok(out)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    let weights = candle_core::pickle::read_all(&pickle)
        .with_context(|| format!("Failed to read weights from {}", pickle.display()))?;
    Ok(weights.into_iter().collect())
}

/// Hashed bag-of-words embedder.
///
/// Lower-cased alphanumeric tokens are hashed into `dim` buckets and the
/// result is L2-normalized, so texts sharing words have positive cosine.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;

        let mut v = vec![0f32; self.dim];
        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            v[idx] += 0.5 + ((h >> 32) as u32) as f32 / u32::MAX as f32;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 1e-6 {
            for x in &mut v { *x /= norm; }
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Build the embedder selected by `settings.kind`.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    match settings.kind {
        EmbeddingKind::Hash => {
            info!("Using hash embeddings (dim={})", settings.dim);
            Ok(Arc::new(HashEmbedder::new(settings.dim)))
        }
        EmbeddingKind::BgeM3 => {
            let model_dir = resolve_model_dir(settings.model_dir.as_deref())?;
            Ok(Arc::new(EmbeddingModel::new(&model_dir, settings)?))
        }
    }
}

fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = configured {
        let p = PathBuf::from(dir);
        if p.exists() { return Ok(p); }
        warn!("Configured model dir {} does not exist", p.display());
    }
    if let Ok(dir) = std::env::var("MODEL_DIR") {
        let p = PathBuf::from(&dir);
        if p.exists() { return Ok(p); }
    }
    let local = Path::new("models/bge-m3");
    if local.exists() { return Ok(local.to_path_buf()); }
    Err(anyhow!("Could not locate BGE-M3 model directory (set embedding.model_dir or MODEL_DIR)"))
}
