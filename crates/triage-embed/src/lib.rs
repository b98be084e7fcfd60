//! Dense embedders: BGE-M3 on candle and a hash-based fake for tests and offline runs.

pub mod device;
pub mod pool;
pub mod tokenize;

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, anyhow};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use twox_hash::XxHash64;

use triage_core::config::{EmbeddingSettings, expand_path};
use triage_core::traits::DenseEmbedder;
use triage_core::{Error, Result};

pub use pool::{Pooling, pool_l2};

/// BGE-M3 output width.
pub const BGE_M3_DIM: usize = 1024;
const MAX_TOKENS: usize = 256;
const SERVICE: &str = "bge-m3";

pub struct BgeM3Embedder {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
}

impl BgeM3Embedder {
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let device = device::select_device();
        tracing::info!(dir = %model_dir.display(), "loading BGE-M3");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            anyhow!("failed to load tokenizer from {}: {}", tokenizer_path.display(), e)
        })?;

        let config_path = model_dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: XLMRobertaConfig = serde_json::from_str(&raw)?;

        let weights_path = model_dir.join("pytorch_model.bin");
        let weights: HashMap<String, Tensor> =
            candle_core::pickle::read_all(&weights_path)?.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        tracing::info!("BGE-M3 loaded");

        Ok(Self { model, tokenizer, device, max_len: MAX_TOKENS })
    }

    fn embed_one(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) =
            tokenize::tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden =
            self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = pool_l2(&hidden, &attention_mask, Pooling::Cls)?;
        let v: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        if v.len() != BGE_M3_DIM {
            return Err(anyhow!("expected {BGE_M3_DIM}-dim embedding, got {}", v.len()));
        }
        let ms = start.elapsed().as_millis();
        if ms > 100 {
            tracing::debug!(ms, "slow embedding");
        }
        Ok(v)
    }
}

impl DenseEmbedder for BgeM3Embedder {
    fn dim(&self) -> usize {
        BGE_M3_DIM
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|t| self.embed_one(t).map_err(|e| Error::upstream(SERVICE, format!("{e:#}"))))
            .collect()
    }
}

/// Deterministic bag-of-hashed-words embedder. Texts sharing words land near
/// each other, which is enough to exercise ranking without model weights.
#[derive(Debug, Clone)]
pub struct FakeEmbedder {
    dim: usize,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if token.is_empty() {
                continue;
            }
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            v[idx] += 0.5 + ((h >> 32) as u32) as f32 / u32::MAX as f32;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            // Unit vector so cosine stays defined for empty text.
            v[0] = 1.0;
        } else {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

impl DenseEmbedder for FakeEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Builds the configured embedder. `dim` sizes the fake; the real model is fixed at 1024.
pub fn embedder_from_settings(
    settings: &EmbeddingSettings,
    dim: usize,
) -> Result<Box<dyn DenseEmbedder>> {
    if settings.use_fake {
        tracing::info!(dim, "using fake embedder");
        return Ok(Box::new(FakeEmbedder::new(dim)));
    }
    if dim != BGE_M3_DIM {
        return Err(Error::InvalidConfig(format!(
            "store.dense_dim is {dim} but BGE-M3 produces {BGE_M3_DIM}-dim vectors"
        )));
    }
    let dir = resolve_model_dir(settings.model_dir.as_deref())?;
    let model = BgeM3Embedder::load(&dir).map_err(|e| Error::upstream(SERVICE, format!("{e:#}")))?;
    Ok(Box::new(model))
}

fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = configured {
        let p = expand_path(dir);
        if p.exists() {
            return Ok(p);
        }
        return Err(Error::InvalidConfig(format!(
            "embedding.model_dir {} does not exist",
            p.display()
        )));
    }
    ["models/bge-m3", "../models/bge-m3"]
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| {
            Error::InvalidConfig(
                "could not locate BGE-M3 model directory; set embedding.model_dir".into(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_configured_dir_is_config_error() {
        let err = resolve_model_dir(Some("/definitely/not/here/bge-m3")).unwrap_err();
        assert_eq!(err.kind(), "invalid_config");
    }

    #[test]
    fn real_model_rejects_other_dims() {
        let settings = EmbeddingSettings { model_dir: None, use_fake: false };
        let err = embedder_from_settings(&settings, 8).err().expect("dim mismatch");
        assert_eq!(err.kind(), "invalid_config");
    }
}
