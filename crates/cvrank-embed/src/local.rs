//! Local sentence-encoder backed by candle.
//!
//! Loads a BERT-family checkpoint (tokenizer.json + config.json +
//! model.safetensors) from a local directory and produces mean-pooled,
//! L2-normalized sentence embeddings. The model directory is resolved
//! from `CVRANK_MODEL_DIR`, falling back to `models/encoder`.

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use cvrank_core::traits::Embedder;
use cvrank_core::{Error, Result};
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

use crate::pool::masked_mean_l2;

const MAX_LEN: usize = 256;

pub struct LocalModelEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    id: String,
}

fn embed_err<E: std::fmt::Display>(e: E) -> Error {
    Error::EmbeddingUnavailable(e.to_string())
}

fn select_device() -> Device {
    #[cfg(feature = "cuda")]
    if let Ok(device) = Device::new_cuda(0) {
        return device;
    }
    #[cfg(feature = "metal")]
    if let Ok(device) = Device::new_metal(0) {
        return device;
    }
    Device::Cpu
}

fn resolve_model_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("CVRANK_MODEL_DIR") {
        let p = PathBuf::from(&dir);
        if p.exists() {
            return Ok(p);
        }
        return Err(Error::Config(format!("CVRANK_MODEL_DIR does not exist: {dir}")));
    }
    let fallback = Path::new("models/encoder");
    if fallback.exists() {
        return Ok(fallback.to_path_buf());
    }
    Err(Error::Config(
        "could not locate encoder model directory (set CVRANK_MODEL_DIR)".into(),
    ))
}

impl LocalModelEmbedder {
    pub fn new() -> Result<Self> {
        Self::from_dir(&resolve_model_dir()?)
    }

    pub fn from_dir(model_dir: &Path) -> Result<Self> {
        let device = select_device();
        tracing::info!("loading encoder from {}", model_dir.display());

        let tokenizer = Tokenizer::from_file(model_dir.join("tokenizer.json"))
            .map_err(embed_err)?;
        let config_raw = std::fs::read_to_string(model_dir.join("config.json"))?;
        let config: BertConfig = serde_json::from_str(&config_raw)?;
        let dim = config.hidden_size;

        let weights = model_dir.join("model.safetensors");
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device)
                .map_err(embed_err)?
        };
        let model = BertModel::load(vb, &config).map_err(embed_err)?;

        let id = model_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "local-encoder".to_string());

        Ok(Self { model, tokenizer, device, dim, id })
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Tensor> {
        let mut all_ids = Vec::with_capacity(texts.len());
        let mut all_masks = Vec::with_capacity(texts.len());
        for text in texts {
            let enc = self.tokenizer.encode(text.as_str(), true).map_err(embed_err)?;
            let mut ids: Vec<u32> = enc.get_ids().to_vec();
            let mut mask: Vec<u32> = enc.get_attention_mask().to_vec();
            ids.truncate(MAX_LEN);
            mask.truncate(MAX_LEN);
            // pad id 0 is the BERT convention
            ids.resize(MAX_LEN, 0);
            mask.resize(MAX_LEN, 0);
            all_ids.push(ids);
            all_masks.push(mask);
        }
        let batch = texts.len();
        let input_ids = Tensor::new(all_ids, &self.device)
            .map_err(embed_err)?
            .reshape((batch, MAX_LEN))
            .map_err(embed_err)?;
        let attention_mask = Tensor::new(all_masks, &self.device)
            .map_err(embed_err)?
            .reshape((batch, MAX_LEN))
            .map_err(embed_err)?;
        let token_type_ids = input_ids.zeros_like().map_err(embed_err)?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(embed_err)?;
        masked_mean_l2(&hidden, &attention_mask).map_err(embed_err)
    }
}

impl Embedder for LocalModelEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let pooled = self.encode_batch(texts)?;
        let cpu = pooled.to_device(&Device::Cpu).map_err(embed_err)?;
        cpu.to_vec2::<f32>().map_err(embed_err)
    }
}
