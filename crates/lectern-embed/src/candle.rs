//! MiniLM sentence embedder using Candle.
//!
//! Runs `sentence-transformers/all-MiniLM-L6-v2` locally:
//! - 384 dimensions
//! - inputs truncated to 512 tokens
//! - mean pooling over the attention mask, then L2 normalization
//!
//! Weights are fetched from the HuggingFace Hub on first use and cached in
//! the configured directory.

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::{api::tokio::ApiBuilder, Repo, RepoType};
use lectern_core::{
    EmbedError, Embedder, EmbeddingConfig, EmbeddingOutput, EMBEDDING_DIM, MAX_EMBED_TOKENS,
};
use std::path::PathBuf;
use tokenizers::{Tokenizer, TruncationParams};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Model identifier on HuggingFace Hub.
pub const MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

fn inference<E: std::fmt::Display>(what: &'static str) -> impl FnOnce(E) -> EmbedError {
    move |e| EmbedError::Inference(format!("{what}: {e}"))
}

struct LoadedModel {
    model: BertModel,
    tokenizer: Tokenizer,
}

/// Sentence embedder backed by a BERT model in Candle.
pub struct CandleEmbedder {
    device: Device,
    cache_dir: PathBuf,
    loaded: OnceCell<LoadedModel>,
}

impl CandleEmbedder {
    /// Create an embedder on CUDA when available, CPU otherwise.
    #[must_use]
    pub fn new(cache_dir: PathBuf) -> Self {
        let device = Device::cuda_if_available(0).unwrap_or(Device::Cpu);
        info!("CandleEmbedder using device: {:?}", device);
        Self::with_device(cache_dir, device)
    }

    /// Create an embedder that always runs on the CPU.
    #[must_use]
    pub fn cpu(cache_dir: PathBuf) -> Self {
        Self::with_device(cache_dir, Device::Cpu)
    }

    /// Create an embedder pinned to a device.
    #[must_use]
    pub fn with_device(cache_dir: PathBuf, device: Device) -> Self {
        Self {
            device,
            cache_dir,
            loaded: OnceCell::new(),
        }
    }

    /// Download (if needed) and load the model. Later calls are no-ops.
    pub async fn init(&self) -> Result<(), EmbedError> {
        self.loaded().await.map(|_| ())
    }

    async fn loaded(&self) -> Result<&LoadedModel, EmbedError> {
        self.loaded.get_or_try_init(|| self.load()).await
    }

    async fn load(&self) -> Result<LoadedModel, EmbedError> {
        info!("Loading embedding model {}", MODEL_ID);

        let api = ApiBuilder::new()
            .with_cache_dir(self.cache_dir.clone())
            .build()
            .map_err(|e| EmbedError::ModelLoad(format!("Failed to create HF API: {e}")))?;
        let repo = api.repo(Repo::new(MODEL_ID.to_string(), RepoType::Model));

        let mut paths = Vec::with_capacity(3);
        for file in ["tokenizer.json", "config.json", "model.safetensors"] {
            debug!("Fetching {}", file);
            let path = repo
                .get(file)
                .await
                .map_err(|e| EmbedError::ModelLoad(format!("Failed to download {file}: {e}")))?;
            paths.push(path);
        }

        let mut tokenizer = Tokenizer::from_file(&paths[0])
            .map_err(|e| EmbedError::ModelLoad(format!("Failed to load tokenizer: {e}")))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_EMBED_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| EmbedError::ModelLoad(format!("Failed to set truncation: {e}")))?;

        let config_str = tokio::fs::read_to_string(&paths[1])
            .await
            .map_err(|e| EmbedError::ModelLoad(format!("Failed to read config: {e}")))?;
        let config: Config = serde_json::from_str(&config_str)
            .map_err(|e| EmbedError::ModelLoad(format!("Failed to parse config: {e}")))?;

        // SAFETY: the safetensors file comes from the Hub cache and is only read.
        #[allow(unsafe_code)]
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&paths[2..], DType::F32, &self.device)
                .map_err(|e| EmbedError::ModelLoad(format!("Failed to map weights: {e}")))?
        };
        let model = BertModel::load(vb, &config)
            .map_err(|e| EmbedError::ModelLoad(format!("Failed to build BERT model: {e}")))?;

        info!("Embedding model ready");
        Ok(LoadedModel { model, tokenizer })
    }

    /// Mean of token embeddings, weighted by the attention mask.
    fn mean_pooling(token_embeddings: &Tensor, attention_mask: &Tensor) -> Result<Tensor, EmbedError> {
        let mask = attention_mask
            .unsqueeze(2)
            .map_err(inference("unsqueeze failed"))?
            .broadcast_as(token_embeddings.shape())
            .map_err(inference("broadcast failed"))?
            .to_dtype(DType::F32)
            .map_err(inference("dtype conversion failed"))?;

        let sum = token_embeddings
            .mul(&mask)
            .map_err(inference("mul failed"))?
            .sum(1)
            .map_err(inference("sum failed"))?;
        let count = mask
            .sum(1)
            .map_err(inference("mask sum failed"))?
            .clamp(1e-9, f64::MAX)
            .map_err(inference("clamp failed"))?;

        sum.div(&count).map_err(inference("div failed"))
    }

    fn normalize(embeddings: &Tensor) -> Result<Tensor, EmbedError> {
        let norm = embeddings
            .sqr()
            .map_err(inference("sqr failed"))?
            .sum_keepdim(1)
            .map_err(inference("sum_keepdim failed"))?
            .sqrt()
            .map_err(inference("sqrt failed"))?
            .clamp(1e-12, f64::MAX)
            .map_err(inference("clamp failed"))?;

        embeddings.broadcast_div(&norm).map_err(inference("div failed"))
    }

    async fn encode_batch(
        &self,
        texts: &[&str],
        normalize: bool,
    ) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        let loaded = self.loaded().await?;

        let encodings = loaded
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(inference("tokenization failed"))?;

        let max_len = encodings
            .iter()
            .map(|e| e.len().min(MAX_EMBED_TOKENS))
            .max()
            .unwrap_or(0);
        let batch_size = texts.len();

        let mut input_ids = Vec::with_capacity(batch_size * max_len);
        let mut attention_mask = Vec::with_capacity(batch_size * max_len);
        let mut token_counts = Vec::with_capacity(batch_size);

        for encoding in &encodings {
            let ids = encoding.get_ids();
            let len = ids.len().min(max_len);
            token_counts.push(len);
            input_ids.extend_from_slice(&ids[..len]);
            input_ids.extend(std::iter::repeat(0).take(max_len - len));
            attention_mask.extend(std::iter::repeat(1u32).take(len));
            attention_mask.extend(std::iter::repeat(0u32).take(max_len - len));
        }

        let shape = (batch_size, max_len);
        let input_ids = Tensor::from_vec(input_ids, shape, &self.device)
            .map_err(inference("input_ids tensor"))?;
        let attention_mask = Tensor::from_vec(attention_mask, shape, &self.device)
            .map_err(inference("attention_mask tensor"))?;
        let token_type_ids = input_ids.zeros_like().map_err(inference("token_type_ids tensor"))?;

        let output = loaded
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(inference("model forward failed"))?;

        let pooled = Self::mean_pooling(&output, &attention_mask)?;
        let pooled = if normalize {
            Self::normalize(&pooled)?
        } else {
            pooled
        };

        let rows = pooled.to_vec2::<f32>().map_err(inference("to_vec2 failed"))?;
        Ok(rows
            .into_iter()
            .zip(token_counts)
            .map(|(embedding, token_count)| EmbeddingOutput {
                embedding,
                token_count,
            })
            .collect())
    }
}

#[async_trait]
impl Embedder for CandleEmbedder {
    fn model_name(&self) -> &str {
        MODEL_ID
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    fn max_tokens(&self) -> usize {
        MAX_EMBED_TOKENS
    }

    async fn embed_text(
        &self,
        texts: &[&str],
        config: &EmbeddingConfig,
    ) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbedError::EmptyInput);
        }

        debug!("Embedding {} texts with batch_size {}", texts.len(), config.batch_size);

        let mut results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(config.batch_size.max(1)) {
            results.extend(self.encode_batch(chunk, config.normalize).await?);
        }
        Ok(results)
    }
}
