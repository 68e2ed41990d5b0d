//! Feature-hashing embedder.
//!
//! Maps lower-cased alphanumeric tokens into signed buckets with blake3. It has
//! no model to download, so it backs builds without the `candle` feature and
//! offline setups. Texts sharing vocabulary score high; paraphrases do not.

use async_trait::async_trait;
use lectern_core::{
    EmbedError, Embedder, EmbeddingConfig, EmbeddingOutput, EMBEDDING_DIM, MAX_EMBED_TOKENS,
};

use crate::normalize::normalize_l2;

/// Deterministic bag-of-words embedder.
///
/// # Example
///
/// ```rust
/// use lectern_embed::HashingEmbedder;
/// use lectern_core::{Embedder, EmbeddingConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let embedder = HashingEmbedder::new();
/// let outputs = embedder.embed_text(&["The sky is blue."], &EmbeddingConfig::default()).await?;
/// assert_eq!(outputs[0].embedding.len(), 384);
/// # Ok(())
/// # }
/// ```
pub struct HashingEmbedder {
    dimension: usize,
    max_tokens: usize,
}

impl HashingEmbedder {
    /// Create a hashing embedder with the default dimension (384).
    #[must_use]
    pub fn new() -> Self {
        Self::with_dimension(EMBEDDING_DIM)
    }

    /// Create a hashing embedder with a custom dimension.
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            max_tokens: MAX_EMBED_TOKENS,
        }
    }

    fn encode(&self, text: &str, normalize: bool) -> Result<EmbeddingOutput, EmbedError> {
        let mut embedding = vec![0.0f32; self.dimension];
        let mut token_count = 0;

        for token in tokenize(text).take(self.max_tokens) {
            let hash = blake3::hash(token.as_bytes());
            let bytes = hash.as_bytes();
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&bytes[..8]);
            let idx = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            embedding[idx] += sign;
            token_count += 1;
        }

        if token_count == 0 {
            return Err(EmbedError::EmptyInput);
        }

        if normalize {
            normalize_l2(&mut embedding);
        }

        Ok(EmbeddingOutput {
            embedding,
            token_count,
        })
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "feature-hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    async fn embed_text(
        &self,
        texts: &[&str],
        config: &EmbeddingConfig,
    ) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        texts
            .iter()
            .map(|text| self.encode(text, config.normalize))
            .collect()
    }
}
