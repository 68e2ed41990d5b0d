//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use lectern_core::{EmbedError, Embedder, EmbeddingConfig, EmbeddingOutput};

const KEYWORDS: &[&str] = &["sky", "grass", "plant", "volcano", "cell", "photosynth"];

/// Embeds text onto one axis per known keyword (prefix match on words), or a
/// catch-all axis when no keyword occurs. Texts sharing a keyword score 1.0,
/// texts with disjoint keywords score 0.0.
pub(crate) struct KeywordEmbedder;

impl KeywordEmbedder {
    pub(crate) fn new() -> Self {
        Self
    }

    fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; KEYWORDS.len() + 1];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .map(str::to_lowercase)
        {
            if let Some(axis) = KEYWORDS.iter().position(|k| word.starts_with(k)) {
                vector[axis] = 1.0;
            }
        }
        if vector.iter().all(|v| *v == 0.0) {
            vector[KEYWORDS.len()] = 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-stub"
    }

    fn dimension(&self) -> usize {
        KEYWORDS.len() + 1
    }

    fn max_tokens(&self) -> usize {
        512
    }

    async fn embed_text(
        &self,
        texts: &[&str],
        _config: &EmbeddingConfig,
    ) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        texts
            .iter()
            .map(|text| {
                if text.trim().is_empty() {
                    return Err(EmbedError::EmptyInput);
                }
                Ok(EmbeddingOutput {
                    embedding: Self::vector(text),
                    token_count: text.split_whitespace().count(),
                })
            })
            .collect()
    }
}
