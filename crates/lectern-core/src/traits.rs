//! Core traits for lectern components.
//!
//! - [`ContentExtractor`]: Extract text from files
//! - [`Embedder`]: Generate vector embeddings
//!
//! Implementations live in `lectern-extract` and `lectern-embed`; the
//! retrieval service only depends on these traits.

use async_trait::async_trait;
use std::path::Path;

use crate::error::{EmbedError, ExtractError};
use crate::types::{EmbeddingConfig, EmbeddingOutput, ExtractedContent};

// ============================================================================
// Content Extraction
// ============================================================================

/// Trait for extracting text from files.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Lower-case file extensions (without the dot) this extractor handles.
    fn extensions(&self) -> &[&str];

    /// Check if this extractor can handle the given file.
    fn can_extract(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions().contains(&ext.as_str())
            })
    }

    /// Extract text from a file.
    async fn extract(&self, path: &Path) -> Result<ExtractedContent, ExtractError>;
}

// ============================================================================
// Embedding
// ============================================================================

/// Trait for generating embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model name/identifier.
    fn model_name(&self) -> &str;

    /// Embedding dimension.
    fn dimension(&self) -> usize;

    /// Maximum tokens per input; longer inputs are truncated.
    fn max_tokens(&self) -> usize;

    /// Embed text content.
    async fn embed_text(
        &self,
        texts: &[&str],
        config: &EmbeddingConfig,
    ) -> Result<Vec<EmbeddingOutput>, EmbedError>;

    /// Embed a query.
    async fn embed_query(
        &self,
        query: &str,
        config: &EmbeddingConfig,
    ) -> Result<EmbeddingOutput, EmbedError> {
        let results = self.embed_text(&[query], config).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Inference("empty embedding result".to_string()))
    }
}
