//! Plain text extractor.

use async_trait::async_trait;
use lectern_core::{ContentExtractor, ExtractError, ExtractedContent};
use std::path::Path;
use tokio::fs;

/// Extensions read as UTF-8 text.
pub const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "csv", "json", "html", "xml", "py", "js", "ts", "css",
];

/// Extractor for plain text files.
pub struct TextExtractor;

impl TextExtractor {
    /// Create a new text extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentExtractor for TextExtractor {
    fn name(&self) -> &str {
        "text"
    }

    fn extensions(&self) -> &[&str] {
        TEXT_EXTENSIONS
    }

    async fn extract(&self, path: &Path) -> Result<ExtractedContent, ExtractError> {
        let bytes = fs::read(path).await?;
        let text = String::from_utf8(bytes)
            .map_err(|e| ExtractError::Encoding(format!("{}: {e}", path.display())))?;

        Ok(ExtractedContent {
            text,
            page_count: None,
        })
    }
}
