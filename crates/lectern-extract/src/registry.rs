//! Extractor registry for routing files to content extractors.

use lectern_core::{ContentExtractor, ExtractError, ExtractedContent};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::{OcrConfig, PdfOcrExtractor, TextExtractor};

/// Registry of content extractors, keyed by file extension.
pub struct ExtractorRegistry {
    /// Named extractors
    extractors: HashMap<String, Arc<dyn ContentExtractor>>,
    /// Lower-case extension to extractor name mapping
    extension_mapping: HashMap<String, String>,
}

impl ExtractorRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
            extension_mapping: HashMap::new(),
        }
    }

    /// Registry with the text extractor and the OCR PDF extractor.
    #[must_use]
    pub fn with_defaults(ocr: &OcrConfig) -> Self {
        let mut registry = Self::new();
        registry.register(TextExtractor::new());
        registry.register(PdfOcrExtractor::new(ocr));
        registry
    }

    /// Register an extractor under its own name.
    ///
    /// Later registrations take over the extensions they claim.
    pub fn register<E: ContentExtractor + 'static>(&mut self, extractor: E) {
        self.register_arc(Arc::new(extractor));
    }

    /// Register a shared extractor.
    pub fn register_arc(&mut self, extractor: Arc<dyn ContentExtractor>) {
        let name = extractor.name().to_string();
        for ext in extractor.extensions() {
            self.extension_mapping
                .insert(ext.to_ascii_lowercase(), name.clone());
        }
        self.extractors.insert(name, extractor);
    }

    /// Get an extractor that can handle a file.
    #[must_use]
    pub fn get_for_file(&self, path: &Path) -> Option<Arc<dyn ContentExtractor>> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.extension_mapping
            .get(&ext)
            .and_then(|name| self.extractors.get(name))
            .cloned()
    }

    /// Whether some registered extractor handles this file.
    #[must_use]
    pub fn supports(&self, path: &Path) -> bool {
        self.get_for_file(path).is_some()
    }

    /// All registered extensions, sorted.
    #[must_use]
    pub fn extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self.extension_mapping.keys().cloned().collect();
        extensions.sort();
        extensions
    }

    /// Extract content from a file.
    pub async fn extract(&self, path: &Path) -> Result<ExtractedContent, ExtractError> {
        let extractor = self.get_for_file(path).ok_or_else(|| {
            ExtractError::UnsupportedType(
                path.extension()
                    .map(|ext| ext.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
            )
        })?;

        extractor.extract(path).await
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct UpperExtractor;

    #[async_trait]
    impl ContentExtractor for UpperExtractor {
        fn name(&self) -> &str {
            "upper"
        }

        fn extensions(&self) -> &[&str] {
            &["txt"]
        }

        async fn extract(&self, path: &Path) -> Result<ExtractedContent, ExtractError> {
            let text = tokio::fs::read_to_string(path).await?;
            Ok(ExtractedContent {
                text: text.to_uppercase(),
                page_count: None,
            })
        }
    }

    #[test]
    fn test_new_registry_is_empty() {
        let registry = ExtractorRegistry::new();
        assert!(registry.extractors.is_empty());
        assert!(registry.extensions().is_empty());
    }

    #[test]
    fn test_defaults_cover_allow_list() {
        let registry = ExtractorRegistry::with_defaults(&OcrConfig::default());
        assert_eq!(
            registry.extensions(),
            vec!["css", "csv", "html", "js", "json", "md", "pdf", "py", "ts", "txt", "xml"]
        );
    }

    #[test]
    fn test_get_for_file_routes_by_extension() {
        let registry = ExtractorRegistry::with_defaults(&OcrConfig::default());

        assert_eq!(registry.get_for_file(Path::new("a/notes.md")).unwrap().name(), "text");
        assert_eq!(registry.get_for_file(Path::new("a/SLIDES.PDF")).unwrap().name(), "pdf-ocr");
        assert!(registry.get_for_file(Path::new("a/photo.jpg")).is_none());
        assert!(!registry.supports(Path::new("a/Makefile")));
    }

    #[test]
    fn test_later_registration_wins() {
        let mut registry = ExtractorRegistry::new();
        registry.register(TextExtractor::new());
        registry.register(UpperExtractor);

        assert_eq!(registry.get_for_file(Path::new("x.txt")).unwrap().name(), "upper");
        assert_eq!(registry.get_for_file(Path::new("x.md")).unwrap().name(), "text");
    }

    #[tokio::test]
    async fn test_extract_success() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("sky.txt");
        std::fs::write(&file_path, "The sky is blue.").unwrap();

        let mut registry = ExtractorRegistry::new();
        registry.register(TextExtractor::new());

        let content = registry.extract(&file_path).await.unwrap();
        assert_eq!(content.text, "The sky is blue.");
    }

    #[tokio::test]
    async fn test_extract_unsupported_type() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("blob.bin");
        std::fs::write(&file_path, [0u8; 10]).unwrap();

        let registry = ExtractorRegistry::with_defaults(&OcrConfig::default());
        match registry.extract(&file_path).await.unwrap_err() {
            ExtractError::UnsupportedType(ext) => assert_eq!(ext, "bin"),
            other => panic!("Expected UnsupportedType error, got {other}"),
        }
    }
}
