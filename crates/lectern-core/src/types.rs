//! Core types for lectern.
//!
//! ## Documents
//! - [`Document`]: A stored document, keyed by a content+path derived id
//! - [`NewDocument`]: Input for programmatic adds
//! - [`DocumentSummary`]: List view for administrative display
//!
//! ## Extraction and Embedding
//! - [`ExtractedContent`]: Text extracted from a file
//! - [`EmbeddingConfig`]: Configuration for embedding generation
//! - [`EmbeddingOutput`]: Result of embedding a text
//!
//! ## Retrieval
//! - [`RetrievedDocument`]: A document with its similarity score
//! - [`ScanStats`]: Outcome of a folder scan
//! - [`IndexStats`]: Store and vector index counters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Embedding dimension shared by every provider.
pub const EMBEDDING_DIM: usize = 384;

/// Maximum number of tokens considered when embedding a text.
pub const MAX_EMBED_TOKENS: usize = 512;

// ============================================================================
// Documents
// ============================================================================

/// A document tracked by the retrieval index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    /// Content hash, suffixed with the source file name when there is one
    pub id: String,
    /// Full extracted text
    pub content: String,
    /// Human readable label
    pub title: String,
    /// Source path, empty for programmatically added documents
    #[serde(default)]
    pub original_file: String,
    /// File mtime, or ingestion time when there is no source file
    pub last_modified: DateTime<Utc>,
    /// Whether the source file was present in the last folder scan
    #[serde(default = "default_in_folder")]
    pub in_folder: bool,
    /// Open key-value bag
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

fn default_in_folder() -> bool {
    true
}

impl Document {
    /// Compute the deterministic id for `(content, original_file)`.
    ///
    /// Identical content in two differently named files yields two ids,
    /// since the file name is folded into the key.
    #[must_use]
    pub fn compute_id(content: &str, original_file: &str) -> String {
        let file_name = Path::new(original_file)
            .file_name()
            .map_or_else(|| original_file.to_string(), |n| n.to_string_lossy().into_owned());
        Self::compute_id_named(content, &file_name)
    }

    /// Id for `content` keyed by an explicit source name, such as a path
    /// relative to a watched folder. An empty name yields the bare hash.
    #[must_use]
    pub fn compute_id_named(content: &str, source_name: &str) -> String {
        let hash = blake3::hash(content.as_bytes()).to_hex().to_string();
        if source_name.is_empty() {
            return hash;
        }
        format!("{hash}_{source_name}")
    }

    /// Source path, if this document came from a file.
    #[must_use]
    pub fn source_path(&self) -> Option<&Path> {
        if self.original_file.is_empty() {
            None
        } else {
            Some(Path::new(&self.original_file))
        }
    }
}

/// Input for adding a document.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub content: String,
    pub title: Option<String>,
    pub original_file: Option<String>,
    /// Name folded into the id instead of the file name of `original_file`
    pub source_name: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl NewDocument {
    /// Create a new document input with only content.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_original_file(mut self, path: impl Into<String>) -> Self {
        self.original_file = Some(path.into());
        self
    }

    /// Key the id on `name` rather than the source file name.
    #[must_use]
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The id this input will be stored under.
    #[must_use]
    pub fn id(&self) -> String {
        match &self.source_name {
            Some(name) => Document::compute_id_named(&self.content, name),
            None => Document::compute_id(&self.content, self.original_file.as_deref().unwrap_or("")),
        }
    }
}

/// Administrative list view of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub original_file: String,
    pub in_folder: bool,
    /// Whether the document currently owns a live vector index slot
    #[serde(rename = "in_faiss")]
    pub in_index: bool,
    pub last_modified: DateTime<Utc>,
}

impl DocumentSummary {
    #[must_use]
    pub fn new(doc: &Document, in_index: bool) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            original_file: doc.original_file.clone(),
            in_folder: doc.in_folder,
            in_index,
            last_modified: doc.last_modified,
        }
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Text extracted from a file.
#[derive(Debug, Clone, Default)]
pub struct ExtractedContent {
    /// Extracted text
    pub text: String,
    /// Page count (for PDFs)
    pub page_count: Option<u32>,
}

// ============================================================================
// Embedding
// ============================================================================

/// Configuration for embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Normalize embeddings to unit length
    pub normalize: bool,
    /// Batch size for processing
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            normalize: true,
            batch_size: 32,
        }
    }
}

/// Output from embedding.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    /// The embedding vector
    pub embedding: Vec<f32>,
    /// Number of tokens used, after truncation
    pub token_count: usize,
}

// ============================================================================
// Retrieval
// ============================================================================

/// A document returned by retrieval, with its cosine similarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub document: Document,
    pub score: f32,
}

/// Counters returned by a folder scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Documents created by this scan
    pub added: usize,
    /// Documents whose source file changed since the last scan
    pub updated: usize,
    /// Files with an allowed extension found in the folder
    #[serde(rename = "total_docs")]
    pub files_seen: usize,
    /// Documents tracked after the scan
    #[serde(rename = "total_in_faiss")]
    pub total_documents: usize,
    /// Files skipped because extraction or embedding failed
    #[serde(default)]
    pub failed: usize,
}

/// Store and vector index counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Documents in the store
    pub documents: usize,
    /// Allocated vector index slots
    pub index_slots: usize,
    /// Slots owned by a stored document
    pub live_slots: usize,
    /// Slots whose document was removed
    pub ghost_slots: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> Document {
        Document {
            id: Document::compute_id("The sky is blue.", "docs/sky.txt"),
            content: "The sky is blue.".to_string(),
            title: "sky".to_string(),
            original_file: "docs/sky.txt".to_string(),
            last_modified: Utc::now(),
            in_folder: true,
            metadata: BTreeMap::from([("source".to_string(), "docs/sky.txt".to_string())]),
        }
    }

    // ==================== Id Tests ====================

    #[test]
    fn test_compute_id_is_deterministic() {
        let a = Document::compute_id("hello", "docs/a.txt");
        let b = Document::compute_id("hello", "docs/a.txt");
        assert_eq!(a, b);
    }

    #[test]
    fn test_compute_id_without_file_is_plain_hash() {
        let id = Document::compute_id("hello", "");
        assert_eq!(id.len(), 64);
        assert!(!id.contains('_'));
    }

    #[test]
    fn test_compute_id_folds_in_file_name() {
        let id = Document::compute_id("hello", "docs/notes/a.txt");
        assert!(id.ends_with("_a.txt"));
    }

    #[test]
    fn test_same_content_different_file_differs() {
        let a = Document::compute_id("hello", "docs/a.txt");
        let b = Document::compute_id("hello", "docs/b.txt");
        assert_ne!(a, b);
    }

    #[test]
    fn test_new_document_id_matches_compute_id() {
        let input = NewDocument::new("hello").with_original_file("docs/a.txt");
        assert_eq!(input.id(), Document::compute_id("hello", "docs/a.txt"));
    }

    #[test]
    fn test_source_name_overrides_file_name() {
        let week1 = NewDocument::new("hello")
            .with_original_file("docs/week1/notes.txt")
            .with_source_name("week1/notes.txt");
        let week2 = NewDocument::new("hello")
            .with_original_file("docs/week2/notes.txt")
            .with_source_name("week2/notes.txt");
        assert_ne!(week1.id(), week2.id());
        assert!(week1.id().ends_with("_week1/notes.txt"));
        assert_eq!(
            NewDocument::new("hello").with_source_name("a.txt").id(),
            Document::compute_id("hello", "docs/a.txt")
        );
    }

    #[test]
    fn test_source_path() {
        let mut doc = sample_document();
        assert_eq!(doc.source_path(), Some(Path::new("docs/sky.txt")));
        doc.original_file.clear();
        assert!(doc.source_path().is_none());
    }

    // ==================== Serialization Tests ====================

    #[test]
    fn test_document_serialization() {
        let doc = sample_document();
        let json = serde_json::to_string(&doc).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(doc, back);
    }

    #[test]
    fn test_document_rejects_unknown_fields() {
        let json = r#"{
            "id": "x", "content": "c", "title": "t", "original_file": "",
            "last_modified": "2024-01-01T00:00:00Z", "in_folder": true,
            "metadata": {}, "embedding": [1.0]
        }"#;
        assert!(serde_json::from_str::<Document>(json).is_err());
    }

    #[test]
    fn test_document_rejects_missing_content() {
        let json = r#"{"id": "x", "title": "t", "last_modified": "2024-01-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<Document>(json).is_err());
    }

    #[test]
    fn test_document_optional_fields_default() {
        let json = r#"{"id": "x", "content": "c", "title": "t", "last_modified": "2024-01-01T00:00:00Z"}"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        assert!(doc.in_folder);
        assert!(doc.original_file.is_empty());
        assert!(doc.metadata.is_empty());
    }

    #[test]
    fn test_summary_uses_wire_names() {
        let summary = DocumentSummary::new(&sample_document(), true);
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["in_faiss"], serde_json::Value::Bool(true));
        assert!(value.get("in_index").is_none());
    }

    #[test]
    fn test_scan_stats_wire_names() {
        let stats = ScanStats {
            added: 1,
            updated: 2,
            files_seen: 3,
            total_documents: 4,
            failed: 0,
        };
        let value = serde_json::to_value(stats).unwrap();
        assert_eq!(value["added"], 1);
        assert_eq!(value["updated"], 2);
        assert_eq!(value["total_docs"], 3);
        assert_eq!(value["total_in_faiss"], 4);
    }

    #[test]
    fn test_embedding_config_default() {
        let config = EmbeddingConfig::default();
        assert!(config.normalize);
        assert_eq!(config.batch_size, 32);
    }
}
