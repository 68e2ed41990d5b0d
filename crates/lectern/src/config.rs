//! Configuration handling for lectern.
//!
//! Loaded from TOML; every field has a default, so a missing file or a
//! partial file is fine.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use lectern_extract::OcrConfig;
use lectern_index::{IndexPaths, RetrievalConfig, ServiceConfig, SyncConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Embedding model name that selects the offline hashing embedder.
pub const HASHING_MODEL: &str = "hashing";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Where snapshots live
    #[serde(default)]
    pub storage: StorageConfig,

    /// Watched folder
    #[serde(default)]
    pub folder: FolderConfig,

    /// Retrieval settings
    #[serde(default)]
    pub retrieval: RetrievalSection,

    /// Embedding configuration
    #[serde(default)]
    pub embedding: EmbeddingSection,

    /// PDF OCR tools
    #[serde(default)]
    pub ocr: OcrSection,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Data directory (default: platform data dir, or `LECTERN_DATA_DIR`)
    pub data_dir: Option<PathBuf>,
}

/// Watched folder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderConfig {
    /// Folder to synchronize (default: `<data_dir>/rag_docs`)
    pub path: Option<PathBuf>,

    /// Extensions to index
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Debounce for `watch` (ms)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_extensions() -> Vec<String> {
    lectern_index::synchronizer::DEFAULT_EXTENSIONS
        .iter()
        .map(|e| (*e).to_string())
        .collect()
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            path: None,
            extensions: default_extensions(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSection {
    /// Minimum cosine similarity for a result
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Results per query when `--top-k` is not given
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Characters of content per document in formatted context
    #[serde(default = "default_context_char_budget")]
    pub context_char_budget: usize,
}

fn default_similarity_threshold() -> f32 {
    lectern_index::rag_index::DEFAULT_SIMILARITY_THRESHOLD
}

fn default_top_k() -> usize {
    lectern_index::rag_index::DEFAULT_TOP_K
}

fn default_context_char_budget() -> usize {
    lectern_index::context::DEFAULT_CONTEXT_CHAR_BUDGET
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            default_top_k: default_top_k(),
            context_char_budget: default_context_char_budget(),
        }
    }
}

/// Embedding-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSection {
    /// Hub model id, or `hashing` for the offline embedder
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Use GPU if available
    #[serde(default = "default_use_gpu")]
    pub use_gpu: bool,

    /// Batch size for embedding
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_use_gpu() -> bool {
    true
}

fn default_batch_size() -> usize {
    32
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            use_gpu: default_use_gpu(),
            batch_size: default_batch_size(),
        }
    }
}

/// OCR tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrSection {
    #[serde(default = "default_pdftoppm")]
    pub pdftoppm: PathBuf,

    #[serde(default = "default_tesseract")]
    pub tesseract: PathBuf,

    /// Tesseract language code
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_dpi")]
    pub dpi: u32,

    /// Seconds allowed per page
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,

    /// Pages recognized concurrently
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

fn default_pdftoppm() -> PathBuf {
    PathBuf::from("pdftoppm")
}

fn default_tesseract() -> PathBuf {
    PathBuf::from("tesseract")
}

fn default_language() -> String {
    "eng".to_string()
}

fn default_dpi() -> u32 {
    200
}

fn default_page_timeout_secs() -> u64 {
    30
}

fn default_max_workers() -> usize {
    4
}

impl Default for OcrSection {
    fn default() -> Self {
        Self {
            pdftoppm: default_pdftoppm(),
            tesseract: default_tesseract(),
            language: default_language(),
            dpi: default_dpi(),
            page_timeout_secs: default_page_timeout_secs(),
            max_workers: default_max_workers(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (`--verbose` forces debug)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

const SAMPLE_TOML: &str = r#"# lectern configuration

[storage]
# data_dir = "/var/lib/lectern"

[folder]
# path = "/home/me/course-notes"
extensions = ["txt", "md", "csv", "json", "html", "xml", "py", "js", "ts", "css", "pdf"]
debounce_ms = 500

[retrieval]
similarity_threshold = 0.7
default_top_k = 3
context_char_budget = 1000

[embedding]
# "hashing" selects the offline embedder
model = "sentence-transformers/all-MiniLM-L6-v2"
use_gpu = true
batch_size = 32

[ocr]
pdftoppm = "pdftoppm"
tesseract = "tesseract"
language = "eng"
dpi = 200
page_timeout_secs = 30
max_workers = 4

[logging]
level = "info"
"#;

impl Config {
    /// Load from the default config path; a missing file yields defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load from `path`, or the default config path when `None`.
    pub fn load_from(path: Option<PathBuf>) -> Result<Self> {
        let Some(path) = path.or_else(Self::config_path) else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// `<config_dir>/config.toml`.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Commented sample file matching the defaults.
    #[must_use]
    pub fn sample_toml() -> &'static str {
        SAMPLE_TOML
    }

    /// Configured data directory, else the platform default.
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => data_dir().context("Failed to determine data directory"),
        }
    }

    /// Model cache directory.
    pub fn models_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("models"))
    }

    #[must_use]
    pub fn ocr_config(&self) -> OcrConfig {
        OcrConfig {
            pdftoppm: self.ocr.pdftoppm.clone(),
            tesseract: self.ocr.tesseract.clone(),
            language: self.ocr.language.clone(),
            dpi: self.ocr.dpi,
            page_timeout: Duration::from_secs(self.ocr.page_timeout_secs),
            max_workers: self.ocr.max_workers,
        }
    }

    /// Library-level settings for the retrieval service.
    pub fn service_config(&self) -> Result<ServiceConfig> {
        let data_dir = self.data_dir()?;
        Ok(self.service_config_in(&data_dir))
    }

    fn service_config_in(&self, data_dir: &Path) -> ServiceConfig {
        let folder = self
            .folder
            .path
            .clone()
            .unwrap_or_else(|| data_dir.join("rag_docs"));

        let mut retrieval = RetrievalConfig {
            similarity_threshold: self.retrieval.similarity_threshold,
            default_top_k: self.retrieval.default_top_k,
            ..RetrievalConfig::default()
        };
        retrieval.embedding.batch_size = self.embedding.batch_size;

        ServiceConfig {
            paths: IndexPaths::under(data_dir),
            retrieval,
            sync: SyncConfig {
                folder,
                extensions: self
                    .folder
                    .extensions
                    .iter()
                    .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                    .collect(),
            },
            context_char_budget: self.retrieval.context_char_budget,
        }
    }
}

/// Get the data directory for lectern.
pub fn data_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("LECTERN_DATA_DIR") {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "lectern").map(|dirs| dirs.data_dir().to_path_buf())
}

/// Get the config directory for lectern.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("LECTERN_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "lectern").map(|dirs| dirs.config_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!((config.retrieval.similarity_threshold - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.retrieval.default_top_k, 3);
        assert_eq!(config.retrieval.context_char_budget, 1000);
        assert_eq!(config.ocr.page_timeout_secs, 30);
        assert_eq!(config.ocr.max_workers, 4);
        assert_eq!(config.folder.extensions.len(), 11);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_sample_parses_to_defaults() {
        let sample = Config::from_toml(Config::sample_toml()).unwrap();
        let defaults = Config::default();
        assert_eq!(sample.folder.extensions, defaults.folder.extensions);
        assert_eq!(sample.embedding.model, defaults.embedding.model);
        assert_eq!(sample.ocr.dpi, defaults.ocr.dpi);
        assert_eq!(sample.retrieval.default_top_k, defaults.retrieval.default_top_k);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = Config::from_toml("[retrieval]\ndefault_top_k = 5\n").unwrap();
        assert_eq!(config.retrieval.default_top_k, 5);
        assert!((config.retrieval.similarity_threshold - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.embedding.batch_size, 32);
    }

    #[test]
    fn test_invalid_toml_fails() {
        assert!(Config::from_toml("[retrieval\n").is_err());
    }

    #[test]
    fn test_load_from_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(Some(dir.path().join("nope.toml"))).unwrap();
        assert_eq!(config.retrieval.default_top_k, 3);
    }

    #[test]
    fn test_service_config_layout() {
        let config = Config::from_toml(
            "[folder]\nextensions = [\".TXT\", \"md\"]\n[ocr]\npage_timeout_secs = 5\n",
        )
        .unwrap();
        let service = config.service_config_in(Path::new("/data"));

        assert_eq!(service.paths.vector_index, Path::new("/data/vector_store/index.lidx"));
        assert_eq!(service.paths.documents, Path::new("/data/document_store/documents.json"));
        assert_eq!(service.sync.folder, Path::new("/data/rag_docs"));
        assert_eq!(service.sync.extensions, vec!["txt", "md"]);
        assert_eq!(config.ocr_config().page_timeout, Duration::from_secs(5));
    }
}
