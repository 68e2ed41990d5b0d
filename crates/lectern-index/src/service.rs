//! Retrieval service: the single entry point shared by callers.

use lectern_core::{
    Document, DocumentSummary, Embedder, Error, ExtractError, IndexStats, NewDocument, Result,
    RetrievedDocument, ScanStats,
};
use lectern_extract::ExtractorRegistry;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::context::format_retrieved_context_with_budget;
use crate::rag_index::{IndexPaths, RagIndex, RetrievalConfig};
use crate::synchronizer::{is_hidden, FolderSynchronizer, SyncConfig};

/// Everything needed to open a [`RetrievalService`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub paths: IndexPaths,
    pub retrieval: RetrievalConfig,
    pub sync: SyncConfig,
    /// Characters of content per document in formatted context
    pub context_char_budget: usize,
}

impl ServiceConfig {
    /// Default layout under `data_dir`, watching `<data_dir>/rag_docs`.
    #[must_use]
    pub fn under(data_dir: &Path) -> Self {
        Self {
            paths: IndexPaths::under(data_dir),
            retrieval: RetrievalConfig::default(),
            sync: SyncConfig::new(data_dir.join("rag_docs")),
            context_char_budget: crate::context::DEFAULT_CONTEXT_CHAR_BUDGET,
        }
    }
}

/// Result of [`RetrievalService::upload_file`].
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    /// Where the file was written
    pub path: PathBuf,
    /// Scan triggered by the upload
    pub scan: ScanStats,
}

/// Handle to the retrieval index.
///
/// Cloning is cheap and every clone talks to the same index. All operations,
/// reads included, go through one lock, so store and index writes from
/// different callers never interleave.
#[derive(Clone)]
pub struct RetrievalService {
    inner: Arc<Mutex<RagIndex>>,
    sync: Arc<FolderSynchronizer>,
    context_char_budget: usize,
}

impl RetrievalService {
    /// Load the persisted index and prepare the watched folder.
    pub fn open(
        config: ServiceConfig,
        embedder: Arc<dyn Embedder>,
        extractors: Arc<ExtractorRegistry>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.sync.folder)?;
        let rag = RagIndex::open(&config.paths, embedder, config.retrieval)?;

        info!("Watching folder {:?}", config.sync.folder);
        Ok(Self {
            inner: Arc::new(Mutex::new(rag)),
            sync: Arc::new(FolderSynchronizer::new(config.sync, extractors)),
            context_char_budget: config.context_char_budget,
        })
    }

    /// Watched folder.
    #[must_use]
    pub fn folder(&self) -> &Path {
        self.sync.folder()
    }

    /// Result count configured for callers without a preference.
    pub async fn default_top_k(&self) -> usize {
        self.inner.lock().await.config().default_top_k
    }

    pub async fn add_document(&self, new: NewDocument) -> Result<String> {
        self.inner.lock().await.add_document(new).await
    }

    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedDocument>> {
        self.inner.lock().await.retrieve(query, top_k).await
    }

    pub async fn remove_document(&self, id: &str) -> Result<bool> {
        self.inner.lock().await.remove_document(id)
    }

    pub async fn remove_all_documents(&self) -> Result<()> {
        self.inner.lock().await.remove_all_documents()
    }

    pub async fn get_document_list(&self) -> Vec<DocumentSummary> {
        self.inner.lock().await.get_document_list()
    }

    pub async fn get_document(&self, id: &str) -> Option<Document> {
        self.inner.lock().await.get_document(id)
    }

    pub async fn stats(&self) -> IndexStats {
        self.inner.lock().await.stats()
    }

    pub async fn rebuild_index(&self) -> Result<usize> {
        self.inner.lock().await.rebuild_index().await
    }

    pub async fn scan_folder(&self) -> Result<ScanStats> {
        let mut rag = self.inner.lock().await;
        self.sync.scan(&mut rag).await
    }

    /// Write `bytes` into the watched folder as `file_name`, then scan.
    ///
    /// Only the final path component of `file_name` is used. Hidden names and
    /// extensions outside the allow-list are rejected.
    pub async fn upload_file(&self, file_name: &str, bytes: &[u8]) -> Result<UploadOutcome> {
        let name = Path::new(file_name)
            .file_name()
            .filter(|name| !is_hidden(Path::new(name)))
            .ok_or_else(|| Error::Other(format!("invalid file name: {file_name:?}")))?;

        let path = self.sync.folder().join(name);
        if !self.sync.is_allowed(&path) {
            return Err(ExtractError::UnsupportedType(file_name.to_string()).into());
        }

        let mut rag = self.inner.lock().await;
        tokio::fs::create_dir_all(self.sync.folder()).await?;
        tokio::fs::write(&path, bytes).await?;
        info!("Uploaded {:?}", path);

        let scan = self.sync.scan(&mut rag).await?;
        Ok(UploadOutcome { path, scan })
    }

    /// Retrieve and format as prompt context.
    pub async fn format_context(&self, query: &str, top_k: usize) -> Result<String> {
        let retrieved = self.retrieve(query, top_k).await?;
        Ok(format_retrieved_context_with_budget(
            &retrieved,
            self.context_char_budget,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::KeywordEmbedder;
    use lectern_extract::TextExtractor;
    use tempfile::{tempdir, TempDir};

    fn service(dir: &TempDir) -> RetrievalService {
        let mut registry = ExtractorRegistry::new();
        registry.register(TextExtractor::new());
        RetrievalService::open(
            ServiceConfig::under(dir.path()),
            Arc::new(KeywordEmbedder::new()),
            Arc::new(registry),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_watched_folder() {
        let dir = tempdir().unwrap();
        let service = service(&dir);
        assert_eq!(service.folder(), dir.path().join("rag_docs"));
        assert!(service.folder().is_dir());
        assert_eq!(service.default_top_k().await, 3);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let dir = tempdir().unwrap();
        let service = service(&dir);
        let other = service.clone();

        let id = service
            .add_document(NewDocument::new("The sky is blue.").with_title("Sky"))
            .await
            .unwrap();
        assert_eq!(other.get_document(&id).await.unwrap().title, "Sky");
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_serialized() {
        let dir = tempdir().unwrap();
        let service = service(&dir);

        let mut tasks = Vec::new();
        for n in 0..8 {
            let service = service.clone();
            tasks.push(tokio::spawn(async move {
                service
                    .add_document(NewDocument::new(format!("Cell fact number {n}")))
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let stats = service.stats().await;
        assert_eq!(stats.documents, 8);
        assert_eq!(stats.live_slots, 8);

        // Snapshot on disk agrees with memory.
        drop(service);
        let reopened = self::service(&dir);
        assert_eq!(reopened.stats().await.live_slots, 8);
    }

    #[tokio::test]
    async fn test_upload_then_scan() {
        let dir = tempdir().unwrap();
        let service = service(&dir);

        let outcome = service.upload_file("sky.txt", b"The sky is blue.").await.unwrap();
        assert_eq!(outcome.path, service.folder().join("sky.txt"));
        assert_eq!(outcome.scan.added, 1);
        assert_eq!(outcome.scan.total_documents, 1);

        let dup = service.upload_file("sky2.txt", b"The sky is blue.").await.unwrap();
        assert_eq!(dup.scan.added, 1);
        assert_eq!(dup.scan.total_documents, 2);
    }

    #[tokio::test]
    async fn test_upload_strips_directories() {
        let dir = tempdir().unwrap();
        let service = service(&dir);

        let outcome = service
            .upload_file("../../etc/grass.txt", b"Grass is green.")
            .await
            .unwrap();
        assert_eq!(outcome.path, service.folder().join("grass.txt"));
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_names() {
        let dir = tempdir().unwrap();
        let service = service(&dir);

        assert!(matches!(
            service.upload_file("tool.exe", b"MZ").await,
            Err(Error::Extraction(ExtractError::UnsupportedType(_)))
        ));
        assert!(service.upload_file(".env.txt", b"x").await.is_err());
        assert!(service.upload_file("..", b"x").await.is_err());
        assert!(service.get_document_list().await.is_empty());
    }

    #[tokio::test]
    async fn test_format_context() {
        let dir = tempdir().unwrap();
        let service = service(&dir);
        assert_eq!(service.format_context("sky", 3).await.unwrap(), "");

        service
            .add_document(NewDocument::new("The sky is blue.").with_title("Sky"))
            .await
            .unwrap();
        let context = service.format_context("What color is the sky?", 3).await.unwrap();
        assert!(context.starts_with("RELEVANT INFORMATION:\nTitle: Sky\nRelevance: 1.00"));
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let dir = tempdir().unwrap();
        let service = service(&dir);
        let id = service.add_document(NewDocument::new("The sky is blue.")).await.unwrap();
        service.add_document(NewDocument::new("Grass is green.")).await.unwrap();

        assert!(service.remove_document(&id).await.unwrap());
        assert!(!service.remove_document("missing").await.unwrap());
        assert!(service.retrieve("sky", 3).await.unwrap().is_empty());

        service.remove_all_documents().await.unwrap();
        assert_eq!(service.stats().await, IndexStats::default());
    }
}
