//! The retrieval index: document store, vector index and the id↔slot map.

use chrono::{DateTime, Utc};
use lectern_core::{
    Document, DocumentSummary, EmbedError, Embedder, EmbeddingConfig, Error, IndexStats,
    NewDocument, Result, RetrievedDocument,
};
use lectern_embed::normalize_l2;
use lectern_store::{DocumentStore, VectorIndex};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Similarity below which retrieved documents are dropped.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.7;

/// Number of documents retrieved when the caller has no preference.
pub const DEFAULT_TOP_K: usize = 3;

/// Retrieval settings.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Minimum cosine similarity for a result
    pub similarity_threshold: f32,
    /// Result count used by callers without an explicit `top_k`
    pub default_top_k: usize,
    /// Options passed to the embedder
    pub embedding: EmbeddingConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            default_top_k: DEFAULT_TOP_K,
            embedding: EmbeddingConfig::default(),
        }
    }
}

/// Snapshot locations under a data directory.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub vector_index: PathBuf,
    pub documents: PathBuf,
}

impl IndexPaths {
    /// `vector_store/index.lidx` and `document_store/documents.json` under `data_dir`.
    #[must_use]
    pub fn under(data_dir: &Path) -> Self {
        Self {
            vector_index: data_dir.join("vector_store").join("index.lidx"),
            documents: data_dir.join("document_store").join("documents.json"),
        }
    }
}

/// Result of adding a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    pub id: String,
    /// False when the id already existed and only its flags were refreshed
    pub created: bool,
}

/// Documents plus their embeddings.
///
/// Every stored document normally owns one slot in the vector index. Removing
/// a document only unmaps its slot, which stays allocated as a ghost until
/// the index is rebuilt or reset; searches widen their candidate set by the
/// ghost count and drop unmapped slots.
pub struct RagIndex {
    store: DocumentStore,
    index: VectorIndex,
    index_path: PathBuf,
    /// Live slot of each document
    positions: HashMap<String, usize>,
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
}

impl RagIndex {
    /// Load both snapshots and rebuild the id↔slot map from the slot labels.
    pub fn open(
        paths: &IndexPaths,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        let store = DocumentStore::open(&paths.documents)?;
        let index = VectorIndex::load(&paths.vector_index, embedder.dimension())?;

        let mut positions = HashMap::with_capacity(store.len());
        for (position, label) in index.labels() {
            if store.contains(label) {
                positions.insert(label.to_string(), position);
            }
        }

        let unembedded = store.len() - positions.len();
        if unembedded > 0 {
            warn!(
                "{} stored documents have no vector; run a reindex to make them searchable",
                unembedded
            );
        }

        let rag = Self {
            store,
            index,
            index_path: paths.vector_index.clone(),
            positions,
            embedder,
            config,
        };
        info!(
            "Retrieval index ready: {} documents, {} slots ({} ghosts)",
            rag.store.len(),
            rag.index.len(),
            rag.ghost_slots()
        );
        Ok(rag)
    }

    #[must_use]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn ghost_slots(&self) -> usize {
        self.index.len() - self.positions.len()
    }

    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbedError> {
        if text.trim().is_empty() {
            return Err(EmbedError::EmptyInput);
        }
        let output = self.embedder.embed_query(text, &self.config.embedding).await?;
        let mut vector = output.embedding;
        if vector.len() != self.index.dimension() {
            return Err(EmbedError::DimensionMismatch {
                expected: self.index.dimension(),
                actual: vector.len(),
            });
        }
        normalize_l2(&mut vector);
        Ok(vector)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Add a document, persisting the index and then the store.
    ///
    /// An id that already exists is not embedded again; for file-backed
    /// documents its `in_folder` flag and `last_modified` are refreshed.
    pub async fn add_document(&mut self, new: NewDocument) -> Result<String> {
        let last_modified = new
            .original_file
            .as_deref()
            .and_then(|path| file_modified(Path::new(path)))
            .unwrap_or_else(Utc::now);

        let outcome = self.add_deferred(new, last_modified).await?;
        if outcome.created {
            self.index.save(&self.index_path)?;
        }
        self.store.save()?;
        Ok(outcome.id)
    }

    /// Add without persisting; the caller finishes with [`persist`](Self::persist).
    pub(crate) async fn add_deferred(
        &mut self,
        new: NewDocument,
        last_modified: DateTime<Utc>,
    ) -> Result<AddOutcome> {
        let id = new.id();
        let original_file = new.original_file.unwrap_or_default();

        if let Some(existing) = self.store.get_mut(&id) {
            debug!("Document already exists with ID: {}", id);
            if !original_file.is_empty() {
                existing.in_folder = true;
                existing.last_modified = last_modified;
            }
            return Ok(AddOutcome { id, created: false });
        }

        let vector = self.embed(&new.content).await?;

        let document = Document {
            id: id.clone(),
            title: new
                .title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| format!("Document {}", self.store.len() + 1)),
            content: new.content,
            original_file,
            last_modified,
            in_folder: true,
            metadata: new.metadata,
        };

        let position = self.index.add(&id, &vector)?;
        self.positions.insert(id.clone(), position);
        self.store.put_deferred(document);

        info!("Added document with ID: {}", id);
        Ok(AddOutcome { id, created: true })
    }

    /// Replace a document's content and embedding, keeping its id.
    ///
    /// The index is rebuilt with the new vector in place of the old one, which
    /// also drops ghost slots. Nothing changes if embedding fails. Not
    /// persisted; call [`persist`](Self::persist).
    pub(crate) async fn replace_content(
        &mut self,
        id: &str,
        content: String,
        last_modified: DateTime<Utc>,
    ) -> Result<()> {
        if !self.store.contains(id) {
            return Err(Error::Other(format!("unknown document: {id}")));
        }
        let vector = self.embed(&content).await?;

        let mut live: Vec<(&str, usize)> = self
            .positions
            .iter()
            .map(|(doc_id, position)| (doc_id.as_str(), *position))
            .collect();
        live.sort_by_key(|(_, position)| *position);

        let mut index = VectorIndex::new(self.index.dimension());
        let mut positions = HashMap::with_capacity(live.len() + 1);
        for (doc_id, position) in live {
            if doc_id == id {
                continue;
            }
            if let Some(old) = self.index.vector(position) {
                positions.insert(doc_id.to_string(), index.add(doc_id, old)?);
            }
        }
        positions.insert(id.to_string(), index.add(id, &vector)?);

        self.index = index;
        self.positions = positions;

        if let Some(doc) = self.store.get_mut(id) {
            doc.content = content;
            doc.last_modified = last_modified;
            doc.in_folder = true;
        }
        info!("Updated document {} and rebuilt its embedding", id);
        Ok(())
    }

    /// Flag every document whose source lives under `folder` as missing.
    pub(crate) fn mark_missing_under(&mut self, folder: &Path) {
        for doc in self.store.iter_mut() {
            if doc.source_path().is_some_and(|p| p.starts_with(folder)) {
                doc.in_folder = false;
            }
        }
    }

    pub(crate) fn set_in_folder(&mut self, id: &str, in_folder: bool) {
        if let Some(doc) = self.store.get_mut(id) {
            doc.in_folder = in_folder;
        }
    }

    /// `(id, last_modified)` of the document sourced from `original_file`.
    pub(crate) fn find_by_original_file(&self, original_file: &str) -> Option<(String, DateTime<Utc>)> {
        self.store
            .find_by_original_file(original_file)
            .map(|doc| (doc.id.clone(), doc.last_modified))
    }

    /// Write the store, and the index when it changed.
    pub(crate) fn persist(&self, index_changed: bool) -> Result<()> {
        if index_changed {
            self.index.save(&self.index_path)?;
        }
        self.store.save()?;
        Ok(())
    }

    /// Remove a document. Its slot stays allocated but unmapped.
    pub fn remove_document(&mut self, id: &str) -> Result<bool> {
        if !self.store.contains(id) {
            debug!("Document not found: {}", id);
            return Ok(false);
        }

        info!("Removing document: {}", id);
        self.positions.remove(id);
        self.store.remove(id)?;
        Ok(true)
    }

    /// Empty both the index and the store.
    pub fn remove_all_documents(&mut self) -> Result<()> {
        info!("Removing all documents");
        self.index.reset();
        self.positions.clear();
        self.index.save(&self.index_path)?;
        self.store.clear()?;
        Ok(())
    }

    /// Re-embed every stored document into a fresh index.
    ///
    /// Documents that fail to embed are left without a slot. Returns the
    /// number of documents embedded.
    pub async fn rebuild_index(&mut self) -> Result<usize> {
        let mut ids: Vec<String> = self.store.iter().map(|doc| doc.id.clone()).collect();
        ids.sort();

        let mut index = VectorIndex::new(self.index.dimension());
        let mut positions = HashMap::with_capacity(ids.len());
        for id in ids {
            let Some(doc) = self.store.get(&id) else {
                continue;
            };
            match self.embed(&doc.content).await {
                Ok(vector) => {
                    positions.insert(id.clone(), index.add(&id, &vector)?);
                }
                Err(e) => warn!("Skipping {} during rebuild: {}", id, e),
            }
        }

        self.index = index;
        self.positions = positions;
        self.index.save(&self.index_path)?;
        info!("Rebuilt vector index with {} documents", self.positions.len());
        Ok(self.positions.len())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// The `top_k` most similar documents at or above the threshold, best first.
    ///
    /// Returns nothing for an empty index or store, `top_k == 0` or a blank query.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedDocument>> {
        if top_k == 0 || self.index.is_empty() || self.store.is_empty() {
            debug!("Nothing to retrieve from");
            return Ok(Vec::new());
        }

        let vector = match self.embed(query).await {
            Ok(vector) => vector,
            Err(EmbedError::EmptyInput) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let candidates = top_k.saturating_add(self.ghost_slots()).min(self.index.len());
        let hits = self.index.search(&vector, candidates)?;

        let threshold = self.config.similarity_threshold;
        let mut results: Vec<RetrievedDocument> = hits
            .into_iter()
            .filter(|(_, score)| *score >= threshold)
            .filter_map(|(position, score)| {
                let id = self.index.label(position)?;
                if self.positions.get(id) != Some(&position) {
                    return None;
                }
                let document = self.store.get(id)?.clone();
                Some(RetrievedDocument { document, score })
            })
            .take(top_k)
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        debug!("Retrieved {} documents for query", results.len());
        Ok(results)
    }

    /// All documents sorted by title, for administrative display.
    #[must_use]
    pub fn get_document_list(&self) -> Vec<DocumentSummary> {
        self.store
            .list()
            .into_iter()
            .map(|doc| DocumentSummary::new(doc, self.positions.contains_key(&doc.id)))
            .collect()
    }

    #[must_use]
    pub fn get_document(&self, id: &str) -> Option<Document> {
        self.store.get(id).cloned()
    }

    #[must_use]
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            documents: self.store.len(),
            index_slots: self.index.len(),
            live_slots: self.positions.len(),
            ghost_slots: self.ghost_slots(),
        }
    }
}

/// File mtime as UTC, if the file exists.
pub(crate) fn file_modified(path: &Path) -> Option<DateTime<Utc>> {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}
