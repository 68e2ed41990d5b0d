//! JSON-backed document store.

use lectern_core::{Document, StoreError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::persist::{read_optional, write_atomic};

/// Documents keyed by id, mirrored to a single JSON file.
///
/// Mutating calls persist the whole collection before returning, except
/// [`put_deferred`](Self::put_deferred) and [`get_mut`](Self::get_mut), which
/// leave the caller to [`save`](Self::save) once a batch is done.
#[derive(Debug)]
pub struct DocumentStore {
    path: PathBuf,
    documents: BTreeMap<String, Document>,
}

impl DocumentStore {
    /// Load the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let documents = match read_optional(&path)? {
            Some(bytes) => serde_json::from_slice::<BTreeMap<String, Document>>(&bytes)
                .map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display())))?,
            None => {
                info!("No document store found at {:?}", path);
                BTreeMap::new()
            }
        };

        info!("Loaded {} documents from {:?}", documents.len(), path);
        Ok(Self { path, documents })
    }

    /// Snapshot file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace a document and persist.
    pub fn put(&mut self, document: Document) -> Result<(), StoreError> {
        self.put_deferred(document);
        self.save()
    }

    /// Insert or replace a document without persisting.
    pub fn put_deferred(&mut self, document: Document) {
        self.documents.insert(document.id.clone(), document);
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    /// Mutable access; changes are not persisted until [`save`](Self::save).
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Document> {
        self.documents.get_mut(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.documents.contains_key(id)
    }

    /// Document whose source path is exactly `original_file`.
    #[must_use]
    pub fn find_by_original_file(&self, original_file: &str) -> Option<&Document> {
        if original_file.is_empty() {
            return None;
        }
        self.documents
            .values()
            .find(|doc| doc.original_file == original_file)
    }

    /// Remove a document. Returns false (and writes nothing) if it was absent.
    pub fn remove(&mut self, id: &str) -> Result<bool, StoreError> {
        if self.documents.remove(id).is_none() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Remove every document and persist the empty store.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.documents.clear();
        self.save()
    }

    /// All documents sorted by title, ties broken by id.
    #[must_use]
    pub fn list(&self) -> Vec<&Document> {
        let mut docs: Vec<&Document> = self.documents.values().collect();
        docs.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        docs
    }

    /// Documents in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    /// Mutable documents in id order; changes need a [`save`](Self::save).
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Document> {
        self.documents.values_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Write the whole collection to disk.
    pub fn save(&self) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&self.documents)?;
        write_atomic(&self.path, &json)?;
        debug!("Saved {} documents to {:?}", self.documents.len(), self.path);
        Ok(())
    }
}
