//! Persistence layer for lectern.
//!
//! Two snapshots live side by side on disk:
//!
//! - [`DocumentStore`]: every [`Document`](lectern_core::Document) keyed by id,
//!   written as one pretty-printed JSON object.
//! - [`VectorIndex`]: a flat inner-product index over unit vectors, one slot
//!   per embedded document, written in a small binary format.
//!
//! The index is append-only. Removing a document leaves its slot behind
//! (a "ghost"); callers track which slots are live and compact by rebuilding.
//!
//! Both snapshots are written whole, through a temp file in the target
//! directory that is renamed over the old file, so a crash mid-write leaves
//! the previous snapshot intact.
//!
//! # Example
//!
//! ```rust,ignore
//! use lectern_store::{DocumentStore, VectorIndex};
//!
//! let mut store = DocumentStore::open("data/document_store/documents.json")?;
//! let mut index = VectorIndex::load("data/vector_store/index.lidx", 384)?;
//!
//! let position = index.add(&doc.id, &embedding)?;
//! store.put(doc)?;
//! index.save("data/vector_store/index.lidx")?;
//!
//! let hits = index.search(&query_embedding, 3)?;
//! ```

pub mod document_store;
mod persist;
pub mod vector_index;

pub use document_store::DocumentStore;
pub use vector_index::VectorIndex;
