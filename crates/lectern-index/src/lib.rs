//! Retrieval index for lectern.
//!
//! Ties the document store, the vector index and an embedder together into
//! a retrieval index, keeps it in sync with a watched folder, and formats
//! results for prompt building.
//!
//! # Components
//!
//! - [`RetrievalService`]: Cloneable handle; every operation is serialized
//!   through one lock
//! - [`RagIndex`]: The index itself (store, vectors, id↔slot map)
//! - [`FolderSynchronizer`]: Reconciles the watched folder with the index
//! - [`FolderWatcher`]: Debounced change notifications for the watched folder
//! - [`format_retrieved_context`]: Renders retrieved documents as prompt context
//!
//! # Example
//!
//! ```rust,ignore
//! use lectern_index::{RetrievalService, ServiceConfig};
//! use lectern_extract::{ExtractorRegistry, OcrConfig};
//! use lectern_embed::HashingEmbedder;
//! use std::sync::Arc;
//!
//! let service = RetrievalService::open(
//!     ServiceConfig::under(&data_dir),
//!     Arc::new(HashingEmbedder::new()),
//!     Arc::new(ExtractorRegistry::with_defaults(&OcrConfig::default())),
//! )?;
//!
//! let stats = service.scan_folder().await?;
//! println!("{} added, {} updated", stats.added, stats.updated);
//!
//! let context = service.format_context("What color is the sky?", 3).await?;
//! ```

pub mod context;
pub mod rag_index;
pub mod service;
pub mod synchronizer;
#[cfg(test)]
mod testing;
pub mod watcher;

pub use context::{format_retrieved_context, format_retrieved_context_with_budget};
pub use rag_index::{IndexPaths, RagIndex, RetrievalConfig};
pub use service::{RetrievalService, ServiceConfig, UploadOutcome};
pub use synchronizer::{FolderSynchronizer, SyncConfig};
pub use watcher::FolderWatcher;
