//! # lectern-core
//!
//! Core types and traits for lectern, the retrieval index behind an AI tutor.
//!
//! This crate provides the foundational abstractions shared by the other crates:
//!
//! - **Documents**: [`Document`] records, the unit of storage and retrieval
//! - **Content Extraction**: [`ContentExtractor`] trait for turning files into text
//! - **Embedding Generation**: [`Embedder`] trait for converting text to vectors
//! - **Errors**: the [`Error`] taxonomy used across the workspace
//!
//! ## Architecture
//!
//! ```text
//! File → ContentExtractor → Embedder → VectorIndex + DocumentStore
//!                                            ↓
//!                         query → Embedder → search → RetrievedDocument
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Document`] | A stored document with its source file and folder status |
//! | [`NewDocument`] | Input for adding a document programmatically |
//! | [`DocumentSummary`] | Administrative list view of a document |
//! | [`RetrievedDocument`] | A document paired with its similarity score |
//! | [`ScanStats`] | Counters returned by a folder scan |
//!
//! ## Related Crates
//!
//! - `lectern-embed`: Embedding providers (Candle, hashing)
//! - `lectern-extract`: Text and OCR'd PDF extraction
//! - `lectern-store`: Document store and vector index persistence
//! - `lectern-index`: Folder synchronization and the retrieval service

pub mod error;
pub mod traits;
pub mod types;

pub use error::{EmbedError, Error, ExtractError, Result, StoreError};
pub use traits::*;
pub use types::*;
