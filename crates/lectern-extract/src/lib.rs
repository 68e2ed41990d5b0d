//! # lectern-extract
//!
//! Turns files from the watched folder into plain text for embedding.
//!
//! ## Supported Formats
//!
//! | Extractor | Formats | Method |
//! |-----------|---------|--------|
//! | [`TextExtractor`] | `.txt`, `.md`, `.csv`, `.json`, `.html`, `.xml`, `.py`, `.js`, `.ts`, `.css` | UTF-8 read |
//! | [`PdfOcrExtractor`] | `.pdf` | Page rasterization + OCR, pages in parallel |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lectern_extract::{ExtractorRegistry, OcrConfig};
//! use std::path::Path;
//!
//! let registry = ExtractorRegistry::with_defaults(&OcrConfig::default());
//! let content = registry.extract(Path::new("notes/lecture1.pdf")).await?;
//! println!("Extracted {} bytes", content.text.len());
//! ```
//!
//! ## OCR Pipeline
//!
//! PDFs are rasterized with `pdftoppm` (poppler) and each page image is read
//! with `tesseract`. Both steps sit behind [`PageRasterizer`] and
//! [`PageRecognizer`], so other backends can be plugged in. Pages run on a
//! bounded worker pool, each under its own timeout; a page that times out or
//! fails leaves a `[Timeout]` / `[Error: ...]` marker in the text instead of
//! failing the whole document.

pub mod ocr;
pub mod pdf;
pub mod registry;
pub mod text;

pub use ocr::{OcrConfig, PageRasterizer, PageRecognizer, PdftoppmRasterizer, TesseractRecognizer};
pub use pdf::PdfOcrExtractor;
pub use registry::ExtractorRegistry;
pub use text::TextExtractor;
