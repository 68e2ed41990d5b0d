//! # lectern-embed
//!
//! Embedding providers for lectern.
//!
//! Every provider produces 384-dimensional vectors and truncates its input to
//! 512 tokens; the full document text is still stored and returned, only the
//! embedding ignores the tail.
//!
//! ## Cargo Features
//!
//! - `candle` (default): Enables [`CandleEmbedder`], a local BERT sentence encoder
//! - Without `candle`: Only [`HashingEmbedder`] is available
//!
//! ## Model Details
//!
//! | Property | Value |
//! |----------|-------|
//! | Model | `sentence-transformers/all-MiniLM-L6-v2` |
//! | Dimension | 384 |
//! | Max tokens | 512 |
//! | Pooling | attention-mask weighted mean |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lectern_embed::{CandleEmbedder, normalize_l2};
//! use lectern_core::{Embedder, EmbeddingConfig};
//!
//! let embedder = CandleEmbedder::new("~/.local/share/lectern/models".into());
//! embedder.init().await?;  // Downloads model on first run
//!
//! let mut output = embedder.embed_query("What color is the sky?", &EmbeddingConfig::default()).await?;
//! normalize_l2(&mut output.embedding);
//! ```
//!
//! ## Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`CandleEmbedder`] | MiniLM sentence embeddings (requires `candle` feature) |
//! | [`HashingEmbedder`] | Deterministic bag-of-words feature hashing (always available) |

#[cfg(feature = "candle")]
pub mod candle;
pub mod hashing;
pub mod normalize;

#[cfg(feature = "candle")]
pub use candle::CandleEmbedder;
pub use hashing::HashingEmbedder;
pub use normalize::{dot, normalize_l2};
