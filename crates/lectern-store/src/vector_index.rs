//! Flat inner-product vector index.
//!
//! Exact search over every slot. Vectors are expected to be unit length, so
//! the inner product is the cosine similarity.
//!
//! ## Snapshot format
//!
//! ```text
//! magic    8 bytes   "LECTIDX1"
//! dim      u32 LE
//! count    u64 LE
//! count × {
//!     label_len  u32 LE
//!     label      label_len bytes, UTF-8
//!     vector     dim × f32 LE
//! }
//! ```

use lectern_core::StoreError;
use std::path::Path;
use tracing::{debug, info};

use crate::persist::{read_optional, write_atomic};

const MAGIC: &[u8; 8] = b"LECTIDX1";

/// Append-only flat index. Each slot carries the id of the document it was
/// added for; slots are never removed individually.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    labels: Vec<String>,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            labels: Vec::new(),
            data: Vec::new(),
        }
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of slots, live or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Append a vector and return its position.
    pub fn add(&mut self, label: impl Into<String>, vector: &[f32]) -> Result<usize, StoreError> {
        self.check_dimension(vector)?;
        self.labels.push(label.into());
        self.data.extend_from_slice(vector);
        Ok(self.labels.len() - 1)
    }

    #[must_use]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        if position >= self.len() {
            return None;
        }
        let start = position * self.dimension;
        Some(&self.data[start..start + self.dimension])
    }

    #[must_use]
    pub fn label(&self, position: usize) -> Option<&str> {
        self.labels.get(position).map(String::as_str)
    }

    /// `(position, label)` for every slot.
    pub fn labels(&self) -> impl Iterator<Item = (usize, &str)> {
        self.labels.iter().map(String::as_str).enumerate()
    }

    /// The `k` highest-scoring positions, best first. Equal scores keep
    /// position order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, StoreError> {
        self.check_dimension(query)?;
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .map(|v| v.iter().zip(query).map(|(a, b)| a * b).sum::<f32>())
            .enumerate()
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    /// Drop every slot.
    pub fn reset(&mut self) {
        self.labels.clear();
        self.data.clear();
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), StoreError> {
        if vector.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Load a snapshot. A missing file is an empty index of `dimension`.
    pub fn load(path: impl AsRef<Path>, dimension: usize) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let Some(bytes) = read_optional(path)? else {
            info!("No vector index found at {:?}, starting empty", path);
            return Ok(Self::new(dimension));
        };

        let index = Self::decode(&bytes)
            .map_err(|msg| StoreError::Corrupt(format!("{}: {msg}", path.display())))?;
        if index.dimension != dimension {
            return Err(StoreError::Corrupt(format!(
                "{}: index dimension {} does not match configured {}",
                path.display(),
                index.dimension,
                dimension
            )));
        }

        info!("Loaded vector index with {} slots from {:?}", index.len(), path);
        Ok(index)
    }

    /// Write the whole index to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        write_atomic(path, &self.encode())?;
        debug!("Saved vector index with {} slots to {:?}", self.len(), path);
        Ok(())
    }

    fn encode(&self) -> Vec<u8> {
        let label_bytes: usize = self.labels.iter().map(|l| 4 + l.len()).sum();
        let mut buf = Vec::with_capacity(20 + label_bytes + self.data.len() * 4);

        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        buf.extend_from_slice(&(self.labels.len() as u64).to_le_bytes());
        for (position, label) in self.labels.iter().enumerate() {
            buf.extend_from_slice(&(label.len() as u32).to_le_bytes());
            buf.extend_from_slice(label.as_bytes());
            let start = position * self.dimension;
            for value in &self.data[start..start + self.dimension] {
                buf.extend_from_slice(&value.to_le_bytes());
            }
        }
        buf
    }

    fn decode(bytes: &[u8]) -> Result<Self, String> {
        let mut reader = Reader { bytes };

        if reader.take(MAGIC.len())? != MAGIC {
            return Err("not a lectern vector index".to_string());
        }
        let dimension = reader.u32()? as usize;
        let count = usize::try_from(reader.u64()?).map_err(|e| e.to_string())?;

        let mut index = Self::new(dimension);
        for position in 0..count {
            let label_len = reader.u32()? as usize;
            let label = std::str::from_utf8(reader.take(label_len)?)
                .map_err(|e| format!("slot {position}: invalid label: {e}"))?
                .to_string();
            let raw = reader.take(dimension * 4)?;
            index.labels.push(label);
            index.data.extend(
                raw.chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            );
        }

        if !reader.bytes.is_empty() {
            return Err(format!("{} trailing bytes", reader.bytes.len()));
        }
        Ok(index)
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        if self.bytes.len() < n {
            return Err("unexpected end of file".to_string());
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    fn u32(&mut self) -> Result<u32, String> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, String> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }
}
