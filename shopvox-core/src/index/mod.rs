//! Semantic vector index over the product catalogue.
//!
//! # Overview
//!
//! The index is a pair that always travels together:
//!
//! - [`FlatL2Index`]: every record's embedding, stored contiguously in
//!   catalogue order and searched exhaustively by squared Euclidean distance
//! - [`RecordStore`]: the normalized records, positionally aligned with the
//!   vectors so that vector position `i` is record `i`
//!
//! [`IndexBuilder`] is the only writer. It embeds records (concurrently) and
//! appends them (strictly in order); the finished [`CatalogueIndex`] is then
//! persisted and handed to the search engine, which only ever reads it.

mod builder;
mod flat;
mod persist;

pub use builder::{IndexBuilder, IndexReport};
pub use flat::{squared_l2, DimensionConflict, FlatL2Index};
pub use persist::{load, persisted_dimension, remove, save};

use crate::catalogue::CatalogueRecord;
use crate::embedder::EmbedderError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    /// An embedding did not match the dimension fixed for this index.
    #[error("Embedding dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding vector is empty")]
    EmptyVector,

    #[error("Embedder error: {0}")]
    Embedder(#[from] EmbedderError),

    #[error("Catalogue is empty, nothing to index")]
    Empty,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode index: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Failed to encode record store: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Persisted index is corrupt: {0}")]
    Corrupt(String),
}

impl From<DimensionConflict> for IndexError {
    fn from(conflict: DimensionConflict) -> Self {
        Self::DimensionMismatch {
            expected: conflict.expected,
            actual: conflict.actual,
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// One record's embedding, keyed by the record id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub record_id: String,
    pub vector: Vec<f32>,
}

/// Normalized records in index order, addressable by position or id.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<CatalogueRecord>,
    positions: HashMap<String, usize>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_records(records: Vec<CatalogueRecord>) -> Self {
        let mut store = Self::new();
        for record in records {
            store.push(record);
        }
        store
    }

    pub(crate) fn push(&mut self, record: CatalogueRecord) -> usize {
        let position = self.records.len();
        // First occurrence wins id lookups; positions stay authoritative.
        self.positions.entry(record.id.clone()).or_insert(position);
        self.records.push(record);
        position
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&CatalogueRecord> {
        self.records.get(position)
    }

    pub fn position_of(&self, record_id: &str) -> Option<usize> {
        self.positions.get(record_id).copied()
    }

    pub fn records(&self) -> &[CatalogueRecord] {
        &self.records
    }
}

/// A built index and its aligned record store.
#[derive(Debug, Clone, Default)]
pub struct CatalogueIndex {
    vectors: FlatL2Index,
    records: RecordStore,
}

impl CatalogueIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(vectors: FlatL2Index, records: RecordStore) -> Result<Self> {
        if vectors.len() != records.len() {
            return Err(IndexError::Corrupt(format!(
                "{} vectors but {} records",
                vectors.len(),
                records.len()
            )));
        }
        Ok(Self { vectors, records })
    }

    /// Appends a record together with its embedding.
    pub fn append(&mut self, record: CatalogueRecord, embedding: EmbeddingRecord) -> Result<usize> {
        if embedding.record_id != record.id {
            return Err(IndexError::Corrupt(format!(
                "embedding for {} paired with record {}",
                embedding.record_id, record.id
            )));
        }
        let position = self.vectors.add(&embedding.vector)?;
        self.records.push(record);
        Ok(position)
    }

    pub fn vectors(&self) -> &FlatL2Index {
        &self.vectors
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn dimension(&self) -> Option<usize> {
        self.vectors.dimension()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The stored embedding of a record.
    pub fn embedding(&self, record_id: &str) -> Option<EmbeddingRecord> {
        let position = self.records.position_of(record_id)?;
        Some(EmbeddingRecord {
            record_id: record_id.to_string(),
            vector: self.vectors.vector(position)?.to_vec(),
        })
    }
}
