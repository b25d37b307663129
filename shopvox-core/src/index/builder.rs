//! Building a [`CatalogueIndex`] from normalized records.

use super::{persist, CatalogueIndex, EmbeddingRecord, IndexError, Result};
use crate::catalogue::CatalogueRecord;
use crate::config::StorageConfig;
use crate::embedder::Embedder;
use tracing::{debug, info};

const BATCH_SIZE: usize = 256;

/// Summary of a finished build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexReport {
    pub records: usize,
    pub dimension: usize,
}

/// Embeds catalogue records and appends them to a fresh index.
///
/// Embedding calls run concurrently (up to `concurrency` at once) but
/// insertion is strictly sequential, so vector position `i` always holds the
/// i-th record of the input.
#[derive(Clone)]
pub struct IndexBuilder {
    embedder: Embedder,
    concurrency: usize,
}

impl IndexBuilder {
    pub fn new(embedder: Embedder) -> Self {
        Self {
            embedder,
            concurrency: 1,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Builds an in-memory index over `records`.
    ///
    /// # Errors
    ///
    /// - [`IndexError::Empty`] if there are no records
    /// - [`IndexError::DimensionMismatch`] if any embedding's length differs
    ///   from the first one; the build stops at that point
    /// - [`IndexError::Embedder`] if any embedding call fails
    pub async fn build(&self, records: Vec<CatalogueRecord>) -> Result<CatalogueIndex> {
        if records.is_empty() {
            return Err(IndexError::Empty);
        }

        let total = records.len();
        info!(records = total, model = self.embedder.model(), "Building catalogue index");

        let mut index = CatalogueIndex::new();
        let mut pending = records.into_iter().peekable();

        while pending.peek().is_some() {
            let batch: Vec<CatalogueRecord> = pending.by_ref().take(BATCH_SIZE).collect();
            let texts: Vec<String> = batch.iter().map(CatalogueRecord::projection_text).collect();

            let vectors = self.embedder.embed_batch(&texts, self.concurrency).await?;

            for (record, vector) in batch.into_iter().zip(vectors) {
                let embedding = EmbeddingRecord {
                    record_id: record.id.clone(),
                    vector,
                };
                index.append(record, embedding)?;
            }

            debug!(indexed = index.len(), total, "Indexed batch");
        }

        info!(
            records = index.len(),
            dimension = index.dimension().unwrap_or(0),
            "Catalogue index built"
        );
        Ok(index)
    }

    /// Builds an index and persists it to the configured paths.
    ///
    /// An index already stored at `storage.index_path` with a different
    /// dimension is never overwritten: the build fails with
    /// [`IndexError::DimensionMismatch`] and nothing is written. Remove the
    /// old artifacts first to change embedding models.
    pub async fn build_and_persist(
        &self,
        records: Vec<CatalogueRecord>,
        storage: &StorageConfig,
    ) -> Result<(CatalogueIndex, IndexReport)> {
        let existing = persist::persisted_dimension(&storage.index_path).await?;
        let index = self.build(records).await?;
        let dimension = index.dimension().unwrap_or(0);

        if let Some(expected) = existing.filter(|&d| d != dimension) {
            return Err(IndexError::DimensionMismatch {
                expected,
                actual: dimension,
            });
        }

        persist::save(&index, &storage.index_path, &storage.records_path).await?;

        let report = IndexReport {
            records: index.len(),
            dimension,
        };
        Ok((index, report))
    }
}
