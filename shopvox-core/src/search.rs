//! Similarity search over a built [`CatalogueIndex`].

use crate::catalogue::CatalogueRecord;
use crate::embedder::{Embedder, EmbedderError};
use crate::index::CatalogueIndex;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SearchError {
    /// The query embedding does not fit the index, i.e. the index was built
    /// with a different embedding model.
    #[error("Query embedding has dimension {query}, index has {index}")]
    IndexIncompatible { index: usize, query: usize },

    #[error("Embedder error: {0}")]
    Embedder(#[from] EmbedderError),
}

pub type Result<T> = std::result::Result<T, SearchError>;

/// A nearest-neighbour match. Lower distance means more similar.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub record_id: String,
    pub position: usize,
    /// Squared Euclidean distance between query and record embedding
    pub distance: f32,
}

/// Finds the catalogue records closest to a query.
///
/// The engine reads an immutable [`CatalogueIndex`] snapshot. Any number of
/// queries may run at once; [`SearchEngine::replace_index`] swaps in a
/// freshly built snapshot atomically, and queries already running keep the
/// snapshot they started with.
#[derive(Clone)]
pub struct SearchEngine {
    embedder: Embedder,
    snapshot: Arc<RwLock<Arc<CatalogueIndex>>>,
    top_k: usize,
}

impl SearchEngine {
    pub fn new(embedder: Embedder, index: CatalogueIndex, top_k: usize) -> Self {
        Self {
            embedder,
            snapshot: Arc::new(RwLock::new(Arc::new(index))),
            top_k: top_k.max(1),
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// The index snapshot new queries will read.
    pub fn index(&self) -> Arc<CatalogueIndex> {
        let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Publishes a rebuilt index. Queries already running are unaffected.
    pub fn replace_index(&self, index: CatalogueIndex) {
        let fresh = Arc::new(index);
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        *guard = fresh;
    }

    /// Returns up to `top_k` hits, nearest first.
    ///
    /// An empty (or whitespace-only) query returns no hits without calling
    /// the embedder.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let index = self.index();
        self.search_in(&index, query).await
    }

    /// Like [`search`](Self::search), but also returns each hit's record,
    /// read from the same snapshot the hits came from.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<(SearchHit, CatalogueRecord)>> {
        let index = self.index();
        let hits = self.search_in(&index, query).await?;

        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                let record = index.records().get(hit.position)?.clone();
                Some((hit, record))
            })
            .collect())
    }

    async fn search_in(&self, index: &CatalogueIndex, query: &str) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            debug!("Empty query, skipping search");
            return Ok(Vec::new());
        }
        if index.is_empty() {
            debug!("Index is empty, nothing to search");
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed(query).await?;
        let neighbours = index
            .vectors()
            .search(&embedding, self.top_k)
            .map_err(|conflict| {
                warn!(
                    index = conflict.expected,
                    query = conflict.actual,
                    "Query embedding incompatible with index"
                );
                SearchError::IndexIncompatible {
                    index: conflict.expected,
                    query: conflict.actual,
                }
            })?;

        let hits: Vec<SearchHit> = neighbours
            .into_iter()
            .filter_map(|(position, distance)| {
                let record = index.records().get(position)?;
                Some(SearchHit {
                    record_id: record.id.clone(),
                    position,
                    distance,
                })
            })
            .collect();

        debug!(query, hits = hits.len(), "Search complete");
        Ok(hits)
    }
}
