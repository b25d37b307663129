//! shopvox-core - Voice-driven product search engine
//!
//! Provides the retrieval pipeline behind spoken product search:
//! - Catalogue ingestion and normalization (CSV / JSON exports)
//! - Embedding and exact L2 vector indexing, with on-disk persistence
//! - Query refinement, similarity search and result shaping
//! - Image liveness checks with a generated placeholder
//! - Model provider abstraction (Ollama, offline hashing embedder)
//!
//! ## Primary API
//!
//! Build an index once with [`index::IndexBuilder`], then answer queries
//! through [`SearchPipeline`].

// Public modules
pub mod capability;
pub mod catalogue;
pub mod config;
pub mod embedder;
pub mod images;
pub mod index;
pub mod pipeline;
pub mod provider;
pub mod refine;
pub mod search;
pub mod shape;
pub mod transcribe;

#[cfg(test)]
pub(crate) mod testing;

// Public exports
pub use capability::CapabilityError;
pub use catalogue::{read_catalogue, normalize_rows, CatalogueFormat, CatalogueRecord, Specification};
pub use config::Config;
pub use embedder::Embedder;
pub use images::{ImageGuard, Placeholder};
pub use index::{CatalogueIndex, EmbeddingRecord, IndexBuilder, IndexError, IndexReport};
pub use pipeline::{GalleryItem, PipelineError, QueryOutcome, RenderedProduct, SearchPipeline};
pub use refine::{refine_query, QueryRefiner, Refinement};
pub use search::{SearchEngine, SearchError, SearchHit};
pub use shape::{Prettifier, ProductResult, ResultShaper};
pub use transcribe::{AudioClip, SpeechModel, SpeechModelHandle, SpeechModelLoader, Transcriber};

// Provider exports
pub use provider::{ChatRequest, ChatResponse, Message, Provider, ProviderError};
