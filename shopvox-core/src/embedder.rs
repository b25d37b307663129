//! Embedding generation using model providers.
//!
//! This module binds a [`Provider`] to an embedding model so that indexing and
//! search are guaranteed to embed text the same way.

use crate::config::{Config, EmbeddingBackend};
use crate::provider::{HashingProvider, OllamaProvider, Provider, ProviderError};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during embedding generation.
#[derive(Debug, Error)]
pub enum EmbedderError {
    /// The provider returned an error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The provider answered with an empty vector.
    #[error("No embeddings returned")]
    NoEmbeddings,
}

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedderError>;

/// Generates vector embeddings for text using a provider's embedding model.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn Provider>,
    model: String,
}

impl Embedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Builds the embedder selected by `config.embedding.backend`.
    pub fn from_config(config: &Config) -> Self {
        match &config.embedding.backend {
            EmbeddingBackend::Ollama { model } => {
                Self::new(Arc::new(OllamaProvider::from_config(config)), model.clone())
            }
            EmbeddingBackend::Hashing { dimensions } => {
                Self::new(Arc::new(HashingProvider::new(*dimensions)), "hashing")
            }
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generates a vector embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails or answers with an empty vector.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self.provider.embed(text, &self.model).await?;
        if embedding.is_empty() {
            return Err(EmbedderError::NoEmbeddings);
        }
        Ok(embedding)
    }

    /// Embeds many texts with at most `concurrency` calls in flight.
    ///
    /// The returned vectors are in the same order as `texts`, whatever order
    /// the calls complete in. The first failure aborts the batch.
    pub async fn embed_batch<S: AsRef<str>>(
        &self,
        texts: &[S],
        concurrency: usize,
    ) -> Result<Vec<Vec<f32>>> {
        stream::iter(texts.iter().map(|text| self.embed(text.as_ref())))
            .buffered(concurrency.max(1))
            .try_collect()
            .await
    }
}
