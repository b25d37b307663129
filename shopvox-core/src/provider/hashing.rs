//! Deterministic, offline embedding provider.

use super::types::*;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// A lightweight, deterministic provider that hashes tokens into a
/// fixed-size vector.
///
/// Not meant for production-grade semantic search, but it keeps indexing and
/// search fully functional without a model server. Tokens are lowercased
/// alphanumeric runs; each token increments one bucket chosen by its SHA-256
/// digest, and the result is L2-normalised. Identical texts always produce
/// identical vectors, across processes and platforms.
///
/// Chat completions are not supported.
#[derive(Debug, Clone)]
pub struct HashingProvider {
    dimensions: usize,
}

impl HashingProvider {
    /// Creates a provider producing vectors of `dimensions` components
    /// (at least one).
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(prefix) % self.dimensions as u64) as usize
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for token in tokenize(text) {
            vector[self.bucket(&token)] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        vector
    }
}

impl Default for HashingProvider {
    fn default() -> Self {
        Self::new(256)
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
}

#[async_trait]
impl Provider for HashingProvider {
    async fn chat<'a>(
        &'a self,
        _request: ChatRequest,
        _callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
    ) -> Result<()> {
        Err(ProviderError::Unsupported("chat completion"))
    }

    async fn embed(&self, text: &str, _model: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }
}
