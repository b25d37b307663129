//! Turning a noisy spoken transcript into a compact retrieval query.
//!
//! A [`QueryRefiner`] emits a comma-separated list of at most
//! [`MAX_TERMS`] terms: `"exact phrase"`, `(optional)` and `-excluded` terms
//! next to plain ones. Refiners may only rearrange and drop what the
//! transcript says, never add to it.
//!
//! [`refine_query`] wraps any refiner with the degraded-mode contract: empty
//! input short-circuits, and a failing or slow refiner is replaced by the
//! trimmed transcript itself.

mod llm;
mod rules;

pub use llm::LlmRefiner;
pub use rules::RuleRefiner;

use crate::capability::{with_timeout, CapabilityError};
use crate::config::{Config, RefinerMode};
use crate::provider::OllamaProvider;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on the number of terms in a refined query.
pub const MAX_TERMS: usize = 7;

#[async_trait]
pub trait QueryRefiner: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Refines a non-empty transcript.
    async fn refine(&self, transcript: &str) -> Result<String, CapabilityError>;
}

/// Builds the refiner selected by `config.refiner.mode`.
pub fn from_config(config: &Config) -> Arc<dyn QueryRefiner> {
    match config.refiner.mode {
        RefinerMode::Rules => Arc::new(RuleRefiner::new()),
        RefinerMode::Llm => Arc::new(LlmRefiner::new(
            Arc::new(OllamaProvider::from_config(config)),
            config.llm.model.clone(),
            config.llm.temperature,
        )),
    }
}

/// The query to search for, and whether it came from the fallback path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refinement {
    pub query: String,
    pub degraded: bool,
}

/// Refines `transcript` under `timeout`.
///
/// Empty or whitespace-only input yields an empty query without calling the
/// refiner. Any refiner failure (including a timeout or an empty answer)
/// falls back to the trimmed transcript.
pub async fn refine_query(refiner: &dyn QueryRefiner, transcript: &str, timeout: Duration) -> Refinement {
    let trimmed = transcript.trim();
    if trimmed.is_empty() {
        return Refinement {
            query: String::new(),
            degraded: false,
        };
    }

    let outcome = with_timeout("refine", timeout, refiner.refine(trimmed)).await;
    match outcome {
        Ok(query) if !query.trim().is_empty() => {
            let query = query.trim().to_string();
            debug!(refiner = refiner.name(), %query, "Refined transcript");
            Refinement {
                query,
                degraded: false,
            }
        }
        Ok(_) => {
            warn!(refiner = refiner.name(), "Refiner returned nothing, using raw transcript");
            degraded(trimmed)
        }
        Err(e) => {
            warn!(refiner = refiner.name(), error = %e, "Refinement failed, using raw transcript");
            degraded(trimmed)
        }
    }
}

fn degraded(trimmed: &str) -> Refinement {
    Refinement {
        query: trimmed.to_string(),
        degraded: true,
    }
}
