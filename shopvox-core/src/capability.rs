//! Failure model shared by the pluggable capabilities (refinement,
//! prettification, transcription).
//!
//! A capability failure is never fatal to a query: callers log it and fall
//! back to a degraded result.

use crate::provider::ProviderError;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("{capability} timed out after {after:?}")]
    Timeout {
        capability: &'static str,
        after: Duration,
    },

    #[error("{capability} call failed: {source}")]
    Provider {
        capability: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("{capability} returned malformed output: {detail}")]
    Malformed {
        capability: &'static str,
        detail: String,
    },

    #[error("{capability} failed: {detail}")]
    Failed {
        capability: &'static str,
        detail: String,
    },
}

impl CapabilityError {
    pub fn provider(capability: &'static str, source: ProviderError) -> Self {
        Self::Provider { capability, source }
    }

    pub fn malformed(capability: &'static str, detail: impl Into<String>) -> Self {
        Self::Malformed {
            capability,
            detail: detail.into(),
        }
    }

    pub fn failed(capability: &'static str, detail: impl Into<String>) -> Self {
        Self::Failed {
            capability,
            detail: detail.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Runs a capability call under a deadline. Expiry is reported as
/// [`CapabilityError::Timeout`].
pub async fn with_timeout<T, F>(capability: &'static str, after: Duration, call: F) -> Result<T, CapabilityError>
where
    F: Future<Output = Result<T, CapabilityError>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(CapabilityError::Timeout { capability, after }),
    }
}
