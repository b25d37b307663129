//! Model provider abstraction layer.
//!
//! This module defines a common interface for the backends that supply
//! chat completions (query refinement, result prettification) and
//! embeddings (indexing, search).

mod types;
pub mod hashing;
pub mod ollama;

// Re-export common types
pub use types::{
    ChatRequest,
    ChatResponse,
    EmbedRequest,
    EmbedResponse,
    Message,
    Provider,
    ProviderError,
    Result,
};

// Re-export provider implementations
pub use hashing::HashingProvider;
pub use ollama::OllamaProvider;

/// Runs a chat request to completion and returns the concatenated content
/// of every streamed chunk.
pub async fn complete(provider: &dyn Provider, request: ChatRequest) -> Result<String> {
    let mut full_response = String::new();

    provider
        .chat(
            request,
            Box::new(|response| {
                if !response.content.is_empty() {
                    full_response.push_str(&response.content);
                }
            }),
        )
        .await?;

    Ok(full_response)
}
