use super::{QueryRefiner, MAX_TERMS};
use crate::capability::CapabilityError;
use crate::provider::{complete, ChatRequest, Message, Provider};
use async_trait::async_trait;
use std::sync::Arc;

const INSTRUCTIONS: &str = "\
You turn transcripts of spoken shopping requests into search queries for a product catalogue.

Rules:
- If the transcript is already a short, clear product search, answer with it unchanged.
- Otherwise keep only what helps find the product: the product category, features or specifications, \
brand names, price limits (assume INR when no currency is said) and what the product is for.
- Drop filler words, greetings and conversational phrasing.
- Write the terms separated by commas, at most 7 of them.
- Put exact multi-word phrases in double quotes, optional terms in parentheses, and prefix terms \
the user wants to avoid with a minus sign.
- Never add anything the transcript does not say.

Answer with the query only, on a single line, without explanations.";

/// Refines transcripts with a chat model.
pub struct LlmRefiner {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f64,
}

impl LlmRefiner {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, temperature: f64) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
        }
    }
}

#[async_trait]
impl QueryRefiner for LlmRefiner {
    fn name(&self) -> &str {
        "llm"
    }

    async fn refine(&self, transcript: &str) -> Result<String, CapabilityError> {
        let request = ChatRequest::new(
            self.model.clone(),
            vec![Message::system(INSTRUCTIONS), Message::user(transcript)],
        )
        .with_temperature(self.temperature);

        let answer = complete(self.provider.as_ref(), request)
            .await
            .map_err(|e| CapabilityError::provider("refine", e))?;

        let query = clean_answer(&answer);
        if query.is_empty() {
            return Err(CapabilityError::malformed("refine", "empty query"));
        }
        Ok(query)
    }
}

/// Keeps the first non-empty line, strips a wrapping code fence or quote
/// pair and cuts the term list down to [`MAX_TERMS`].
fn clean_answer(answer: &str) -> String {
    let line = answer
        .lines()
        .map(|l| l.trim().trim_matches('`').trim())
        .find(|l| !l.is_empty())
        .unwrap_or_default();

    let line = match line.strip_prefix('"').and_then(|l| l.strip_suffix('"')) {
        Some(inner) if !inner.contains('"') => inner.trim(),
        _ => line,
    };

    line.split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .take(MAX_TERMS)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedChat;

    #[tokio::test]
    async fn test_sends_instructions_and_transcript() {
        let chat = Arc::new(ScriptedChat::new([Ok("running shoes, \"Nike\", under 3000")]));
        let refiner = LlmRefiner::new(chat.clone(), "llama3.2:3b", 0.2);

        let query = refiner
            .refine("um I need Nike running shoes under 3000")
            .await
            .unwrap();
        assert_eq!(query, "running shoes, \"Nike\", under 3000");

        let requests = chat.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "llama3.2:3b");
        assert_eq!(requests[0].temperature, 0.2);
        assert_eq!(requests[0].messages[0].role, "system");
        assert_eq!(
            requests[0].messages[1],
            Message::user("um I need Nike running shoes under 3000")
        );
    }

    #[tokio::test]
    async fn test_provider_error_is_capability_error() {
        let refiner = LlmRefiner::new(Arc::new(ScriptedChat::new([Err("boom")])), "m", 0.0);
        let result = refiner.refine("red shoes").await;
        assert!(matches!(result, Err(CapabilityError::Provider { .. })));
    }

    #[tokio::test]
    async fn test_blank_answer_is_malformed() {
        let refiner = LlmRefiner::new(Arc::new(ScriptedChat::new([Ok("\n  \n")])), "m", 0.0);
        let result = refiner.refine("red shoes").await;
        assert!(matches!(result, Err(CapabilityError::Malformed { .. })));
    }

    #[test]
    fn test_clean_answer() {
        assert_eq!(clean_answer("```\nshoes, red\n```"), "shoes, red");
        assert_eq!(clean_answer("\"shoes, red\""), "shoes, red");
        assert_eq!(clean_answer("\"Red Tape\", shoes"), "\"Red Tape\", shoes");
        assert_eq!(clean_answer("a, b, c, d, e, f, g, h, i"), "a, b, c, d, e, f, g");
    }
}
