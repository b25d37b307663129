use super::Prettifier;
use crate::capability::CapabilityError;
use crate::provider::{complete, ChatRequest, Message, Provider};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

fn instructions(currency: &str) -> String {
    format!(
        "\
You present product search results to shoppers.

The user sends a JSON array of products. For each product, in the same order, produce one JSON object \
with exactly these keys:
- \"name\": the product name
- \"price\": the price in {currency}, converted from any other currency; use the discounted price when \
it is set, otherwise the retail price
- \"category\": the category path
- \"description\": the description, cleaned up and easy to read
- \"specifications\": the relevant specifications, one per line, separated by \\n
- \"url\": the product page URL
- \"images\": the list of image URLs without duplicates, or [] when there are none

Use \"N/A\" for anything that is missing. Leave out details a shopper would not care about.

Answer with the JSON array only, with nothing before or after it."
    )
}

/// Prettifies results with a chat model.
pub struct LlmPrettifier {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f64,
    currency: String,
}

impl LlmPrettifier {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            currency: currency.into(),
        }
    }
}

#[async_trait]
impl Prettifier for LlmPrettifier {
    fn name(&self) -> &str {
        "llm"
    }

    async fn prettify(&self, input: &Value) -> Result<Vec<Value>, CapabilityError> {
        let payload =
            serde_json::to_string_pretty(input).map_err(|e| CapabilityError::failed("prettify", e.to_string()))?;
        let request = ChatRequest::new(
            self.model.clone(),
            vec![Message::system(instructions(&self.currency)), Message::user(payload)],
        )
        .with_temperature(self.temperature);

        let answer = complete(self.provider.as_ref(), request)
            .await
            .map_err(|e| CapabilityError::provider("prettify", e))?;

        parse_product_list(&answer)
    }
}

/// Extracts the JSON array from a model answer, ignoring any chatter or code
/// fences around it.
fn parse_product_list(answer: &str) -> Result<Vec<Value>, CapabilityError> {
    let start = answer.find('[');
    let end = answer.rfind(']');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &answer[start..=end],
        _ => return Err(CapabilityError::malformed("prettify", "no JSON array in answer")),
    };

    serde_json::from_str(json).map_err(|e| CapabilityError::malformed("prettify", e.to_string()))
}
