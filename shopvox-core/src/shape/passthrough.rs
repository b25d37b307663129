use super::{Prettifier, PrettifyInput};
use crate::capability::CapabilityError;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Maps record fields straight onto the result keys, without a model.
///
/// The price is the discounted price when set, otherwise the retail price,
/// prefixed with the configured currency code. Specifications become
/// `key: value` lines.
#[derive(Debug, Clone)]
pub struct PassthroughPrettifier {
    currency: String,
}

impl PassthroughPrettifier {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
        }
    }

    fn product(&self, input: &PrettifyInput) -> Value {
        let specifications = input
            .specifications
            .iter()
            .map(|spec| {
                if spec.key.is_empty() {
                    spec.value.clone()
                } else {
                    format!("{}: {}", spec.key, spec.value)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        json!({
            "name": input.name,
            "price": self.price(input),
            "category": input.category,
            "description": input.description,
            "specifications": specifications,
            "url": input.url,
            "images": input.images,
        })
    }

    fn price(&self, input: &PrettifyInput) -> String {
        let amount = if input.discounted_price > 0.0 {
            input.discounted_price
        } else {
            input.retail_price
        };

        if amount <= 0.0 {
            String::new()
        } else if amount.fract() == 0.0 {
            format!("{} {}", self.currency, amount)
        } else {
            format!("{} {:.2}", self.currency, amount)
        }
    }
}

#[async_trait]
impl Prettifier for PassthroughPrettifier {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn prettify(&self, input: &Value) -> Result<Vec<Value>, CapabilityError> {
        let inputs: Vec<PrettifyInput> = serde_json::from_value(input.clone())
            .map_err(|e| CapabilityError::malformed("prettify", e.to_string()))?;
        Ok(inputs.iter().map(|i| self.product(i)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{CatalogueRecord, Specification};
    use crate::shape::{ProductResult, ResultShaper, NOT_AVAILABLE};
    use std::sync::Arc;
    use std::time::Duration;

    fn input(retail: f64, discounted: f64) -> PrettifyInput {
        let mut record = CatalogueRecord::new("p1");
        record.name = "Runner".into();
        record.retail_price = retail;
        record.discounted_price = discounted;
        record.specifications = vec![Specification::new("Color", "Red"), Specification::new("", "Lace-up")];
        PrettifyInput::from(&record)
    }

    #[test]
    fn test_price_uses_discount_and_currency() {
        let prettifier = PassthroughPrettifier::new("INR");
        assert_eq!(prettifier.price(&input(999.0, 499.0)), "INR 499");
        assert_eq!(prettifier.price(&input(999.0, 0.0)), "INR 999");
        assert_eq!(prettifier.price(&input(12.5, 0.0)), "INR 12.50");
        assert_eq!(prettifier.price(&input(0.0, 0.0)), "");
    }

    #[test]
    fn test_specifications_as_lines() {
        let product = PassthroughPrettifier::new("INR").product(&input(1.0, 0.0));
        assert_eq!(product["specifications"], "Color: Red\nLace-up");
    }

    #[tokio::test]
    async fn test_through_shaper() {
        let mut free = CatalogueRecord::new("p2");
        free.name = "Sample".into();
        free.images = vec!["http://x/1.jpg".into(), "http://x/1.jpg".into()];

        let shaper = ResultShaper::new(Arc::new(PassthroughPrettifier::new("INR")), Duration::from_secs(1));
        let results = shaper.shape(&[free]).await;

        assert_eq!(
            results,
            vec![ProductResult {
                name: "Sample".into(),
                price: NOT_AVAILABLE.into(),
                category: NOT_AVAILABLE.into(),
                description: "No description available".into(),
                specifications: NOT_AVAILABLE.into(),
                url: NOT_AVAILABLE.into(),
                images: vec!["http://x/1.jpg".into()],
            }]
        );
    }

    #[tokio::test]
    async fn test_malformed_input_is_capability_error() {
        let result = PassthroughPrettifier::new("INR").prettify(&json!({"not": "a list"})).await;
        assert!(matches!(result, Err(CapabilityError::Malformed { .. })));
    }
}
