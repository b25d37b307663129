//! Shaping search hits into user-facing [`ProductResult`]s.
//!
//! Records are reduced to the fields a shopper cares about
//! ([`PrettifyInput`]) and handed to a [`Prettifier`] as JSON. Whatever comes
//! back is validated field by field: the shaper always yields exactly one
//! result per record, with `"N/A"` standing in for anything missing.

mod llm;
mod passthrough;

pub use llm::LlmPrettifier;
pub use passthrough::PassthroughPrettifier;

use crate::capability::{with_timeout, CapabilityError};
use crate::catalogue::{CatalogueRecord, Specification};
use crate::config::{Config, ShapingMode};
use crate::provider::OllamaProvider;
use async_trait::async_trait;
use futures::future;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Placeholder for a field the prettifier did not provide.
pub const NOT_AVAILABLE: &str = "N/A";

/// A product as presented to the shopper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductResult {
    pub name: String,
    pub price: String,
    pub category: String,
    pub description: String,
    /// One specification per line
    pub specifications: String,
    pub url: String,
    /// Deduplicated, in first-seen order; empty when there are none
    pub images: Vec<String>,
}

impl ProductResult {
    /// The result used when a record could not be prettified at all.
    pub fn unavailable() -> Self {
        Self {
            name: NOT_AVAILABLE.to_string(),
            price: NOT_AVAILABLE.to_string(),
            category: NOT_AVAILABLE.to_string(),
            description: NOT_AVAILABLE.to_string(),
            specifications: NOT_AVAILABLE.to_string(),
            url: NOT_AVAILABLE.to_string(),
            images: Vec::new(),
        }
    }

    /// Reads a prettifier answer. Missing, empty or oddly typed fields become
    /// `"N/A"`. Returns `None` if `value` is not an object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let field = |key: &str| text_field(object.get(key));

        Some(Self {
            name: field("name"),
            price: field("price"),
            category: field("category"),
            description: field("description"),
            specifications: field("specifications"),
            url: field("url"),
            images: image_field(object.get("images")),
        })
    }
}

fn text_field(value: Option<&Value>) -> String {
    let text = match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    };

    if text.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        text
    }
}

fn image_field(value: Option<&Value>) -> Vec<String> {
    let urls: Vec<String> = match value {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        Some(Value::String(url)) => vec![url.clone()],
        _ => Vec::new(),
    };
    dedup_images(urls)
}

/// Drops blank and repeated URLs, keeping first-seen order.
pub fn dedup_images<I>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    urls.into_iter()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty() && url != NOT_AVAILABLE)
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// The record fields sent to a prettifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrettifyInput {
    pub name: String,
    pub category: String,
    pub description: String,
    pub brand: String,
    pub retail_price: f64,
    pub discounted_price: f64,
    pub specifications: Vec<Specification>,
    pub url: String,
    pub images: Vec<String>,
}

impl From<&CatalogueRecord> for PrettifyInput {
    fn from(record: &CatalogueRecord) -> Self {
        Self {
            name: record.name.clone(),
            category: record.category_path.clone(),
            description: record.description.clone(),
            brand: record.brand.clone(),
            retail_price: record.retail_price,
            discounted_price: record.discounted_price,
            specifications: record.specifications.clone(),
            url: record.url.clone(),
            images: record.images.clone(),
        }
    }
}

/// Turns selected record fields into product dictionaries.
///
/// Given a JSON array of [`PrettifyInput`] objects, implementations return
/// one object per input, in order, with the [`ProductResult`] keys.
#[async_trait]
pub trait Prettifier: Send + Sync {
    fn name(&self) -> &str;

    async fn prettify(&self, input: &Value) -> Result<Vec<Value>, CapabilityError>;
}

/// Builds the prettifier selected by `config.shaping.mode`.
pub fn from_config(config: &Config) -> Arc<dyn Prettifier> {
    let currency = config.shaping.currency.clone();
    match config.shaping.mode {
        ShapingMode::Passthrough => Arc::new(PassthroughPrettifier::new(currency)),
        ShapingMode::Llm => Arc::new(LlmPrettifier::new(
            Arc::new(OllamaProvider::from_config(config)),
            config.llm.model.clone(),
            config.llm.temperature,
            currency,
        )),
    }
}

/// Maps records to [`ProductResult`]s through a [`Prettifier`].
///
/// The whole batch is prettified in one call first. Records the batch answer
/// does not cover (the call failed, timed out, returned the wrong number of
/// entries, or a non-object entry) are retried one at a time, and a record
/// that fails on its own gets [`ProductResult::unavailable`].
#[derive(Clone)]
pub struct ResultShaper {
    prettifier: Arc<dyn Prettifier>,
    timeout: Duration,
}

impl ResultShaper {
    pub fn new(prettifier: Arc<dyn Prettifier>, timeout: Duration) -> Self {
        Self { prettifier, timeout }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(from_config(config), config.llm.timeout())
    }

    /// Shapes `records`. The output has exactly one entry per record, in
    /// order.
    pub async fn shape(&self, records: &[CatalogueRecord]) -> Vec<ProductResult> {
        if records.is_empty() {
            return Vec::new();
        }

        let inputs: Vec<PrettifyInput> = records.iter().map(PrettifyInput::from).collect();
        let mut shaped = self.shape_batch(&inputs).await;

        let missing: Vec<usize> = (0..shaped.len()).filter(|&i| shaped[i].is_none()).collect();
        if !missing.is_empty() {
            debug!(records = missing.len(), "Prettifying records individually");
            let retries = future::join_all(missing.iter().map(|&i| self.shape_one(&inputs[i]))).await;
            for (i, result) in missing.into_iter().zip(retries) {
                shaped[i] = Some(result);
            }
        }

        shaped
            .into_iter()
            .map(|result| result.unwrap_or_else(ProductResult::unavailable))
            .collect()
    }

    async fn shape_batch(&self, inputs: &[PrettifyInput]) -> Vec<Option<ProductResult>> {
        match self.call(inputs).await {
            Ok(values) if values.len() == inputs.len() => values.iter().map(ProductResult::from_value).collect(),
            Ok(values) => {
                warn!(
                    prettifier = self.prettifier.name(),
                    expected = inputs.len(),
                    got = values.len(),
                    "Prettifier answered with the wrong number of products"
                );
                vec![None; inputs.len()]
            }
            Err(e) => {
                warn!(prettifier = self.prettifier.name(), error = %e, "Batch prettify failed");
                vec![None; inputs.len()]
            }
        }
    }

    async fn shape_one(&self, input: &PrettifyInput) -> ProductResult {
        let result = self
            .call(std::slice::from_ref(input))
            .await
            .and_then(|values| match values.as_slice() {
                [value] => ProductResult::from_value(value)
                    .ok_or_else(|| CapabilityError::malformed("prettify", "entry is not an object")),
                other => Err(CapabilityError::malformed(
                    "prettify",
                    format!("expected 1 product, got {}", other.len()),
                )),
            });

        result.unwrap_or_else(|e| {
            warn!(
                prettifier = self.prettifier.name(),
                product = %input.name,
                error = %e,
                "Prettify failed, using placeholder fields"
            );
            ProductResult::unavailable()
        })
    }

    async fn call(&self, inputs: &[PrettifyInput]) -> Result<Vec<Value>, CapabilityError> {
        let payload =
            serde_json::to_value(inputs).map_err(|e| CapabilityError::failed("prettify", e.to_string()))?;
        with_timeout("prettify", self.timeout, self.prettifier.prettify(&payload)).await
    }
}
