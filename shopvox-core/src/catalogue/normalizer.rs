//! Raw catalogue rows to [`CatalogueRecord`]s.
//!
//! Normalization never fails as a whole: a field that cannot be used is
//! replaced by its default and reported as an issue.

use super::record::{CatalogueRecord, Specification, DEFAULT_BRAND, DEFAULT_DESCRIPTION};
use super::RawRow;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    /// A present value could not be coerced to the field's kind. The field
    /// was defaulted.
    #[error("row {row}: field `{field}` holds an unusable value {value:?}")]
    InvalidFieldKind {
        row: usize,
        field: &'static str,
        value: String,
    },
}

/// Output of a normalization pass: records in input order, plus every
/// field that had to be defaulted because it was malformed.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub records: Vec<CatalogueRecord>,
    pub issues: Vec<NormalizeError>,
}

/// Normalizes every row, preserving input order.
pub fn normalize_rows<I>(rows: I) -> Normalized
where
    I: IntoIterator<Item = RawRow>,
{
    let mut normalized = Normalized::default();

    for (index, row) in rows.into_iter().enumerate() {
        let record = normalize_row(index, &row, &mut normalized.issues);
        normalized.records.push(record);
    }

    if !normalized.issues.is_empty() {
        warn!(
            issues = normalized.issues.len(),
            records = normalized.records.len(),
            "Catalogue normalized with defaulted fields"
        );
    }

    normalized
}

/// Normalizes a single row. `index` is the row's position in the input and
/// provides the fallback id.
pub fn normalize_row(index: usize, row: &RawRow, issues: &mut Vec<NormalizeError>) -> CatalogueRecord {
    let mut record = CatalogueRecord::new(record_id(index, row));

    record.name = text_field(row, &["product_name", "name"]).unwrap_or_default();
    record.category_path = field(row, "product_category_tree")
        .map(parse_category)
        .unwrap_or_default();
    record.description =
        text_field(row, &["description"]).unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());
    record.brand = text_field(row, &["brand"]).unwrap_or_else(|| DEFAULT_BRAND.to_string());
    record.retail_price = price_field(index, row, "retail_price", issues);
    record.discounted_price = price_field(index, row, "discounted_price", issues);
    record.specifications = field(row, "product_specifications")
        .map(parse_specifications)
        .unwrap_or_default();
    record.images = field(row, "image").map(parse_images).unwrap_or_default();
    record.product_rating = field(row, "product_rating").and_then(parse_rating);
    record.overall_rating = field(row, "overall_rating").and_then(parse_rating);
    record.promoted = field(row, "is_FK_Advantage_product")
        .map(parse_flag)
        .unwrap_or(false);
    record.url = text_field(row, &["product_url", "url"]).unwrap_or_default();

    record
}

/// Looks a column up, treating nulls and blank strings as absent.
fn field<'a>(row: &'a RawRow, name: &str) -> Option<&'a Value> {
    match row.get(name)? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        value => Some(value),
    }
}

fn text_field(row: &RawRow, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| field(row, name))
        .and_then(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn record_id(index: usize, row: &RawRow) -> String {
    text_field(row, &["uniq_id", "pid"])
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("row-{}", index))
}

fn price_field(index: usize, row: &RawRow, name: &'static str, issues: &mut Vec<NormalizeError>) -> f64 {
    let Some(value) = field(row, name) else {
        return 0.0;
    };

    match parse_price(value) {
        Some(price) => price,
        None => {
            let issue = NormalizeError::InvalidFieldKind {
                row: index,
                field: name,
                value: value.to_string(),
            };
            debug!(%issue, "Defaulting price to 0");
            issues.push(issue);
            0.0
        }
    }
}

fn parse_price(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_start_matches("Rs.")
                .chars()
                .filter(|c| !matches!(c, ',' | '₹' | ' '))
                .collect();
            cleaned.parse::<f64>().ok()?
        }
        _ => return None,
    };

    (price.is_finite() && price >= 0.0).then_some(price)
}

/// `["Footwear >> Men's Footwear >> Shoes"]` becomes
/// `Footwear / Men's Footwear / Shoes`.
fn parse_category(value: &Value) -> String {
    let levels: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.starts_with('[') {
                serde_json::from_str::<Vec<String>>(trimmed).unwrap_or_else(|_| {
                    vec![trimmed
                        .trim_matches(|c| c == '[' || c == ']' || c == '"')
                        .to_string()]
                })
            } else {
                vec![trimmed.to_string()]
            }
        }
        other => scalar_text(other).into_iter().collect(),
    };

    levels
        .iter()
        .flat_map(|level| level.split(">>"))
        .map(str::trim)
        .filter(|level| !level.is_empty())
        .collect::<Vec<_>>()
        .join(" / ")
}

/// Accepts a JSON list (encoded or not) of URLs. Anything else is treated as
/// no images.
fn parse_images(value: &Value) -> Vec<String> {
    let items = match value {
        Value::Array(items) => items.clone(),
        Value::String(s) => serde_json::from_str::<Vec<Value>>(s.trim()).unwrap_or_default(),
        _ => Vec::new(),
    };

    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}

/// Accepts the catalogue's `{"product_specification"=>[{"key"=>..,"value"=>..}]}`
/// notation, the same shape as JSON, a bare list of entries, or a flat object.
fn parse_specifications(value: &Value) -> Vec<Specification> {
    match value {
        Value::String(s) => serde_json::from_str::<Value>(&s.replace("=>", ":"))
            .map(|parsed| parse_specifications(&parsed))
            .unwrap_or_default(),
        Value::Object(map) => {
            if let Some(nested) = map.get("product_specification") {
                parse_specifications(nested)
            } else if map.contains_key("value") {
                specification_entry(value).into_iter().collect()
            } else {
                map.iter()
                    .filter_map(|(key, v)| scalar_text(v).map(|text| Specification::new(key.clone(), text)))
                    .collect()
            }
        }
        Value::Array(items) => items.iter().filter_map(specification_entry).collect(),
        _ => Vec::new(),
    }
}

fn specification_entry(value: &Value) -> Option<Specification> {
    let key = value.get("key").and_then(scalar_text).unwrap_or_default();
    let entry_value = value.get("value").and_then(scalar_text).unwrap_or_default();
    if key.is_empty() && entry_value.is_empty() {
        return None;
    }
    Some(Specification::new(key, entry_value))
}

/// Numeric ratings are kept; placeholders such as `No rating available`
/// become null.
fn parse_rating(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|rating| rating.is_finite())
}

fn parse_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> RawRow {
        match value {
            Value::Object(map) => map,
            _ => panic!("test rows must be objects"),
        }
    }

    fn flipkart_row() -> RawRow {
        row(json!({
            "uniq_id": "c2d766ca982eca8304150849735ffef9",
            "product_name": "Alisha Solid Women's Cycling Shorts",
            "product_category_tree": "[\"Clothing >> Women's Clothing >> Lingerie, Sleep & Swimwear >> Shorts\"]",
            "retail_price": "999",
            "discounted_price": "379",
            "image": "[\"http://img5a.flixcart.com/image/short/u/4/a/altht-3p-21-alisha-38-original-imaeh2d5vm5zbtgg.jpeg\", \"http://img5a.flixcart.com/image/short/p/j/z/altght4p-26-alisha-38-original-imaeh2d5kbufss6n.jpeg\"]",
            "is_FK_Advantage_product": "False",
            "description": "Key Features of Alisha Solid Women's Cycling Shorts",
            "product_rating": "No rating available",
            "overall_rating": "No rating available",
            "brand": "Alisha",
            "product_specifications": "{\"product_specification\"=>[{\"key\"=>\"Number of Contents in Sales Package\", \"value\"=>\"Pack of 3\"}, {\"key\"=>\"Fabric\", \"value\"=>\"Cotton Lycra\"}, {\"value\"=>\"Machine wash\"}]}",
            "product_url": "http://www.flipkart.com/alisha-solid-women-s-cycling-shorts/p/itmeh2ffvzetthbb",
            "crawl_timestamp": "2016-03-25 22:59:23 +0000"
        }))
    }

    #[test]
    fn test_flipkart_row_normalizes() {
        let mut issues = Vec::new();
        let record = normalize_row(0, &flipkart_row(), &mut issues);

        assert!(issues.is_empty());
        assert_eq!(record.id, "c2d766ca982eca8304150849735ffef9");
        assert_eq!(
            record.category_path,
            "Clothing / Women's Clothing / Lingerie, Sleep & Swimwear / Shorts"
        );
        assert_eq!(record.retail_price, 999.0);
        assert_eq!(record.discounted_price, 379.0);
        assert_eq!(record.images.len(), 2);
        assert_eq!(record.product_rating, None);
        assert!(!record.promoted);
        assert_eq!(
            record.specifications,
            vec![
                Specification::new("Number of Contents in Sales Package", "Pack of 3"),
                Specification::new("Fabric", "Cotton Lycra"),
                Specification::new("", "Machine wash"),
            ]
        );
    }

    #[test]
    fn test_empty_row_gets_every_default() {
        let mut issues = Vec::new();
        let record = normalize_row(7, &RawRow::new(), &mut issues);

        assert!(issues.is_empty());
        assert_eq!(record, CatalogueRecord::new("row-7"));
    }

    #[test]
    fn test_unparseable_price_is_reported_and_defaulted() {
        let mut issues = Vec::new();
        let record = normalize_row(
            3,
            &row(json!({ "retail_price": "call for price", "discounted_price": -5 })),
            &mut issues,
        );

        assert_eq!(record.retail_price, 0.0);
        assert_eq!(record.discounted_price, 0.0);
        assert_eq!(issues.len(), 2);
        assert!(matches!(
            &issues[0],
            NormalizeError::InvalidFieldKind { row: 3, field: "retail_price", .. }
        ));
    }

    #[test]
    fn test_blank_and_null_values_are_absent() {
        let mut issues = Vec::new();
        let record = normalize_row(
            0,
            &row(json!({ "retail_price": "  ", "brand": null, "description": "" })),
            &mut issues,
        );

        assert!(issues.is_empty());
        assert_eq!(record.retail_price, 0.0);
        assert_eq!(record.brand, DEFAULT_BRAND);
        assert_eq!(record.description, DEFAULT_DESCRIPTION);
    }

    #[test]
    fn test_malformed_containers_default_to_empty() {
        let mut issues = Vec::new();
        let record = normalize_row(
            0,
            &row(json!({ "image": "not a list", "product_specifications": "{broken" })),
            &mut issues,
        );

        assert!(issues.is_empty());
        assert!(record.images.is_empty());
        assert!(record.specifications.is_empty());
    }

    #[test]
    fn test_flat_specification_object() {
        let specs = parse_specifications(&json!({ "Color": "Red", "Size": 9 }));
        assert_eq!(
            specs,
            vec![Specification::new("Color", "Red"), Specification::new("Size", "9")]
        );
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let mut issues = Vec::new();
        let first = normalize_row(0, &flipkart_row(), &mut issues);
        let second = normalize_row(0, &first.to_row(), &mut issues);

        assert!(issues.is_empty());
        assert_eq!(first, second);

        let defaults = CatalogueRecord::new("row-1");
        assert_eq!(normalize_row(1, &defaults.to_row(), &mut issues), defaults);
    }

    #[test]
    fn test_rows_keep_input_order() {
        let rows = vec![
            row(json!({ "product_name": "first" })),
            row(json!({ "product_name": "second" })),
            row(json!({ "product_name": "third", "retail_price": "n/a" })),
        ];
        let normalized = normalize_rows(rows);

        let names: Vec<_> = normalized.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["first", "second", "third"]);
        assert_eq!(normalized.records[2].id, "row-2");
        assert_eq!(normalized.issues.len(), 1);
    }
}
