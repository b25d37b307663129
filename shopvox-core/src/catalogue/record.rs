use serde::{Deserialize, Serialize};

pub const DEFAULT_DESCRIPTION: &str = "No description available";
pub const DEFAULT_BRAND: &str = "Unknown";
pub const NO_RATING: &str = "No rating available";

/// A single specification line, e.g. `Color: Red`.
///
/// Value-only entries from the source catalogue keep an empty key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specification {
    pub key: String,
    pub value: String,
}

impl Specification {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A normalized catalogue entry.
///
/// Every field is always present; missing source data is replaced by the
/// documented default during normalization and records are never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogueRecord {
    pub id: String,
    pub name: String,
    /// Ordered taxonomy, levels joined with ` / `
    pub category_path: String,
    pub description: String,
    pub brand: String,
    pub retail_price: f64,
    pub discounted_price: f64,
    pub specifications: Vec<Specification>,
    pub images: Vec<String>,
    pub product_rating: Option<f64>,
    pub overall_rating: Option<f64>,
    /// Promotional flag (`is_FK_Advantage_product` in the source catalogue)
    pub promoted: bool,
    pub url: String,
}

impl CatalogueRecord {
    /// Creates a record with every field at its default.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            category_path: String::new(),
            description: DEFAULT_DESCRIPTION.to_string(),
            brand: DEFAULT_BRAND.to_string(),
            retail_price: 0.0,
            discounted_price: 0.0,
            specifications: Vec::new(),
            images: Vec::new(),
            product_rating: None,
            overall_rating: None,
            promoted: false,
            url: String::new(),
        }
    }

    /// The text embedded for this record.
    ///
    /// Name, category, description, both ratings, brand, specifications and
    /// the promotional flag, in that order, separated by single spaces.
    pub fn projection_text(&self) -> String {
        let specifications = self
            .specifications
            .iter()
            .map(|spec| {
                if spec.key.is_empty() {
                    spec.value.clone()
                } else {
                    format!("{} {}", spec.key, spec.value)
                }
            })
            .collect::<Vec<_>>()
            .join(" ");

        [
            self.name.clone(),
            self.category_path.clone(),
            self.description.clone(),
            rating_text(self.product_rating),
            rating_text(self.overall_rating),
            self.brand.clone(),
            specifications,
            self.promoted.to_string(),
        ]
        .join(" ")
    }
}

#[cfg(test)]
impl CatalogueRecord {
    /// Converts the record back into a raw catalogue row using the source
    /// column names. Normalizing the row yields an identical record.
    pub(crate) fn to_row(&self) -> serde_json::Map<String, serde_json::Value> {
        use serde_json::{json, Map};

        let mut row = Map::new();
        row.insert("uniq_id".into(), json!(self.id));
        row.insert("product_name".into(), json!(self.name));
        row.insert("product_category_tree".into(), json!(self.category_path));
        row.insert("description".into(), json!(self.description));
        row.insert("brand".into(), json!(self.brand));
        row.insert("retail_price".into(), json!(self.retail_price));
        row.insert("discounted_price".into(), json!(self.discounted_price));
        row.insert(
            "product_specifications".into(),
            json!({ "product_specification": self.specifications }),
        );
        row.insert("image".into(), json!(self.images));
        row.insert("product_rating".into(), json!(self.product_rating));
        row.insert("overall_rating".into(), json!(self.overall_rating));
        row.insert("is_FK_Advantage_product".into(), json!(self.promoted));
        row.insert("product_url".into(), json!(self.url));
        row
    }
}

fn rating_text(rating: Option<f64>) -> String {
    match rating {
        Some(value) => value.to_string(),
        None => NO_RATING.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_has_defaults() {
        let record = CatalogueRecord::new("p1");
        assert_eq!(record.description, DEFAULT_DESCRIPTION);
        assert_eq!(record.brand, DEFAULT_BRAND);
        assert_eq!(record.retail_price, 0.0);
        assert!(record.images.is_empty());
        assert!(record.specifications.is_empty());
    }

    #[test]
    fn test_projection_text_field_order() {
        let mut record = CatalogueRecord::new("p1");
        record.name = "Runner".into();
        record.category_path = "Footwear / Shoes".into();
        record.description = "Light shoe".into();
        record.product_rating = Some(4.5);
        record.brand = "Acme".into();
        record.specifications = vec![
            Specification::new("Color", "Red"),
            Specification::new("", "Lace-up"),
        ];
        record.promoted = true;

        assert_eq!(
            record.projection_text(),
            "Runner Footwear / Shoes Light shoe 4.5 No rating available Acme Color Red Lace-up true"
        );
    }
}
