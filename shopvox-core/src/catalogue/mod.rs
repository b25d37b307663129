//! Product catalogue ingestion.
//!
//! Raw rows come from CSV or JSON exports of the catalogue and are cleaned
//! into [`CatalogueRecord`]s, the canonical schema every later stage reads.

mod normalizer;
mod reader;
mod record;

pub use normalizer::{normalize_row, normalize_rows, NormalizeError, Normalized};
pub use reader::{read_catalogue, read_csv, read_json, CatalogueError, CatalogueFormat};
pub use record::{CatalogueRecord, Specification, DEFAULT_BRAND, DEFAULT_DESCRIPTION};

/// A raw catalogue row, keyed by column name.
///
/// Unrecognized columns are carried along and ignored by normalization.
pub type RawRow = serde_json::Map<String, serde_json::Value>;
