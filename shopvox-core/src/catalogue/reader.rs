//! Reading raw catalogue rows from disk.

use super::RawRow;
use csv::ReaderBuilder;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported catalogue: {0}")]
    Format(String),
}

pub type Result<T> = std::result::Result<T, CatalogueError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogueFormat {
    Csv,
    Json,
}

impl CatalogueFormat {
    /// Guesses the format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Reads a catalogue file, using `format` or, if `None`, the file extension.
pub fn read_catalogue(path: impl AsRef<Path>, format: Option<CatalogueFormat>) -> Result<Vec<RawRow>> {
    let path = path.as_ref();
    let format = format
        .or_else(|| CatalogueFormat::from_path(path))
        .ok_or_else(|| {
            CatalogueError::Format(format!("cannot infer format of {}", path.display()))
        })?;

    match format {
        CatalogueFormat::Csv => read_csv(path),
        CatalogueFormat::Json => read_json(path),
    }
}

/// Reads a CSV catalogue with a header row. Empty cells are left out of the
/// row so they normalize exactly like missing columns.
pub fn read_csv(path: impl AsRef<Path>) -> Result<Vec<RawRow>> {
    parse_csv(fs::File::open(path)?)
}

pub(crate) fn parse_csv<R: Read>(input: R) -> Result<Vec<RawRow>> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(input);
    let mut rows = Vec::new();

    for result in reader.deserialize::<HashMap<String, String>>() {
        let fields = result?;
        let row: RawRow = fields
            .into_iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(column, value)| (column, Value::String(value)))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

/// Reads a JSON catalogue: an array of objects, one per product.
///
/// Elements that are not objects become empty rows so that positions (and
/// therefore fallback ids) stay aligned with the input.
pub fn read_json(path: impl AsRef<Path>) -> Result<Vec<RawRow>> {
    parse_json(&fs::read_to_string(path)?)
}

pub(crate) fn parse_json(input: &str) -> Result<Vec<RawRow>> {
    let Value::Array(items) = serde_json::from_str::<Value>(input)? else {
        return Err(CatalogueError::Format(
            "expected a JSON array of product objects".to_string(),
        ));
    };

    Ok(items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => map,
            _ => RawRow::new(),
        })
        .collect())
}
