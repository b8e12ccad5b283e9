//! Upload payload decoding
//!
//! Turns a job's base64 payload into typed create-records. CSV files use a
//! header row to name the columns; JSON files are an array of records.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{CreateCategoryModel, CreateProductModel, EntityKind, FileFormat};
use crate::services::validator::Validate;

/// Separator between specification names inside one CSV cell
pub const SPECIFICATION_CELL_SEPARATOR: char = ';';

/// One CSV data row: header name to cell, in column order
pub type CsvRow = IndexMap<String, String>;

/// A record type that can arrive in an upload file
pub trait UploadRecord: DeserializeOwned + Validate + Send + Sized {
    /// Entity kind this record creates
    const KIND: EntityKind;

    /// Build a record from one CSV row
    fn from_csv_row(row: &CsvRow) -> Self;
}

/// Base64-encode raw file bytes for storage
pub fn encode_payload(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a stored payload into `T` records according to its format tag
pub fn parse<T: UploadRecord>(payload_base64: &str, format_tag: &str) -> CatalogResult<Vec<T>> {
    let format = FileFormat::from_tag(format_tag)?;

    let bytes = STANDARD
        .decode(payload_base64.trim())
        .map_err(|e| CatalogError::Malformed(format!("Payload is not valid base64: {}", e)))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| CatalogError::Malformed(format!("File is not valid UTF-8: {}", e)))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    match format {
        FileFormat::Csv => parse_csv(text),
        FileFormat::Json => parse_json(text),
    }
}

fn parse_json<T: UploadRecord>(text: &str) -> CatalogResult<Vec<T>> {
    serde_json::from_str::<Vec<T>>(text)
        .map_err(|e| CatalogError::Malformed(format!("Invalid JSON upload: {}", e)))
}

fn parse_csv<T: UploadRecord>(text: &str) -> CatalogResult<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_error)?;
        let row: CsvRow = headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();
        records.push(T::from_csv_row(&row));
    }

    Ok(records)
}

fn csv_error(err: csv::Error) -> CatalogError {
    match err.kind() {
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => CatalogError::RowShapeMismatch {
            line: pos.as_ref().map(|p| p.line()).unwrap_or(0),
            expected: *expected_len as usize,
            found: *len as usize,
        },
        _ => CatalogError::Malformed(format!("Invalid CSV upload: {}", err)),
    }
}

/// Case-insensitive cell lookup
fn cell<'a>(row: &'a CsvRow, column: &str) -> Option<&'a str> {
    row.iter()
        .find(|(header, _)| header.eq_ignore_ascii_case(column))
        .map(|(_, value)| value.as_str())
}

fn optional_cell(row: &CsvRow, column: &str) -> Option<String> {
    cell(row, column)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

impl UploadRecord for CreateCategoryModel {
    const KIND: EntityKind = EntityKind::Category;

    fn from_csv_row(row: &CsvRow) -> Self {
        let specifications = cell(row, "Specifications")
            .map(|value| {
                value
                    .split(SPECIFICATION_CELL_SEPARATOR)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: cell(row, "Name").unwrap_or_default().to_string(),
            description: optional_cell(row, "Description"),
            specifications,
        }
    }
}

const PRODUCT_FIXED_COLUMNS: [&str; 3] = ["Name", "Description", "CategoryId"];

impl UploadRecord for CreateProductModel {
    const KIND: EntityKind = EntityKind::Product;

    /// Columns beyond Name/Description/CategoryId become specification data.
    /// A missing or non-numeric CategoryId becomes 0, which validation rejects.
    fn from_csv_row(row: &CsvRow) -> Self {
        let category_id = cell(row, "CategoryId")
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(0);

        let specification_data = row
            .iter()
            .filter(|(header, _)| {
                !PRODUCT_FIXED_COLUMNS
                    .iter()
                    .any(|fixed| header.eq_ignore_ascii_case(fixed))
            })
            .map(|(header, value)| (header.clone(), value.clone()))
            .collect();

        Self {
            name: cell(row, "Name").unwrap_or_default().to_string(),
            description: optional_cell(row, "Description"),
            category_id,
            specification_data,
        }
    }
}
