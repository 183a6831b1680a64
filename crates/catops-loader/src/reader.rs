//! Extract file reader
//!
//! Parses a delimited extract into a [`RowBatch`] of untyped text cells.
//! Header names are trimmed; blank cells and the usual missing-value markers
//! become [`Value::Null`] here, so every later stage sees one null form.

use crate::batch::{RowBatch, Value};
use crate::error::{LoadError, Result};
use std::path::Path;
use tracing::debug;

/// Cell contents read as missing data
pub const NULL_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn cell_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() || NULL_MARKERS.contains(&trimmed) {
        Value::Null
    } else {
        Value::Text(raw.to_string())
    }
}

/// Reader settings
#[derive(Debug, Clone)]
pub struct ExtractReader {
    delimiter: u8,
}

impl Default for ExtractReader {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl ExtractReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Read an extract from disk.
    pub fn read_path(&self, path: &Path) -> Result<RowBatch> {
        if !path.exists() {
            return Err(LoadError::SourceNotFound {
                path: path.to_path_buf(),
            });
        }
        let file = std::fs::File::open(path).map_err(|e| LoadError::read(path, e))?;
        let batch = self.read(file).map_err(|e| LoadError::read(path, e))?;

        debug!(
            path = %path.display(),
            columns = batch.columns().len(),
            rows = batch.len(),
            "Extract parsed"
        );
        Ok(batch)
    }

    /// Read an extract from any byte source.
    pub fn read<R: std::io::Read>(&self, input: R) -> std::result::Result<RowBatch, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(input);

        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.len() > columns.len() {
                return Err(csv::Error::from(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!(
                        "line {}: {} fields but the header has {}",
                        record.position().map(|p| p.line()).unwrap_or(0),
                        record.len(),
                        columns.len()
                    ),
                )));
            }
            rows.push(record.iter().map(cell_value).collect());
        }

        // short rows are padded with nulls
        Ok(RowBatch::new(columns, rows))
    }
}
