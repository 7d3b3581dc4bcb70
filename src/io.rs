//! Dataset and taxonomy file handling.
//!
//! CSV in, CSV out, JSON for the taxonomy spec. Import is forgiving about
//! types (a field that parses as a float becomes numeric, anything else is
//! a category token), and rows carrying the missing-value marker are
//! skipped wholesale, matching how the engine expects complete records.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::debug;
use thiserror::Error;

use crate::data::{Record, Value};
use crate::release::ReleasedRecord;
use crate::taxonomy::DomainSpec;
use crate::validate::MISSING_VALUE;

/// I/O and format errors raised by this module.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("dataset has no class column {0:?}")]
    MissingClassColumn(String),

    #[error("dataset file has no rows")]
    EmptyDataset,
}

/// Read a labeled dataset from a CSV file with a header row.
///
/// `class_column` names the label column; every other column becomes an
/// attribute. Rows containing the `?` missing marker are skipped.
pub fn import_dataset(
    path: impl AsRef<Path>,
    class_column: &str,
) -> Result<Vec<Record>, ImportError> {
    let file = File::open(path.as_ref())?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let class_index = headers
        .iter()
        .position(|header| header == class_column)
        .ok_or_else(|| ImportError::MissingClassColumn(class_column.to_string()))?;

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for row in reader.records() {
        let row = row?;
        if row.iter().any(|field| field == MISSING_VALUE) {
            skipped += 1;
            continue;
        }
        let mut values = BTreeMap::new();
        let mut label = String::new();
        for (idx, field) in row.iter().enumerate() {
            if idx == class_index {
                label = field.to_string();
                continue;
            }
            let value = match field.parse::<f64>() {
                Ok(number) => Value::Number(number),
                Err(_) => Value::Category(field.to_string()),
            };
            values.insert(headers[idx].to_string(), value);
        }
        records.push(Record { values, label });
    }
    if records.is_empty() {
        return Err(ImportError::EmptyDataset);
    }
    debug!(
        "imported {} records ({} skipped for missing values)",
        records.len(),
        skipped
    );
    Ok(records)
}

/// Read a domain spec from the JSON taxonomy format.
pub fn import_taxonomy(path: impl AsRef<Path>) -> Result<DomainSpec, ImportError> {
    let file = File::open(path.as_ref())?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Write released records to a CSV file.
///
/// Columns are the attribute names in stable order followed by one
/// `class:<label>` count column per class, mirroring the released rows'
/// own key sets.
pub fn export_released(
    path: impl AsRef<Path>,
    released: &[ReleasedRecord],
) -> Result<(), ImportError> {
    let first = match released.first() {
        Some(record) => record,
        None => return Ok(()),
    };
    let attribute_names: Vec<&str> = first.values.keys().map(String::as_str).collect();
    let class_names: Vec<&str> = first.class_counts.keys().map(String::as_str).collect();

    let file = File::create(path.as_ref())?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));

    let mut header: Vec<String> = attribute_names.iter().map(|name| name.to_string()).collect();
    header.extend(class_names.iter().map(|name| format!("class:{}", name)));
    writer.write_record(&header)?;

    for record in released {
        let mut row: Vec<String> = Vec::with_capacity(header.len());
        for name in &attribute_names {
            let value = record
                .values
                .get(*name)
                .map(|value| value.to_string())
                .unwrap_or_default();
            row.push(value);
        }
        for name in &class_names {
            let count = record.class_counts.get(*name).copied().unwrap_or(0);
            row.push(count.to_string());
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}
