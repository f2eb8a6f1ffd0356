//! Output encoding and the local run ledger.
//!
//! Supports CSV encoding of series artifacts, pretty-printed JSON and
//! CSV append of per-city run outcomes.

use anyhow::Result;
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::{debug, info};

use crate::series::Series;

/// One ledger row describing how a city fared in a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub generated_at: DateTime<Utc>,
    pub city: String,
    pub status: String,
    pub detail: Option<String>,
}

/// Encodes a [`Series`] as CSV with a header row.
pub fn encode_series_csv(series: &Series) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    writer.write_record(series.columns())?;
    for row in series.rows() {
        writer.write_record(row.iter().map(|c| c.to_string()))?;
    }

    Ok(writer.into_inner().map_err(|e| e.into_error())?)
}

/// Logs any serializable value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends a [`RunRecord`] as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, record: &RunRecord) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending run record");

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}
