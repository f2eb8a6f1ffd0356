//! CSV parser for raw and processed series artifacts.

use anyhow::{Context, Result};

use crate::series::{Cell, Series};

/// Decodes a CSV artifact (header row + data rows) into a [`Series`].
///
/// # Errors
///
/// Returns an error if the CSV is malformed or a row's width does not match
/// the header.
pub fn parse_series(bytes: &[u8]) -> Result<Series> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let columns = rdr
        .headers()
        .context("failed to read CSV header")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut series = Series::new(columns);

    for (line, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("malformed CSV record {}", line + 1))?;
        let row = record.iter().map(Cell::parse).collect();
        series
            .push_row(row)
            .with_context(|| format!("invalid CSV record {}", line + 1))?;
    }

    Ok(series)
}
