//! Tabular time series for a single city.
//!
//! A [`Series`] keeps the column order it was read with so that cleaned
//! artifacts round-trip with the same layout as the raw input. Cells are
//! loosely typed: acquisition data mixes numeric readings with text
//! attributes such as the hour stamp and city name.

use anyhow::{Result, bail};
use std::fmt;

/// A single value in a [`Series`] row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    /// Interprets a raw CSV field. Empty fields and non-finite numbers
    /// (`NaN`, `inf`, literals that overflow) are missing.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if !v.is_finite() => Cell::Missing,
            Ok(v) => Cell::Number(v),
            Err(_) => Cell::Text(raw.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Appends an exact, type-tagged representation used for row equality.
    fn fingerprint(&self, out: &mut String) {
        match self {
            Cell::Number(v) => {
                out.push('n');
                out.push_str(&v.to_bits().to_string());
            }
            Cell::Text(s) => {
                out.push('t');
                out.push_str(s);
            }
            Cell::Missing => out.push('m'),
        }
        out.push('\u{1f}');
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(v) => write!(f, "{v}"),
            Cell::Text(s) => f.write_str(s),
            Cell::Missing => Ok(()),
        }
    }
}

/// Ordered rows of named cells for one city.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Series {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a numeric series from `(column, values)` pairs. Columns shorter
    /// than the longest one are padded with missing cells.
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Vec<f64>)>) -> Self {
        let len = columns.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
        let (names, values): (Vec<String>, Vec<Vec<f64>>) =
            columns.into_iter().map(|(n, v)| (n.into(), v)).unzip();

        let rows = (0..len)
            .map(|i| {
                values
                    .iter()
                    .map(|col| col.get(i).map_or(Cell::Missing, |v| Cell::Number(*v)))
                    .collect()
            })
            .collect();

        Self {
            columns: names,
            rows,
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            bail!(
                "row has {} cells but series has {} columns",
                row.len(),
                self.columns.len()
            );
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<Vec<Cell>> {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Numeric values of a column in row order, skipping non-numeric cells.
    /// Returns `None` when the column does not exist.
    pub fn values(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().filter_map(|r| r[idx].as_f64()).collect())
    }

    /// The last `window` numeric values of a column, or all of them when
    /// fewer exist.
    pub fn trailing(&self, name: &str, window: usize) -> Option<Vec<f64>> {
        let values = self.values(name)?;
        let start = values.len().saturating_sub(window);
        Some(values[start..].to_vec())
    }

    /// Drops rows identical to an earlier row, keeping first occurrences.
    pub fn dedup_rows(&mut self) -> usize {
        let mut seen = std::collections::HashSet::new();
        let before = self.rows.len();
        self.rows.retain(|row| {
            let mut key = String::new();
            for cell in row {
                cell.fingerprint(&mut key);
            }
            seen.insert(key)
        });
        before - self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_parse() {
        assert_eq!(Cell::parse("0.25"), Cell::Number(0.25));
        assert_eq!(Cell::parse(""), Cell::Missing);
        assert_eq!(Cell::parse("  "), Cell::Missing);
        assert_eq!(Cell::parse("NaN"), Cell::Missing);
        assert_eq!(Cell::parse("inf"), Cell::Missing);
        assert_eq!(Cell::parse("-inf"), Cell::Missing);
        assert_eq!(Cell::parse("1e400"), Cell::Missing);
        assert_eq!(
            Cell::parse("2024-05-01T00:00"),
            Cell::Text("2024-05-01T00:00".to_string())
        );
    }

    #[test]
    fn test_push_row_rejects_wrong_width() {
        let mut series = Series::new(vec!["a".into(), "b".into()]);
        assert!(series.push_row(vec![Cell::Number(1.0)]).is_err());
        assert!(series.push_row(vec![Cell::Number(1.0), Cell::Missing]).is_ok());
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_trailing_window() {
        let values: Vec<f64> = (0..60).map(|i| i as f64).collect();
        let series = Series::from_columns(vec![("pm10", values)]);

        let window = series.trailing("pm10", 48).unwrap();
        assert_eq!(window.len(), 48);
        assert_eq!(window[0], 12.0);
        assert_eq!(window[47], 59.0);

        assert!(series.trailing("ozone", 48).is_none());
    }

    #[test]
    fn test_trailing_shorter_than_window() {
        let series = Series::from_columns(vec![("pm10", vec![1.0, 2.0])]);
        assert_eq!(series.trailing("pm10", 48).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_dedup_rows_keeps_first() {
        let mut series = Series::new(vec!["time".into(), "pm10".into()]);
        series
            .push_row(vec![Cell::Text("t0".into()), Cell::Number(1.0)])
            .unwrap();
        series
            .push_row(vec![Cell::Text("t1".into()), Cell::Number(2.0)])
            .unwrap();
        series
            .push_row(vec![Cell::Text("t0".into()), Cell::Number(1.0)])
            .unwrap();

        assert_eq!(series.dedup_rows(), 1);
        assert_eq!(series.len(), 2);
        assert_eq!(series.values("pm10").unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_number_and_text_are_distinct_for_dedup() {
        let mut series = Series::new(vec!["v".into()]);
        series.push_row(vec![Cell::Number(1.0)]).unwrap();
        series.push_row(vec![Cell::Text("1".into())]).unwrap();
        assert_eq!(series.dedup_rows(), 0);
    }
}
