//! Cleaning of raw acquisition rows into a normalized series.

use tracing::{debug, warn};

use crate::channel::{Channel, NORMALIZED_CHANNELS};
use crate::series::{Cell, Series};

/// Cleans a raw series: removes exact duplicate rows, forward-fills gaps,
/// then min-max scales every normalizable channel into `[0, 1]`.
///
/// Text in a channel column is treated as a gap. A channel without variance
/// (all values equal, or a single row) keeps its raw values. Row order is
/// preserved.
pub fn clean(raw: &Series) -> Series {
    let mut series = raw.clone();

    let dropped = series.dedup_rows();
    blank_channel_text(&mut series);
    forward_fill(&mut series);

    for channel in NORMALIZED_CHANNELS {
        if let Some(idx) = series.column_index(channel.key()) {
            let scaled = min_max_scale(&mut series, idx);
            debug!(channel = %channel, scaled, "Channel normalized");
        }
    }

    debug!(rows = series.len(), dropped, "Series cleaned");
    series
}

/// Turns non-numeric cells in channel columns into missing cells so the
/// forward fill keeps every row aligned with its hour.
fn blank_channel_text(series: &mut Series) {
    let columns: Vec<(usize, Channel)> = NORMALIZED_CHANNELS
        .into_iter()
        .filter_map(|c| series.column_index(c.key()).map(|idx| (idx, c)))
        .collect();

    for (idx, channel) in columns {
        let mut blanked = 0;
        for row in series.rows_mut() {
            if let Cell::Text(_) = row[idx] {
                row[idx] = Cell::Missing;
                blanked += 1;
            }
        }
        if blanked > 0 {
            warn!(channel = %channel, cells = blanked, "Non-numeric readings treated as gaps");
        }
    }
}

/// Replaces missing cells with the most recent prior value in the same
/// column; missing cells with no prior value become `0`.
fn forward_fill(series: &mut Series) {
    let width = series.columns().len();
    let mut last: Vec<Option<Cell>> = vec![None; width];

    for row in series.rows_mut() {
        for (idx, cell) in row.iter_mut().enumerate() {
            if cell.is_missing() {
                *cell = last[idx].clone().unwrap_or(Cell::Number(0.0));
            } else {
                last[idx] = Some(cell.clone());
            }
        }
    }
}

/// Rescales numeric cells in column `idx`. Returns whether scaling happened.
fn min_max_scale(series: &mut Series, idx: usize) -> bool {
    let (min, max) = series
        .rows()
        .iter()
        .filter_map(|r| r[idx].as_f64())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });

    if max <= min {
        return false;
    }

    let range = max - min;
    for row in series.rows_mut() {
        if let Cell::Number(v) = &mut row[idx] {
            *v = (*v - min) / range;
        }
    }
    true
}
