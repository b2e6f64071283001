//! Price Loader boundary: daily OHLCV bars from a CSV source.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

use super::news::find_column;
use super::validation;
use super::{DataError, DataResult};
use crate::config::ColumnConfig;

/// One daily bar for one instrument. The loader guarantees one row per
/// (instrument, trading_date) input row, sorted ascending per instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBar {
    pub instrument: String,
    pub trading_date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<i64>,
}

/// Load daily price bars from a CSV file.
///
/// The instrument, date and close columns are required; their absence is
/// fatal and reported by name before any later stage runs. Open/high/low/
/// volume are picked up when present. Rows whose date or close cell cannot
/// be parsed are skipped with a warning; cell-level problems never abort
/// the load.
pub fn load_price_bars<P: AsRef<Path>>(
    path: P,
    columns: &ColumnConfig,
) -> DataResult<Vec<PriceBar>> {
    let source_name = path.as_ref().display().to_string();
    let file = File::open(path.as_ref())?;
    let mut reader = csv::Reader::from_reader(file);

    let headers = reader.headers()?.clone();
    let instrument_idx = find_column(&headers, &columns.instrument_key)
        .ok_or_else(|| DataError::missing_column(&columns.instrument_key, &source_name))?;
    let date_idx = find_column(&headers, &columns.date_key)
        .ok_or_else(|| DataError::missing_column(&columns.date_key, &source_name))?;
    let close_idx = find_column(&headers, &columns.close_key)
        .ok_or_else(|| DataError::missing_column(&columns.close_key, &source_name))?;

    let open_idx = find_column(&headers, "open");
    let high_idx = find_column(&headers, "high");
    let low_idx = find_column(&headers, "low");
    let volume_idx = find_column(&headers, "volume");

    let mut bars = Vec::new();
    let mut skipped = 0usize;
    for result in reader.records() {
        let record = result?;
        let instrument = record.get(instrument_idx).unwrap_or("").trim().to_string();

        let date_cell = record.get(date_idx).unwrap_or("").trim();
        let trading_date = match parse_date(date_cell) {
            Some(date) => date,
            None => {
                warn!(
                    "Skipping {} price row with unparseable date '{}'",
                    instrument, date_cell
                );
                skipped += 1;
                continue;
            }
        };

        let close_cell = record.get(close_idx).unwrap_or("").trim();
        let close = match close_cell.parse::<f64>() {
            Ok(close) if validation::validate_close(close).is_ok() => close,
            _ => {
                warn!(
                    "Skipping {} price row on {} with invalid close '{}'",
                    instrument, trading_date, close_cell
                );
                skipped += 1;
                continue;
            }
        };

        bars.push(PriceBar {
            instrument,
            trading_date,
            open: parse_cell(&record, open_idx),
            high: parse_cell(&record, high_idx),
            low: parse_cell(&record, low_idx),
            close,
            volume: parse_cell(&record, volume_idx),
        });
    }

    // Per-instrument chronological order is what the downstream shift/lag
    // logic assumes; sort here so callers never have to.
    bars.sort_by(|a, b| {
        a.instrument
            .cmp(&b.instrument)
            .then(a.trading_date.cmp(&b.trading_date))
    });

    if skipped > 0 {
        warn!("Skipped {} unusable price rows from {}", skipped, source_name);
    }
    info!("Loaded {} price bars from {}", bars.len(), source_name);
    Ok(bars)
}

/// Parse a date cell: plain dates first, then datetime forms whose date part
/// we keep.
fn parse_date(cell: &str) -> Option<NaiveDate> {
    if cell.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(cell, fmt) {
            return Some(date);
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(cell, fmt) {
            return Some(naive.date());
        }
    }
    None
}

fn parse_cell<T: std::str::FromStr>(record: &csv::StringRecord, idx: Option<usize>) -> Option<T> {
    idx.and_then(|i| record.get(i))
        .and_then(|cell| cell.trim().parse::<T>().ok())
}
