use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

use super::validation;
use super::{DataError, DataResult};
use crate::config::ColumnConfig;

/// A single news item as ingested, before any time normalization.
/// Immutable once loaded; `sentiment` is `None` when the score cell is
/// empty or unparseable (the row itself is kept).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsEvent {
    pub instrument: String,
    pub raw_timestamp: String,
    pub sentiment: Option<f64>,
}

/// Load news events from a CSV file.
///
/// The instrument, timestamp and score columns are resolved from `columns`
/// against the file header (trimmed, case-insensitive). A missing required
/// column is fatal; a bad score cell only blanks that row's score.
pub fn load_news_events<P: AsRef<Path>>(
    path: P,
    columns: &ColumnConfig,
) -> DataResult<Vec<NewsEvent>> {
    let source_name = path.as_ref().display().to_string();
    let file = File::open(path.as_ref())?;
    let mut reader = csv::Reader::from_reader(file);

    let headers = reader.headers()?.clone();
    let instrument_idx = find_column(&headers, &columns.instrument_key)
        .ok_or_else(|| DataError::missing_column(&columns.instrument_key, &source_name))?;
    let date_idx = find_column(&headers, &columns.date_key)
        .ok_or_else(|| DataError::missing_column(&columns.date_key, &source_name))?;
    let score_idx = find_column(&headers, &columns.score_key)
        .ok_or_else(|| DataError::missing_column(&columns.score_key, &source_name))?;

    let mut events = Vec::new();
    for result in reader.records() {
        let record = result?;
        let instrument = record.get(instrument_idx).unwrap_or("").trim().to_string();
        let raw_timestamp = record.get(date_idx).unwrap_or("").trim().to_string();
        let sentiment = parse_score(record.get(score_idx).unwrap_or(""));

        events.push(NewsEvent {
            instrument,
            raw_timestamp,
            sentiment,
        });
    }

    info!("Loaded {} news events from {}", events.len(), source_name);
    Ok(events)
}

/// Resolve a configured column name against a CSV header row.
/// Header cells are trimmed and matched case-insensitively, since price and
/// news exports disagree on capitalization.
pub(crate) fn find_column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
}

/// Parse a score cell. Empty or unparseable cells become `None`; values
/// outside [-1, 1] are also treated as missing rather than poisoning the
/// bucket statistics.
fn parse_score(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    match cell.parse::<f64>() {
        Ok(score) => match validation::validate_sentiment_score(score) {
            Ok(()) => Some(score),
            Err(e) => {
                warn!("Dropping out-of-range sentiment score {}: {}", cell, e);
                None
            }
        },
        Err(_) => {
            warn!("Unparseable sentiment score '{}', treating as missing", cell);
            None
        }
    }
}
