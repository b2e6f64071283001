//! Per-day sentiment aggregation.
//!
//! Groups normalized news events by (instrument, trading date) and reduces
//! each bucket to summary statistics. `article_count` counts every row in
//! the bucket; mean and median reduce over the non-missing scores only.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::market_time::NormalizedNewsEvent;

/// Aggregated sentiment for one (instrument, trading date) bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySentiment {
    pub instrument: String,
    pub trading_date: NaiveDate,
    pub mean_sentiment: Option<f64>,
    pub median_sentiment: Option<f64>,
    pub article_count: usize,
}

/// Reduce normalized events into exactly one row per distinct
/// (instrument, trading date) present in the input. Empty input yields an
/// empty output. Events without a trading date (malformed timestamps) have
/// no bucket to land in and are excluded here, with a logged count.
///
/// Output is sorted by (instrument, trading date), so repeated runs over the
/// same input produce identical tables.
pub fn aggregate_daily_sentiment(events: &[NormalizedNewsEvent]) -> Vec<DailySentiment> {
    let mut buckets: BTreeMap<(String, NaiveDate), Vec<Option<f64>>> = BTreeMap::new();
    let mut unbucketed = 0usize;

    for event in events {
        match event.trading_date {
            Some(date) => buckets
                .entry((event.instrument.clone(), date))
                .or_default()
                .push(event.sentiment),
            None => unbucketed += 1,
        }
    }

    if unbucketed > 0 {
        debug!(
            "{} events had no trading date and were left out of aggregation",
            unbucketed
        );
    }

    let daily: Vec<DailySentiment> = buckets
        .into_iter()
        .map(|((instrument, trading_date), scores)| {
            let article_count = scores.len();
            let mut valid: Vec<f64> = scores.into_iter().flatten().collect();
            let mean_sentiment = if valid.is_empty() {
                None
            } else {
                Some(valid.iter().sum::<f64>() / valid.len() as f64)
            };
            let median_sentiment = median(&mut valid);
            DailySentiment {
                instrument,
                trading_date,
                mean_sentiment,
                median_sentiment,
                article_count,
            }
        })
        .collect();

    info!("Aggregated {} daily sentiment buckets", daily.len());
    daily
}

/// Median of the given scores; `None` for an empty slice. Sorts in place.
fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(instrument: &str, date: Option<(i32, u32, u32)>, score: Option<f64>) -> NormalizedNewsEvent {
        NormalizedNewsEvent {
            instrument: instrument.to_string(),
            raw_timestamp: String::new(),
            sentiment: score,
            utc_instant: None,
            local_instant: None,
            trading_date: date.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap()),
        }
    }

    #[test]
    fn test_one_row_per_bucket_and_counts_sum_to_input() {
        let events = vec![
            event("ACME", Some((2024, 3, 4)), Some(0.5)),
            event("ACME", Some((2024, 3, 4)), Some(0.1)),
            event("ACME", Some((2024, 3, 5)), Some(-0.2)),
            event("ZENT", Some((2024, 3, 4)), Some(0.3)),
            event("ZENT", Some((2024, 3, 4)), None),
        ];
        let daily = aggregate_daily_sentiment(&events);
        assert_eq!(daily.len(), 3);
        let total: usize = daily.iter().map(|d| d.article_count).sum();
        assert_eq!(total, events.len());
    }

    #[test]
    fn test_mixed_missing_scores() {
        // scores [0.5, missing, -0.1] -> count 3, mean and median over the
        // two valid scores = 0.2
        let events = vec![
            event("X", Some((2024, 3, 4)), Some(0.5)),
            event("X", Some((2024, 3, 4)), None),
            event("X", Some((2024, 3, 4)), Some(-0.1)),
        ];
        let daily = aggregate_daily_sentiment(&events);
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].article_count, 3);
        assert!((daily[0].mean_sentiment.unwrap() - 0.2).abs() < 1e-12);
        assert!((daily[0].median_sentiment.unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_all_missing_scores_yield_missing_statistics() {
        let events = vec![
            event("X", Some((2024, 3, 4)), None),
            event("X", Some((2024, 3, 4)), None),
        ];
        let daily = aggregate_daily_sentiment(&events);
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].article_count, 2);
        assert_eq!(daily[0].mean_sentiment, None);
        assert_eq!(daily[0].median_sentiment, None);
    }

    #[test]
    fn test_empty_input_is_empty_output() {
        assert!(aggregate_daily_sentiment(&[]).is_empty());
    }

    #[test]
    fn test_undated_events_are_excluded_from_buckets() {
        let events = vec![
            event("X", Some((2024, 3, 4)), Some(0.5)),
            event("X", None, Some(0.9)),
        ];
        let daily = aggregate_daily_sentiment(&events);
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].article_count, 1);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&mut [0.5, -0.1]), Some(0.2));
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut []), None);
    }
}
