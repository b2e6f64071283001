//! Fusion merge: left-join aggregated sentiment onto the price series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use super::market::PriceBar;
use super::sentiment::DailySentiment;

/// One fused output row: price fields, sentiment fields where news existed
/// that day, indicator columns, and derived return features.
///
/// `return_next_1d` and `return_next_3d` are forward-looking by
/// construction. They are valid only as regression targets; using either as
/// a contemporaneous feature leaks future information into the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedRow {
    pub instrument: String,
    pub trading_date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<i64>,
    pub mean_sentiment: Option<f64>,
    pub median_sentiment: Option<f64>,
    pub article_count: Option<usize>,
    pub sma_20: Option<f64>,
    pub rsi_14: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub daily_return: Option<f64>,
    pub return_next_1d: Option<f64>,
    pub return_next_3d: Option<f64>,
}

/// Left-preserving join of sentiment onto prices by (instrument, date).
///
/// Every price bar produces exactly one output row; days without news carry
/// missing sentiment fields (`article_count` stays `None`, never a
/// fabricated zero). Sentiment rows with no matching price bar — weekend
/// buckets from the after-close cutoff, for instance — are silently
/// excluded. Output row count always equals the price row count.
pub fn merge_sentiment_prices(prices: &[PriceBar], sentiment: &[DailySentiment]) -> Vec<FusedRow> {
    let index: HashMap<(&str, NaiveDate), &DailySentiment> = sentiment
        .iter()
        .map(|s| ((s.instrument.as_str(), s.trading_date), s))
        .collect();

    let mut matched: HashSet<(&str, NaiveDate)> = HashSet::new();
    let fused: Vec<FusedRow> = prices
        .iter()
        .map(|bar| {
            let key = (bar.instrument.as_str(), bar.trading_date);
            let hit = index.get(&key).copied();
            if hit.is_some() {
                matched.insert(key);
            }
            FusedRow {
                instrument: bar.instrument.clone(),
                trading_date: bar.trading_date,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
                mean_sentiment: hit.and_then(|s| s.mean_sentiment),
                median_sentiment: hit.and_then(|s| s.median_sentiment),
                article_count: hit.map(|s| s.article_count),
                sma_20: None,
                rsi_14: None,
                macd: None,
                macd_signal: None,
                daily_return: None,
                return_next_1d: None,
                return_next_3d: None,
            }
        })
        .collect();

    let unmatched = sentiment.len() - matched.len();
    if unmatched > 0 {
        debug!(
            "{} sentiment buckets matched no price bar (non-trading dates)",
            unmatched
        );
    }
    info!(
        "Fused {} price rows with {} sentiment buckets",
        fused.len(),
        sentiment.len()
    );
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(instrument: &str, day: u32, close: f64) -> PriceBar {
        PriceBar {
            instrument: instrument.to_string(),
            trading_date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
        }
    }

    fn daily(instrument: &str, day: u32, mean: f64, count: usize) -> DailySentiment {
        DailySentiment {
            instrument: instrument.to_string(),
            trading_date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            mean_sentiment: Some(mean),
            median_sentiment: Some(mean),
            article_count: count,
        }
    }

    #[test]
    fn test_row_count_is_preserved() {
        let prices = vec![bar("ACME", 4, 100.0), bar("ACME", 5, 102.0), bar("ZENT", 4, 50.0)];
        let sentiment = vec![daily("ACME", 4, 0.2, 3)];
        let fused = merge_sentiment_prices(&prices, &sentiment);
        assert_eq!(fused.len(), prices.len());
    }

    #[test]
    fn test_row_count_preserved_with_empty_sentiment() {
        let prices = vec![bar("ACME", 4, 100.0), bar("ACME", 5, 102.0)];
        let fused = merge_sentiment_prices(&prices, &[]);
        assert_eq!(fused.len(), 2);
        assert!(fused.iter().all(|r| r.article_count.is_none()));
    }

    #[test]
    fn test_missing_news_is_missing_not_zero() {
        let prices = vec![bar("ACME", 4, 100.0), bar("ACME", 5, 102.0)];
        let sentiment = vec![daily("ACME", 4, 0.2, 3)];
        let fused = merge_sentiment_prices(&prices, &sentiment);
        assert_eq!(fused[0].article_count, Some(3));
        assert_eq!(fused[0].mean_sentiment, Some(0.2));
        assert_eq!(fused[1].article_count, None);
        assert_eq!(fused[1].mean_sentiment, None);
    }

    #[test]
    fn test_sentiment_without_price_bar_is_excluded() {
        // Saturday bucket: present in sentiment, absent from prices.
        let prices = vec![bar("ACME", 8, 110.0)];
        let sentiment = vec![daily("ACME", 8, 0.1, 1), daily("ACME", 9, -0.6, 1)];
        let fused = merge_sentiment_prices(&prices, &sentiment);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].mean_sentiment, Some(0.1));
    }

    #[test]
    fn test_same_date_different_instrument_does_not_match() {
        let prices = vec![bar("ZENT", 4, 50.0)];
        let sentiment = vec![daily("ACME", 4, 0.9, 2)];
        let fused = merge_sentiment_prices(&prices, &sentiment);
        assert_eq!(fused[0].mean_sentiment, None);
    }
}
