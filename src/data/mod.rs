//! Data pipeline module for loading news and price data and fusing them
//! into a single per-day feature table

pub mod errors;
pub mod features;
pub mod fusion;
pub mod indicators;
pub mod market;
pub mod market_time;
pub mod news;
pub mod sentiment;

// Re-export commonly used types
pub use errors::{DataError, DataResult};
pub use features::compute_returns;
pub use fusion::{merge_sentiment_prices, FusedRow};
pub use indicators::attach_indicators;
pub use market::{load_price_bars, PriceBar};
pub use market_time::{normalize_events, MarketClock, NormalizedNewsEvent};
pub use news::{load_news_events, NewsEvent};
pub use sentiment::{aggregate_daily_sentiment, DailySentiment};

/// Validation helpers
pub mod validation {
    use super::{DataError, DataResult};

    /// Validate a sentiment score
    pub fn validate_sentiment_score(score: f64) -> DataResult<()> {
        if !score.is_finite() || !(-1.0..=1.0).contains(&score) {
            return Err(DataError::validation_error(
                "sentiment_score",
                "Sentiment score must be between -1.0 and 1.0",
            ));
        }
        Ok(())
    }

    /// Validate a close price
    pub fn validate_close(close: f64) -> DataResult<()> {
        if !close.is_finite() || close <= 0.0 {
            return Err(DataError::validation_error(
                "close",
                "Close price must be positive and finite",
            ));
        }
        Ok(())
    }

}
