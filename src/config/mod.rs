use anyhow::{anyhow, Context, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;

/// Run configuration, constructed once and threaded through every stage.
/// Nothing in the pipeline reads environment state after this is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub columns: ColumnConfig,
    pub market: MarketConfig,
    pub analysis: AnalysisConfig,
}

/// Column names the loaders resolve against CSV headers (trimmed,
/// case-insensitive).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub instrument_key: String,
    pub date_key: String,
    pub score_key: String,
    pub close_key: String,
}

/// Exchange session parameters for the news-bucketing cutoff rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    pub cutoff_time: NaiveTime,
    pub exchange_timezone: Tz,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// |score| boundary separating positive/negative sentiment groups
    pub sentiment_threshold: f64,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file - this sets env vars that aren't already set
        dotenv::dotenv().ok();

        let config = Config {
            columns: ColumnConfig {
                instrument_key: env::var("INSTRUMENT_COLUMN")
                    .unwrap_or_else(|_| "stock".to_string()),
                date_key: env::var("DATE_COLUMN").unwrap_or_else(|_| "date".to_string()),
                score_key: env::var("SCORE_COLUMN").unwrap_or_else(|_| "compound".to_string()),
                close_key: env::var("CLOSE_COLUMN").unwrap_or_else(|_| "close".to_string()),
            },
            market: MarketConfig {
                cutoff_time: env::var("MARKET_CUTOFF_TIME")
                    .unwrap_or_else(|_| "16:00:00".to_string())
                    .parse()
                    .context("Invalid MARKET_CUTOFF_TIME value (use HH:MM:SS)")?,
                exchange_timezone: env::var("EXCHANGE_TIMEZONE")
                    .unwrap_or_else(|_| "America/New_York".to_string())
                    .parse::<Tz>()
                    .map_err(|e| anyhow!("Invalid EXCHANGE_TIMEZONE value: {e}"))?,
            },
            analysis: AnalysisConfig {
                sentiment_threshold: env::var("SENTIMENT_THRESHOLD")
                    .unwrap_or_else(|_| "0.2".to_string())
                    .parse()
                    .context("Invalid SENTIMENT_THRESHOLD value")?,
            },
        };

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            columns: ColumnConfig::default(),
            market: MarketConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            instrument_key: "stock".to_string(),
            date_key: "date".to_string(),
            score_key: "compound".to_string(),
            close_key: "close".to_string(),
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            cutoff_time: NaiveTime::from_hms_opt(16, 0, 0)
                .expect("Invalid hardcoded time 16:00:00 - this is a bug"),
            exchange_timezone: chrono_tz::America::New_York,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sentiment_threshold: 0.2,
        }
    }
}
