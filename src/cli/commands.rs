use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use tracing::info;

use crate::analysis::{
    self, AnalysisColumn, DEFAULT_CORRELATION_COLUMNS, DEFAULT_REGRESSION_FEATURES,
};
use crate::config::Config;
use crate::data::{
    aggregate_daily_sentiment, attach_indicators, compute_returns, load_news_events,
    load_price_bars, merge_sentiment_prices, normalize_events, DataError, DataResult, FusedRow,
    MarketClock,
};

/// Run the full fusion pipeline: normalize -> aggregate -> merge ->
/// indicators -> return features.
pub fn run_pipeline(config: &Config, news: &Path, prices: &Path) -> DataResult<Vec<FusedRow>> {
    let events = load_news_events(news, &config.columns)?;
    let clock = MarketClock::new(&config.market);
    let normalized = normalize_events(&events, &clock);
    let sentiment = aggregate_daily_sentiment(&normalized);

    let bars = load_price_bars(prices, &config.columns)?;
    let mut fused = merge_sentiment_prices(&bars, &sentiment);
    attach_indicators(&mut fused);
    compute_returns(&mut fused);
    Ok(fused)
}

/// Fuse news and prices, then write the feature table as CSV
pub fn fuse(config: &Config, news: &Path, prices: &Path, output: &Path) -> Result<()> {
    info!("Fusing {} + {}", news.display(), prices.display());

    let fused = run_pipeline(config, news, prices)?;

    let file = File::create(output)
        .with_context(|| format!("Failed to create output file {}", output.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    for row in &fused {
        writer.serialize(row)?;
    }
    writer.flush()?;

    let with_news = fused.iter().filter(|r| r.article_count.is_some()).count();
    println!(
        "Wrote {} fused rows to {} ({} with news coverage)",
        fused.len(),
        output.display(),
        with_news
    );
    Ok(())
}

/// Fuse news and prices, then print the statistical report
pub fn analyze(
    config: &Config,
    news: &Path,
    prices: &Path,
    threshold: Option<f64>,
    target: AnalysisColumn,
) -> Result<()> {
    let threshold = threshold.unwrap_or(config.analysis.sentiment_threshold);
    info!(
        "Analyzing {} + {} (target {}, threshold {})",
        news.display(),
        prices.display(),
        target,
        threshold
    );

    let fused = run_pipeline(config, news, prices)?;

    println!("\nCorrelation matrix ({} rows):", fused.len());
    println!("{}", analysis::correlation_matrix(&fused, &DEFAULT_CORRELATION_COLUMNS));

    match analysis::regression_next_day(&fused, &DEFAULT_REGRESSION_FEATURES, target) {
        Ok(summary) => println!("{summary}\n"),
        Err(DataError::InsufficientData { context }) => {
            println!("Regression skipped: insufficient data ({context})\n")
        }
        Err(e) => return Err(e.into()),
    }

    match analysis::t_test_groups(&fused, AnalysisColumn::MeanSentiment, target, threshold) {
        Ok(result) => println!("{result}"),
        Err(DataError::InsufficientData { context }) => {
            println!("t-test skipped: insufficient data ({context})")
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
