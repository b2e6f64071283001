use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

use crate::analysis::AnalysisColumn;
use crate::config::Config;

#[derive(Parser)]
#[command(
    name = "sentifuse",
    about = "Daily news-sentiment and price fusion pipeline",
    version = "0.1.0"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fuse news sentiment onto daily price bars and write the feature table
    Fuse {
        /// News CSV with instrument, timestamp and sentiment score columns
        #[arg(short, long)]
        news: PathBuf,

        /// Price CSV with instrument, date and OHLCV columns
        #[arg(short, long)]
        prices: PathBuf,

        /// Output path for the fused CSV (missing values as empty cells)
        #[arg(short, long, default_value = "fused.csv")]
        output: PathBuf,
    },

    /// Run correlation, regression and group-comparison statistics over the fused table
    Analyze {
        /// News CSV with instrument, timestamp and sentiment score columns
        #[arg(short, long)]
        news: PathBuf,

        /// Price CSV with instrument, date and OHLCV columns
        #[arg(short, long)]
        prices: PathBuf,

        /// Sentiment threshold separating positive/negative groups
        /// (defaults to the configured value)
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Regression and t-test target column
        #[arg(long, default_value = "return_next_1d")]
        target: AnalysisColumn,
    },
}

/// Execute the parsed CLI command
pub fn run(cli: Cli, config: &Config) -> Result<()> {
    match cli.command {
        Commands::Fuse {
            news,
            prices,
            output,
        } => commands::fuse(config, &news, &prices, &output),
        Commands::Analyze {
            news,
            prices,
            threshold,
            target,
        } => commands::analyze(config, &news, &prices, threshold, target),
    }
}
