//! Analysis layer over the fused feature table: correlation, next-day
//! return regression, and sentiment-group comparison.
//!
//! Missing values are excluded, never imputed: correlations drop pairs,
//! the regression drops rows, and degenerate groups surface as explicit
//! insufficient-data errors instead of silent NaN.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::data::{DataError, DataResult, FusedRow};

/// A numeric column of the fused table addressable by the analysis
/// routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisColumn {
    MeanSentiment,
    MedianSentiment,
    ArticleCount,
    Close,
    DailyReturn,
    ReturnNext1d,
    ReturnNext3d,
    Sma20,
    Rsi14,
    Macd,
    MacdSignal,
}

impl AnalysisColumn {
    pub fn name(&self) -> &'static str {
        match self {
            AnalysisColumn::MeanSentiment => "mean_sentiment",
            AnalysisColumn::MedianSentiment => "median_sentiment",
            AnalysisColumn::ArticleCount => "article_count",
            AnalysisColumn::Close => "close",
            AnalysisColumn::DailyReturn => "daily_return",
            AnalysisColumn::ReturnNext1d => "return_next_1d",
            AnalysisColumn::ReturnNext3d => "return_next_3d",
            AnalysisColumn::Sma20 => "sma_20",
            AnalysisColumn::Rsi14 => "rsi_14",
            AnalysisColumn::Macd => "macd",
            AnalysisColumn::MacdSignal => "macd_signal",
        }
    }

    pub fn extract(&self, row: &FusedRow) -> Option<f64> {
        match self {
            AnalysisColumn::MeanSentiment => row.mean_sentiment,
            AnalysisColumn::MedianSentiment => row.median_sentiment,
            AnalysisColumn::ArticleCount => row.article_count.map(|c| c as f64),
            AnalysisColumn::Close => Some(row.close),
            AnalysisColumn::DailyReturn => row.daily_return,
            AnalysisColumn::ReturnNext1d => row.return_next_1d,
            AnalysisColumn::ReturnNext3d => row.return_next_3d,
            AnalysisColumn::Sma20 => row.sma_20,
            AnalysisColumn::Rsi14 => row.rsi_14,
            AnalysisColumn::Macd => row.macd,
            AnalysisColumn::MacdSignal => row.macd_signal,
        }
    }

    pub const ALL: [AnalysisColumn; 11] = [
        AnalysisColumn::MeanSentiment,
        AnalysisColumn::MedianSentiment,
        AnalysisColumn::ArticleCount,
        AnalysisColumn::Close,
        AnalysisColumn::DailyReturn,
        AnalysisColumn::ReturnNext1d,
        AnalysisColumn::ReturnNext3d,
        AnalysisColumn::Sma20,
        AnalysisColumn::Rsi14,
        AnalysisColumn::Macd,
        AnalysisColumn::MacdSignal,
    ];
}

impl fmt::Display for AnalysisColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AnalysisColumn {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        AnalysisColumn::ALL
            .into_iter()
            .find(|c| c.name() == normalized)
            .ok_or_else(|| DataError::parse_error(format!("Unknown analysis column '{s}'")))
    }
}

/// Default column set for the correlation report.
pub const DEFAULT_CORRELATION_COLUMNS: [AnalysisColumn; 6] = [
    AnalysisColumn::MeanSentiment,
    AnalysisColumn::DailyReturn,
    AnalysisColumn::ReturnNext1d,
    AnalysisColumn::Rsi14,
    AnalysisColumn::Sma20,
    AnalysisColumn::Macd,
];

/// Default feature set for the next-day return regression.
pub const DEFAULT_REGRESSION_FEATURES: [AnalysisColumn; 3] = [
    AnalysisColumn::MeanSentiment,
    AnalysisColumn::DailyReturn,
    AnalysisColumn::Rsi14,
];

/// Pairwise Pearson correlation matrix. A cell is `None` when fewer than
/// two complete pairs exist or a side has zero variance.
#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    pub columns: Vec<AnalysisColumn>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: AnalysisColumn, b: AnalysisColumn) -> Option<f64> {
        let i = self.columns.iter().position(|&c| c == a)?;
        let j = self.columns.iter().position(|&c| c == b)?;
        self.values[i][j]
    }
}

impl fmt::Display for CorrelationMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = 16;
        write!(f, "{:width$}", "")?;
        for col in &self.columns {
            write!(f, "{:>width$}", col.name())?;
        }
        writeln!(f)?;
        for (i, col) in self.columns.iter().enumerate() {
            write!(f, "{:width$}", col.name())?;
            for value in &self.values[i] {
                match value {
                    Some(v) => write!(f, "{:>width$.3}", v)?,
                    None => write!(f, "{:>width$}", "-")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Compute the pairwise-complete Pearson correlation matrix over the given
/// columns. Rows missing either side of a pair are dropped for that pair
/// only.
pub fn correlation_matrix(rows: &[FusedRow], columns: &[AnalysisColumn]) -> CorrelationMatrix {
    let series: Vec<Vec<Option<f64>>> = columns
        .iter()
        .map(|col| rows.iter().map(|row| col.extract(row)).collect())
        .collect();

    let n = columns.len();
    let mut values = vec![vec![None; n]; n];
    for i in 0..n {
        for j in i..n {
            let pairs: Vec<(f64, f64)> = series[i]
                .iter()
                .zip(series[j].iter())
                .filter_map(|(x, y)| x.zip(*y))
                .collect();
            let r = pearson(&pairs);
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    CorrelationMatrix {
        columns: columns.to_vec(),
        values,
    }
}

fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    let n = pairs.len();
    if n < 2 {
        return None;
    }
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n as f64;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Fitted OLS model for a forward-return target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionSummary {
    pub target: AnalysisColumn,
    pub intercept: f64,
    pub coefficients: Vec<(AnalysisColumn, f64)>,
    pub r_squared: f64,
    pub n_observations: usize,
}

impl fmt::Display for RegressionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "OLS: {} ~ {} (n = {})",
            self.target,
            self.coefficients
                .iter()
                .map(|(c, _)| c.name())
                .collect::<Vec<_>>()
                .join(" + "),
            self.n_observations
        )?;
        writeln!(f, "  intercept: {:>12.6}", self.intercept)?;
        for (col, beta) in &self.coefficients {
            writeln!(f, "  {:<16} {:>12.6}", col.name(), beta)?;
        }
        write!(f, "  R-squared: {:.4}", self.r_squared)
    }
}

/// Fit an OLS regression of `target` on `features` with an intercept,
/// solving the normal equations. Rows with any missing feature or target
/// value are dropped.
pub fn regression_next_day(
    rows: &[FusedRow],
    features: &[AnalysisColumn],
    target: AnalysisColumn,
) -> DataResult<RegressionSummary> {
    if features.is_empty() {
        return Err(DataError::insufficient_data(
            "regression requires at least one feature".to_string(),
        ));
    }

    let mut x_data: Vec<f64> = Vec::new();
    let mut y_data: Vec<f64> = Vec::new();
    for row in rows {
        let y = match target.extract(row) {
            Some(y) => y,
            None => continue,
        };
        let xs: Option<Vec<f64>> = features.iter().map(|c| c.extract(row)).collect();
        if let Some(xs) = xs {
            x_data.extend(xs);
            y_data.push(y);
        }
    }

    let n = y_data.len();
    let k = features.len();
    if n < k + 2 {
        return Err(DataError::insufficient_data(format!(
            "regression on {} needs more than {} complete rows, found {}",
            target,
            k + 1,
            n
        )));
    }

    // Design matrix with a leading intercept column.
    let x = Array2::from_shape_fn((n, k + 1), |(i, j)| {
        if j == 0 {
            1.0
        } else {
            x_data[i * k + (j - 1)]
        }
    });
    let y = Array1::from_vec(y_data);

    let xt = x.t();
    let xtx = xt.dot(&x);
    let xty = xt.dot(&y);
    let beta = cholesky_solve(&xtx, &xty)
        .ok_or_else(|| DataError::Internal("regression design matrix is singular".to_string()))?;

    let predictions = x.dot(&beta);
    let y_mean = y.sum() / n as f64;
    let ss_tot: f64 = y.iter().map(|&yi| (yi - y_mean).powi(2)).sum();
    let ss_res: f64 = y
        .iter()
        .zip(predictions.iter())
        .map(|(&yi, &pi)| (yi - pi).powi(2))
        .sum();
    let r_squared = if ss_tot == 0.0 {
        0.0
    } else {
        1.0 - ss_res / ss_tot
    };

    info!(
        "Fitted OLS for {} over {} observations (R^2 = {:.4})",
        target, n, r_squared
    );

    Ok(RegressionSummary {
        target,
        intercept: beta[0],
        coefficients: features
            .iter()
            .zip(beta.iter().skip(1))
            .map(|(&col, &b)| (col, b))
            .collect(),
        r_squared,
        n_observations: n,
    })
}

/// Solve `A x = b` for symmetric positive-definite `A` via Cholesky
/// decomposition, with a small diagonal ridge for numerical stability.
/// Returns `None` when the matrix is singular.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] + 1e-10 - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // forward substitution: L z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * z[j];
        }
        z[i] = (b[i] - sum) / l[[i, i]];
    }

    // backward substitution: L^T x = z
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (z[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Welch two-sample t-test result comparing forward returns between
/// positive- and negative-sentiment days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TTestResult {
    pub t_statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: f64,
    pub n_positive: usize,
    pub n_negative: usize,
    pub mean_positive: f64,
    pub mean_negative: f64,
}

impl fmt::Display for TTestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Welch t-test: positive (n = {}, mean = {:.6}) vs negative (n = {}, mean = {:.6})",
            self.n_positive, self.mean_positive, self.n_negative, self.mean_negative
        )?;
        write!(
            f,
            "  t = {:.4}, p = {:.4}, df = {:.1}",
            self.t_statistic, self.p_value, self.degrees_of_freedom
        )
    }
}

/// Compare `target` between rows where `score` exceeds `threshold`
/// (positive group) and rows where it is below `-threshold` (negative
/// group), using Welch's unequal-variance t-test. Rows missing either
/// column are excluded. Degenerate groups produce an explicit
/// insufficient-data error.
pub fn t_test_groups(
    rows: &[FusedRow],
    score: AnalysisColumn,
    target: AnalysisColumn,
    threshold: f64,
) -> DataResult<TTestResult> {
    let mut positive = Vec::new();
    let mut negative = Vec::new();
    for row in rows {
        let (s, t) = match score.extract(row).zip(target.extract(row)) {
            Some(pair) => pair,
            None => continue,
        };
        if s > threshold {
            positive.push(t);
        } else if s < -threshold {
            negative.push(t);
        }
    }

    if positive.len() < 2 || negative.len() < 2 {
        return Err(DataError::insufficient_data(format!(
            "t-test needs at least 2 observations per group, found {} positive and {} negative",
            positive.len(),
            negative.len()
        )));
    }

    let n1 = positive.len() as f64;
    let n2 = negative.len() as f64;
    let mean1 = positive.iter().sum::<f64>() / n1;
    let mean2 = negative.iter().sum::<f64>() / n2;
    let var1 = sample_variance(&positive, mean1);
    let var2 = sample_variance(&negative, mean2);

    let se_sq = var1 / n1 + var2 / n2;
    if se_sq == 0.0 {
        return Err(DataError::insufficient_data(
            "t-test groups have zero variance".to_string(),
        ));
    }

    let t_statistic = (mean1 - mean2) / se_sq.sqrt();
    // Welch-Satterthwaite degrees of freedom
    let df = se_sq.powi(2)
        / ((var1 / n1).powi(2) / (n1 - 1.0) + (var2 / n2).powi(2) / (n2 - 1.0));

    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| DataError::Internal(format!("t distribution: {e}")))?;
    let p_value = 2.0 * (1.0 - dist.cdf(t_statistic.abs()));

    info!(
        "Welch t-test: t = {:.4}, p = {:.4} ({} pos / {} neg)",
        t_statistic,
        p_value,
        positive.len(),
        negative.len()
    );

    Ok(TTestResult {
        t_statistic,
        p_value,
        degrees_of_freedom: df,
        n_positive: positive.len(),
        n_negative: negative.len(),
        mean_positive: mean1,
        mean_negative: mean2,
    })
}

fn sample_variance(values: &[f64], mean: f64) -> f64 {
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(day: u32, mean_sentiment: Option<f64>, return_next_1d: Option<f64>) -> FusedRow {
        FusedRow {
            instrument: "ACME".to_string(),
            trading_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(day as u64),
            open: None,
            high: None,
            low: None,
            close: 100.0,
            volume: None,
            mean_sentiment,
            median_sentiment: None,
            article_count: None,
            sma_20: None,
            rsi_14: None,
            macd: None,
            macd_signal: None,
            daily_return: None,
            return_next_1d,
            return_next_3d: None,
        }
    }

    #[test]
    fn test_perfect_correlation() {
        let rows: Vec<FusedRow> = (0..10)
            .map(|i| row(i, Some(i as f64 * 0.1), Some(i as f64 * 0.02)))
            .collect();
        let matrix = correlation_matrix(
            &rows,
            &[AnalysisColumn::MeanSentiment, AnalysisColumn::ReturnNext1d],
        );
        let r = matrix
            .get(AnalysisColumn::MeanSentiment, AnalysisColumn::ReturnNext1d)
            .unwrap();
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_correlation_drops_missing_pairwise() {
        let mut rows: Vec<FusedRow> = (0..10)
            .map(|i| row(i, Some(i as f64 * 0.1), Some(i as f64 * -0.02)))
            .collect();
        rows.push(row(10, Some(0.5), None));
        rows.push(row(11, None, Some(0.01)));
        let matrix = correlation_matrix(
            &rows,
            &[AnalysisColumn::MeanSentiment, AnalysisColumn::ReturnNext1d],
        );
        let r = matrix
            .get(AnalysisColumn::MeanSentiment, AnalysisColumn::ReturnNext1d)
            .unwrap();
        assert!((r + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_correlation_degenerate_is_none() {
        // constant column -> zero variance -> no correlation value
        let rows: Vec<FusedRow> = (0..5).map(|i| row(i, Some(0.3), Some(i as f64))).collect();
        let matrix = correlation_matrix(
            &rows,
            &[AnalysisColumn::MeanSentiment, AnalysisColumn::ReturnNext1d],
        );
        assert_eq!(
            matrix.get(AnalysisColumn::MeanSentiment, AnalysisColumn::ReturnNext1d),
            None
        );
    }

    #[test]
    fn test_regression_recovers_linear_relationship() {
        // y = 1.0 + 2.0 x, exactly
        let rows: Vec<FusedRow> = (0..20)
            .map(|i| {
                let x = i as f64 * 0.05;
                row(i, Some(x), Some(1.0 + 2.0 * x))
            })
            .collect();
        let summary = regression_next_day(
            &rows,
            &[AnalysisColumn::MeanSentiment],
            AnalysisColumn::ReturnNext1d,
        )
        .unwrap();
        assert_eq!(summary.n_observations, 20);
        assert!((summary.intercept - 1.0).abs() < 1e-6);
        assert!((summary.coefficients[0].1 - 2.0).abs() < 1e-6);
        assert!(summary.r_squared > 0.9999);
    }

    #[test]
    fn test_regression_insufficient_data() {
        let rows = vec![row(0, Some(0.1), Some(0.01)), row(1, Some(0.2), Some(0.02))];
        let err = regression_next_day(
            &rows,
            &[AnalysisColumn::MeanSentiment],
            AnalysisColumn::ReturnNext1d,
        )
        .unwrap_err();
        assert!(matches!(err, DataError::InsufficientData { .. }));
    }

    #[test]
    fn test_t_test_separated_groups() {
        let mut rows = Vec::new();
        for i in 0..6 {
            rows.push(row(i, Some(0.5), Some(0.01 + 0.001 * i as f64)));
            rows.push(row(i + 10, Some(-0.5), Some(-0.01 - 0.001 * i as f64)));
        }
        let result = t_test_groups(
            &rows,
            AnalysisColumn::MeanSentiment,
            AnalysisColumn::ReturnNext1d,
            0.2,
        )
        .unwrap();
        assert_eq!(result.n_positive, 6);
        assert_eq!(result.n_negative, 6);
        assert!(result.t_statistic > 0.0);
        assert!(result.p_value < 0.01);
    }

    #[test]
    fn test_t_test_insufficient_group_is_explicit() {
        let rows = vec![
            row(0, Some(0.5), Some(0.01)),
            row(1, Some(-0.5), Some(-0.01)),
            row(2, Some(-0.5), Some(-0.02)),
        ];
        let err = t_test_groups(
            &rows,
            AnalysisColumn::MeanSentiment,
            AnalysisColumn::ReturnNext1d,
            0.2,
        )
        .unwrap_err();
        assert!(matches!(err, DataError::InsufficientData { .. }));
    }

    #[test]
    fn test_neutral_rows_belong_to_neither_group() {
        let mut rows = Vec::new();
        for i in 0..4 {
            rows.push(row(i, Some(0.5), Some(0.01 * (i + 1) as f64)));
            rows.push(row(i + 10, Some(-0.5), Some(-0.01 * (i + 1) as f64)));
            rows.push(row(i + 20, Some(0.0), Some(99.0)));
        }
        let result = t_test_groups(
            &rows,
            AnalysisColumn::MeanSentiment,
            AnalysisColumn::ReturnNext1d,
            0.2,
        )
        .unwrap();
        assert_eq!(result.n_positive, 4);
        assert_eq!(result.n_negative, 4);
        assert!(result.mean_positive < 1.0);
    }

    #[test]
    fn test_column_from_str() {
        assert_eq!(
            "return_next_1d".parse::<AnalysisColumn>().unwrap(),
            AnalysisColumn::ReturnNext1d
        );
        assert_eq!(
            "return-next-3d".parse::<AnalysisColumn>().unwrap(),
            AnalysisColumn::ReturnNext3d
        );
        assert!("nope".parse::<AnalysisColumn>().is_err());
    }
}
