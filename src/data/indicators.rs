//! Technical indicators module
//! Implements SMA, RSI and MACD series over the fused price table

use tracing::info;

use super::features::partition_by_instrument;
use super::fusion::FusedRow;

const SMA_PERIOD: usize = 20;
const RSI_PERIOD: usize = 14;
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;

/// Attach SMA-20, RSI-14 and MACD(12,26,9) columns to the fused rows,
/// computed per instrument over its chronological close series. Output
/// length always matches input length; warm-up periods are explicit
/// missing values, never zeros.
pub fn attach_indicators(rows: &mut [FusedRow]) {
    let groups = partition_by_instrument(rows);

    for indices in groups.values() {
        let closes: Vec<f64> = indices.iter().map(|&i| rows[i].close).collect();

        let sma = sma_series(&closes, SMA_PERIOD);
        let rsi = rsi_series(&closes, RSI_PERIOD);
        let (macd, signal) = macd_series(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);

        for (t, &i) in indices.iter().enumerate() {
            rows[i].sma_20 = sma[t];
            rows[i].rsi_14 = rsi[t];
            rows[i].macd = macd[t];
            rows[i].macd_signal = signal[t];
        }
    }

    info!("Attached indicators for {} instruments", groups.len());
}

/// Simple moving average; defined once a full window is available.
pub fn sma_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; prices.len()];
    if period == 0 || prices.len() < period {
        return out;
    }
    let mut window_sum: f64 = prices[..period].iter().sum();
    out[period - 1] = Some(window_sum / period as f64);
    for t in period..prices.len() {
        window_sum += prices[t] - prices[t - period];
        out[t] = Some(window_sum / period as f64);
    }
    out
}

/// Exponential moving average, seeded with the SMA of the first window.
pub fn ema_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; prices.len()];
    if period == 0 || prices.len() < period {
        return out;
    }
    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut ema: f64 = prices[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(ema);
    for t in period..prices.len() {
        ema = (prices[t] - ema) * multiplier + ema;
        out[t] = Some(ema);
    }
    out
}

/// Relative Strength Index with Wilder smoothing; defined from the first
/// index with `period` price changes behind it.
pub fn rsi_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; prices.len()];
    if period == 0 || prices.len() < period + 1 {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for t in 1..=period {
        let change = prices[t] - prices[t - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss += change.abs();
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = Some(rsi_value(avg_gain, avg_loss));

    for t in (period + 1)..prices.len() {
        let change = prices[t] - prices[t - 1];
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, change.abs())
        };
        avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        out[t] = Some(rsi_value(avg_gain, avg_loss));
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

/// MACD line and its signal line. The MACD line is defined where both EMAs
/// are; the signal line is a 9-period EMA over the defined MACD values.
pub fn macd_series(
    prices: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let ema_fast = ema_series(prices, fast);
    let ema_slow = ema_series(prices, slow);

    let macd: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    let mut signal_line = vec![None; prices.len()];
    let start = macd.iter().position(|v| v.is_some());
    if let Some(start) = start {
        let defined: Vec<f64> = macd[start..].iter().map(|v| v.unwrap_or(0.0)).collect();
        for (offset, value) in ema_series(&defined, signal).into_iter().enumerate() {
            signal_line[start + offset] = value;
        }
    }

    (macd, signal_line)
}
