//! Return features over the fused series.
//!
//! All shifts operate strictly within one instrument's chronological
//! sequence. Rows are partitioned by instrument before any window math, so
//! a shift can never read an adjacent row that belongs to another
//! instrument.

use std::collections::BTreeMap;
use tracing::info;

use super::fusion::FusedRow;

/// Derive `daily_return`, `return_next_1d` and `return_next_3d` in place.
///
/// Per instrument, in ascending date order (the merge preserves the price
/// loader's ordering):
/// - `daily_return[t] = close[t] / close[t-1] - 1`, missing on the first row;
/// - `return_next_1d[t] = daily_return[t+1]`, missing on the last row —
///   a forward shift, valid as a regression target only;
/// - `return_next_3d[t] = (close[t+3] - close[t]) / close[t]`, missing on
///   the final three rows — also a target, never a feature.
///
/// Date gaps are tolerated, not filled: a shift is by row, not by calendar
/// day.
pub fn compute_returns(rows: &mut [FusedRow]) {
    let groups = partition_by_instrument(rows);

    for indices in groups.values() {
        let closes: Vec<f64> = indices.iter().map(|&i| rows[i].close).collect();
        let len = indices.len();

        let mut daily: Vec<Option<f64>> = vec![None; len];
        for t in 1..len {
            daily[t] = Some(closes[t] / closes[t - 1] - 1.0);
        }

        for (t, &i) in indices.iter().enumerate() {
            rows[i].daily_return = daily[t];
            rows[i].return_next_1d = if t + 1 < len { daily[t + 1] } else { None };
            rows[i].return_next_3d = if t + 3 < len {
                Some((closes[t + 3] - closes[t]) / closes[t])
            } else {
                None
            };
        }
    }

    info!(
        "Computed return features for {} rows across {} instruments",
        rows.len(),
        groups.len()
    );
}

/// Map each instrument to the indices of its rows, preserving row order
/// within the instrument.
pub(crate) fn partition_by_instrument(rows: &[FusedRow]) -> BTreeMap<String, Vec<usize>> {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        groups.entry(row.instrument.clone()).or_default().push(i);
    }
    groups
}
