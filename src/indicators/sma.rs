// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// Unweighted mean over a fixed trailing window:
//   SMA_i = (close_i + ... + close_{i+period-1}) / period
//
// The output has one element per full window, i.e. `len - period + 1`
// elements, and is empty when the series is shorter than the window.

/// Compute the SMA series for `closes` over `period`.
///
/// Element `i` is the mean of `closes[i ..= i + period - 1]`.
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - `closes.len() < period` => empty vec
pub fn calculate_sma(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let period_f = period as f64;
    let mut result = Vec::with_capacity(closes.len() - period + 1);

    // Rolling sum; re-summing each window would be O(n * period).
    let mut sum: f64 = closes[..period].iter().sum();
    result.push(sum / period_f);

    for i in period..closes.len() {
        sum += closes[i] - closes[i - period];
        result.push(sum / period_f);
    }

    result
}

/// Most recent SMA value, or `None` with fewer than `period` closes.
pub fn current_sma(closes: &[f64], period: usize) -> Option<f64> {
    calculate_sma(closes, period).last().copied()
}
