// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_0      = close_0
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The series is seeded with the first close rather than an SMA, so the output
// is always full length regardless of `period`. Early values therefore carry
// little smoothing; consumers such as MACD skip the warm-up by convention.
// =============================================================================

/// Compute the full-length EMA series for `closes` and look-back `period`.
///
/// `result.len() == closes.len()` and `result[0] == closes[0]`.
///
/// # Edge cases
/// - empty input => empty vec
/// - `period == 0` gives a multiplier of 2; the recurrence is still applied.
pub fn calculate_ema(closes: &[f64], period: usize) -> Vec<f64> {
    let Some(&first) = closes.first() else {
        return Vec::new();
    };

    let multiplier = 2.0 / (period as f64 + 1.0);

    let mut result = Vec::with_capacity(closes.len());
    result.push(first);

    let mut prev_ema = first;
    for &close in &closes[1..] {
        let ema = close * multiplier + prev_ema * (1.0 - multiplier);
        result.push(ema);
        prev_ema = ema;
    }

    result
}

/// Most recent EMA value, or `None` for an empty series.
pub fn current_ema(closes: &[f64], period: usize) -> Option<f64> {
    calculate_ema(closes, period).last().copied()
}
