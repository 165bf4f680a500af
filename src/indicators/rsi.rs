// =============================================================================
// Relative Strength Index (RSI) — trailing simple-average variant
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// For each evaluated index i (from `period` to the end of the series):
//   Step 1 — Take the `period` price changes inside prices[i - period ..= i].
//   Step 2 — avg_gain = sum(positive changes) / period
//            avg_loss = sum(|negative changes|) / period
//   Step 3 — avg_loss == 0  => RSI = 100
//            otherwise RS = avg_gain / avg_loss, RSI = 100 - 100 / (1 + RS)
//
// The scalar RSI is the last element of the series, so the display value and
// the chart line always agree.
//
// Thresholds:  RSI >= 70 => OVERBOUGHT,  RSI <= 30 => OVERSOLD.
// =============================================================================

/// Default RSI look-back.
pub const DEFAULT_RSI_PERIOD: usize = 14;

/// Neutral RSI returned when there is not enough history.
pub const NEUTRAL_RSI: f64 = 50.0;

/// Compute the RSI series for `closes` and `period`.
///
/// One value per index `period ..= closes.len() - 1`, each recomputed from
/// scratch over its own window.
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - `closes.len() < period + 1` => empty vec
/// - A window without losses (including a flat one) yields 100.0.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    closes
        .windows(period + 1)
        .map(|window| rsi_for_window(window, period))
        .collect()
}

/// Most recent RSI value; [`NEUTRAL_RSI`] when the history is too short.
pub fn current_rsi(closes: &[f64], period: usize) -> f64 {
    if period == 0 || closes.len() < period + 1 {
        return NEUTRAL_RSI;
    }
    rsi_for_window(&closes[closes.len() - period - 1..], period)
}

/// Human-readable zone label for an RSI value.
pub fn rsi_label(value: f64) -> &'static str {
    if value >= 70.0 {
        "OVERBOUGHT"
    } else if value <= 30.0 {
        "OVERSOLD"
    } else {
        "NEUTRAL"
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

/// RSI over a window of `period + 1` closes (`period` deltas).
fn rsi_for_window(window: &[f64], period: usize) -> f64 {
    let (sum_gain, sum_loss) = window.windows(2).fold((0.0_f64, 0.0_f64), |(g, l), w| {
        let delta = w[1] - w[0];
        if delta > 0.0 {
            (g + delta, l)
        } else {
            (g, l - delta)
        }
    });

    let period_f = period as f64;
    rsi_from_averages(sum_gain / period_f, sum_loss / period_f)
}

/// Convert average gain / average loss into an RSI value in [0, 100].
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    let rsi = 100.0 - 100.0 / (1.0 + rs);
    if rsi.is_finite() {
        rsi.clamp(0.0, 100.0)
    } else {
        NEUTRAL_RSI
    }
}
