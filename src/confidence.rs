// =============================================================================
// Confidence Scoring — bounded heuristics for forecast reliability
// =============================================================================
//
// Stateless helpers the predictors combine into their confidence score:
//
//   volatility          population std-dev of simple returns
//   trend_consistency   share of consecutive moves that keep direction
//   r_squared           goodness of the OLS price-vs-index fit
//
// Each returns a documented neutral value when the input is too short, so a
// score can always be produced. Scores are heuristics, not statistical
// guarantees.

use tracing::trace;

/// Neutral value for volatility and trend consistency on short input.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Standard deviation of simple returns `(p[i] - p[i-1]) / p[i-1]`.
///
/// Pairs with a non-positive previous price are skipped. Returns
/// [`NEUTRAL_SCORE`] with fewer than two prices or no usable return.
pub fn volatility(prices: &[f64]) -> f64 {
    if prices.len() < 2 {
        return NEUTRAL_SCORE;
    }

    let returns: Vec<f64> = prices
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();

    if returns.is_empty() {
        trace!("volatility: no usable returns");
        return NEUTRAL_SCORE;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Fraction of adjacent moves that continue in the same direction.
///
/// A move counts as "up" only when strictly greater; flat counts as "down".
/// Returns [`NEUTRAL_SCORE`] with fewer than three values.
pub fn trend_consistency(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return NEUTRAL_SCORE;
    }

    let consistent = values
        .windows(3)
        .filter(|w| (w[2] > w[1]) == (w[1] > w[0]))
        .count();

    consistent as f64 / (values.len() - 2) as f64
}

/// Ordinary least-squares fit of `prices` against their index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn value_at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Closed-form normal-equation fit. `None` with fewer than two points or a
/// zero denominator.
pub fn least_squares(prices: &[f64]) -> Option<LinearFit> {
    if prices.len() < 2 {
        return None;
    }

    let n = prices.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0_f64, 0.0_f64, 0.0_f64, 0.0_f64);
    for (i, &y) in prices.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator.abs() < f64::EPSILON {
        trace!("least_squares: degenerate denominator");
        return None;
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;

    if !slope.is_finite() || !intercept.is_finite() {
        return None;
    }

    Some(LinearFit { slope, intercept })
}

/// Coefficient of determination of the OLS fit, floored at 0.
///
/// Returns `0.0` with fewer than two points or zero total variance.
pub fn r_squared(prices: &[f64]) -> f64 {
    let Some(fit) = least_squares(prices) else {
        return 0.0;
    };

    let n = prices.len() as f64;
    let mean = prices.iter().sum::<f64>() / n;
    let total_ss: f64 = prices.iter().map(|y| (y - mean).powi(2)).sum();
    if total_ss <= f64::EPSILON * mean.abs().max(1.0) {
        return 0.0;
    }

    let residual_ss: f64 = prices
        .iter()
        .enumerate()
        .map(|(i, &y)| (y - fit.value_at(i as f64)).powi(2))
        .sum();

    (1.0 - residual_ss / total_ss).max(0.0)
}

/// Clamp `value` into `[lo, hi]`, mapping NaN to `lo`.
pub fn clip(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        return lo;
    }
    value.clamp(lo, hi)
}
