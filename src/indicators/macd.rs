// =============================================================================
// Moving Average Convergence / Divergence (MACD line)
// =============================================================================
//
//   MACD_t = EMA12_t - EMA26_t
//
// Both EMAs are full length (seeded with the first close), so the difference
// exists at every index. By convention the line is only reported from index
// 25 onward, the first index where the slow EMA has a full period of history.

use super::ema::calculate_ema;

pub const FAST_PERIOD: usize = 12;
pub const SLOW_PERIOD: usize = 26;

/// First index at which the MACD line is reported.
const WARMUP_INDEX: usize = SLOW_PERIOD - 1;

/// MACD line from index 25 onward.
///
/// Length is `max(0, min(len(ema12), len(ema26)) - 25)`, i.e. empty below 26
/// closes.
pub fn calculate_macd(closes: &[f64]) -> Vec<f64> {
    let fast = calculate_ema(closes, FAST_PERIOD);
    let slow = calculate_ema(closes, SLOW_PERIOD);
    let len = fast.len().min(slow.len());

    (WARMUP_INDEX..len).map(|i| fast[i] - slow[i]).collect()
}

/// Latest MACD value; `0.0` with fewer than 26 closes.
pub fn current_macd(closes: &[f64]) -> f64 {
    if closes.len() < SLOW_PERIOD {
        return 0.0;
    }
    let fast = calculate_ema(closes, FAST_PERIOD);
    let slow = calculate_ema(closes, SLOW_PERIOD);
    match (fast.last(), slow.last()) {
        (Some(f), Some(s)) => f - s,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macd_short_series() {
        let closes: Vec<f64> = (1..=25).map(|x| x as f64).collect();
        assert!(calculate_macd(&closes).is_empty());
        assert_eq!(current_macd(&closes), 0.0);
        assert!(calculate_macd(&[]).is_empty());
    }

    #[test]
    fn macd_length() {
        for n in [26usize, 27, 40, 100] {
            let closes: Vec<f64> = (0..n).map(|x| 50.0 + (x as f64).sin()).collect();
            assert_eq!(calculate_macd(&closes).len(), n - 25, "n = {n}");
        }
    }

    #[test]
    fn macd_scalar_matches_last_line_value() {
        let closes: Vec<f64> = (0..60).map(|x| 100.0 + (x as f64 * 0.3).cos() * 5.0).collect();
        let line = calculate_macd(&closes);
        assert!((current_macd(&closes) - line[line.len() - 1]).abs() < 1e-12);
    }

    #[test]
    fn macd_positive_in_uptrend() {
        let closes: Vec<f64> = (1..=80).map(|x| x as f64).collect();
        assert!(current_macd(&closes) > 0.0);
        assert!(calculate_macd(&closes).iter().all(|v| *v > 0.0));
    }

    #[test]
    fn macd_zero_on_flat_series() {
        let closes = vec![42.0; 40];
        assert!(current_macd(&closes).abs() < 1e-12);
    }
}
