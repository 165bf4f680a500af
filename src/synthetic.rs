// =============================================================================
// Synthetic demo series
// =============================================================================
//
// Random-walk daily bars used when no market-data collaborator is wired in.
// The walk starts in [100, 300), moves by a uniform step in [-5, 5) per day
// and never drops below 10. Bars end the day before `end_date`.

use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::ForecastError;
use crate::types::{PriceBar, PriceSeries};

const PRICE_FLOOR: f64 = 10.0;
const MAX_STEP: f64 = 5.0;
const WICK_PCT: f64 = 0.05;

/// Generate `days` bars of demo data for `symbol`.
///
/// `seed` makes the walk reproducible; `None` draws from the OS.
pub fn generate_demo_series(
    symbol: &str,
    days: usize,
    seed: Option<u64>,
    end_date: NaiveDate,
) -> Result<PriceSeries, ForecastError> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut price: f64 = rng.random_range(100.0..300.0);
    let mut bars = Vec::with_capacity(days);

    for i in 0..days {
        price = (price + rng.random_range(-MAX_STEP..MAX_STEP)).max(PRICE_FLOOR);

        let offset = (days - i) as u64;
        let date = end_date.checked_sub_days(Days::new(offset)).ok_or_else(|| {
            ForecastError::InvalidRequest(format!("{days} days before {end_date} is out of range"))
        })?;

        bars.push(PriceBar {
            date,
            open: price * rng.random_range(1.0 - WICK_PCT..1.0 + WICK_PCT),
            high: price * (1.0 + rng.random_range(0.0..WICK_PCT)),
            low: price * (1.0 - rng.random_range(0.0..WICK_PCT)),
            close: (price * 100.0).round() / 100.0,
            volume: rng.random_range(1_000_000.0_f64..11_000_000.0).floor(),
        });
    }

    debug!(symbol, days, seed = ?seed, "demo series generated");
    PriceSeries::new(symbol, bars)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn end() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn generates_requested_length_ending_yesterday() {
        let series = generate_demo_series("DEMO", 100, Some(1), end()).unwrap();
        assert_eq!(series.len(), 100);
        assert_eq!(series.last_date(), NaiveDate::from_ymd_opt(2025, 5, 31).unwrap());
        assert_eq!(series.symbol(), "DEMO");
    }

    #[test]
    fn bars_respect_bounds() {
        let series = generate_demo_series("DEMO", 250, Some(2), end()).unwrap();
        for bar in series.bars() {
            assert!(bar.close >= PRICE_FLOOR);
            assert!(bar.low <= bar.close + 0.01 && bar.close <= bar.high + 0.01);
            assert!((1_000_000.0..11_000_000.0).contains(&bar.volume));
            assert_eq!((bar.close * 100.0).round() / 100.0, bar.close);
        }
    }

    #[test]
    fn same_seed_same_series() {
        let a = generate_demo_series("A", 30, Some(9), end()).unwrap();
        let b = generate_demo_series("A", 30, Some(9), end()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_days_is_insufficient() {
        let err = generate_demo_series("A", 0, Some(1), end()).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { .. }));
    }
}
