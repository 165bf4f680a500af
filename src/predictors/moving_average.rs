// =============================================================================
// Moving Average Predictor — last resort of the fallback chain
// =============================================================================
//
// Forecast = 0.4 * SMA(w) + 0.6 * EMA(w) + recent drift * day index, with
//   w     = max(1, min(20, len / 2))
//   drift = (last - first) / count over the last min(10, len) closes
//
// Day 0 of the forecast is the blended base itself. Confidence measures how
// closely recent closes tracked the SMA, clipped to [35, 85].

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{check_horizon, finish_prediction, report_paced_steps, Predictor, ProgressObserver};
use crate::confidence::clip;
use crate::error::ForecastError;
use crate::indicators::{calculate_ema, calculate_sma};
use crate::types::{ModelKind, Prediction, PriceSeries};

const MAX_WINDOW: usize = 20;
const DRIFT_LOOKBACK: usize = 10;
const SMA_WEIGHT: f64 = 0.4;
const EMA_WEIGHT: f64 = 0.6;
const CONFIDENCE_LOOKBACK: usize = 20;
const PROGRESS_STEPS: usize = 5;

pub struct MovingAveragePredictor {
    pacing: Duration,
}

impl MovingAveragePredictor {
    pub fn new(pacing: Duration) -> Self {
        Self { pacing }
    }

    pub fn window_size(len: usize) -> usize {
        (len / 2).clamp(1, MAX_WINDOW)
    }

    /// Raw forecast values for `horizon` days (not yet clamped).
    pub fn forecast_values(closes: &[f64], horizon: usize) -> Vec<f64> {
        let Some(&last_close) = closes.last() else {
            return Vec::new();
        };
        let window = Self::window_size(closes.len());

        let last_sma = calculate_sma(closes, window).last().copied().unwrap_or(last_close);
        let last_ema = calculate_ema(closes, window).last().copied().unwrap_or(last_close);
        let base = SMA_WEIGHT * last_sma + EMA_WEIGHT * last_ema;

        let recent = &closes[closes.len() - closes.len().min(DRIFT_LOOKBACK)..];
        let drift = if recent.len() > 1 {
            (recent[recent.len() - 1] - recent[0]) / recent.len() as f64
        } else {
            0.0
        };

        (0..horizon).map(|i| base + drift * i as f64).collect()
    }

    /// How closely the last closes tracked their SMA, in percent.
    ///
    /// # Edge cases
    /// - empty SMA => 50
    /// - zero mean close => accuracy 0, clipped up to 35
    pub fn confidence(closes: &[f64], sma: &[f64]) -> f64 {
        if sma.is_empty() || closes.is_empty() {
            return 50.0;
        }

        let lookback = CONFIDENCE_LOOKBACK.min(sma.len()).min(closes.len());
        let recent_closes = &closes[closes.len() - lookback..];
        let recent_sma = &sma[sma.len() - lookback..];

        let count = lookback as f64;
        let avg_deviation = recent_closes
            .iter()
            .zip(recent_sma)
            .map(|(c, s)| (c - s).abs())
            .sum::<f64>()
            / count;
        let avg_close = recent_closes.iter().sum::<f64>() / count;

        let accuracy = if avg_close > 0.0 {
            1.0 - avg_deviation / avg_close
        } else {
            0.0
        };
        clip(accuracy * 100.0, 35.0, 85.0)
    }
}

#[async_trait]
impl Predictor for MovingAveragePredictor {
    fn kind(&self) -> ModelKind {
        ModelKind::MovingAverage
    }

    async fn predict(
        &self,
        series: &PriceSeries,
        horizon: usize,
        observer: &dyn ProgressObserver,
    ) -> Result<Prediction, ForecastError> {
        check_horizon(horizon)?;
        let closes = series.closes();

        let window = Self::window_size(closes.len());
        let sma = calculate_sma(&closes, window);
        let values = Self::forecast_values(&closes, horizon);
        let confidence = Self::confidence(&closes, &sma);

        debug!(
            symbol = series.symbol(),
            window,
            confidence,
            "moving-average forecast computed"
        );

        report_paced_steps(self.kind(), PROGRESS_STEPS, self.pacing, observer).await?;
        finish_prediction(self.kind(), series, values, confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictors::test_support::*;
    use crate::predictors::NoopObserver;

    #[test]
    fn window_size_bounds() {
        assert_eq!(MovingAveragePredictor::window_size(1), 1);
        assert_eq!(MovingAveragePredictor::window_size(3), 1);
        assert_eq!(MovingAveragePredictor::window_size(10), 5);
        assert_eq!(MovingAveragePredictor::window_size(100), 20);
    }

    #[test]
    fn constant_series_forecasts_flat() {
        let closes = vec![50.0; 30];
        let values = MovingAveragePredictor::forecast_values(&closes, 5);
        assert!(values.iter().all(|v| (v - 50.0).abs() < 1e-10));
    }

    #[test]
    fn drift_uses_last_ten_closes() {
        // Last 10 closes go 11..=20 => drift = 9 / 10.
        let closes: Vec<f64> = (1..=20).map(|v| v as f64).collect();
        let values = MovingAveragePredictor::forecast_values(&closes, 3);
        assert!((values[1] - values[0] - 0.9).abs() < 1e-10);
        assert!((values[2] - values[1] - 0.9).abs() < 1e-10);
    }

    #[test]
    fn single_close_uses_last_close() {
        let values = MovingAveragePredictor::forecast_values(&[42.0], 2);
        assert_eq!(values, vec![42.0, 42.0]);
    }

    #[test]
    fn confidence_is_clipped() {
        let flat = vec![100.0; 40];
        let sma = calculate_sma(&flat, 20);
        assert_eq!(MovingAveragePredictor::confidence(&flat, &sma), 85.0);

        let zeros = vec![0.0; 10];
        let sma = calculate_sma(&zeros, 5);
        assert_eq!(MovingAveragePredictor::confidence(&zeros, &sma), 35.0);

        assert_eq!(MovingAveragePredictor::confidence(&flat, &[]), 50.0);
    }

    #[tokio::test]
    async fn predict_emits_five_steps_and_valid_dates() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let series = series_from_closes(&closes);
        let observer = RecordingObserver::default();

        let predictor = MovingAveragePredictor::new(Duration::ZERO);
        let p = predictor.predict(&series, 30, &observer).await.unwrap();

        assert_eq!(p.values.len(), 30);
        assert_eq!(p.model, ModelKind::MovingAverage);
        assert_eq!(p.model_name, "Moving Average");
        assert!(p.values.iter().all(|v| *v >= 0.0));
        assert!((35.0..=85.0).contains(&p.confidence));
        assert_dates_follow(&series, &p);
        assert_eq!(observer.events.lock().len(), 5);
    }

    #[tokio::test]
    async fn steep_decline_is_clamped_at_zero() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64 * 5.0).collect();
        let series = series_from_closes(&closes);
        let p = MovingAveragePredictor::new(Duration::ZERO)
            .predict(&series, 60, &NoopObserver)
            .await
            .unwrap();
        assert_eq!(*p.values.last().unwrap(), 0.0);
        assert!(p.values.iter().all(|v| *v >= 0.0));
    }
}
