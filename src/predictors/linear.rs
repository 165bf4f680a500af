// =============================================================================
// Linear Trend Predictor
// =============================================================================
//
// Closed-form ordinary least squares of close against bar index over the whole
// series, extrapolated to indices n .. n+N-1. Confidence is R² in percent,
// clipped to [40, 90].

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{check_horizon, finish_prediction, report_paced_steps, Predictor, ProgressObserver};
use crate::confidence::{clip, least_squares, r_squared, LinearFit};
use crate::error::ForecastError;
use crate::types::{ModelKind, Prediction, PriceSeries};

const MIN_POINTS: usize = 2;
const PROGRESS_STEPS: usize = 10;

pub struct LinearTrendPredictor {
    pacing: Duration,
}

impl LinearTrendPredictor {
    pub fn new(pacing: Duration) -> Self {
        Self { pacing }
    }

    /// Fit the trend line, failing on too few points or zero x-variance.
    pub fn fit(closes: &[f64]) -> Result<LinearFit, ForecastError> {
        if closes.len() < MIN_POINTS {
            return Err(ForecastError::InsufficientData {
                required: MIN_POINTS,
                actual: closes.len(),
            });
        }
        least_squares(closes).ok_or_else(|| {
            ForecastError::DegenerateData("regression denominator is zero".into())
        })
    }

    pub fn confidence(closes: &[f64]) -> f64 {
        clip(r_squared(closes) * 100.0, 40.0, 90.0)
    }
}

#[async_trait]
impl Predictor for LinearTrendPredictor {
    fn kind(&self) -> ModelKind {
        ModelKind::Linear
    }

    async fn predict(
        &self,
        series: &PriceSeries,
        horizon: usize,
        observer: &dyn ProgressObserver,
    ) -> Result<Prediction, ForecastError> {
        check_horizon(horizon)?;
        let closes = series.closes();
        let fit = Self::fit(&closes)?;

        let n = closes.len();
        let values: Vec<f64> = (0..horizon).map(|i| fit.value_at((n + i) as f64)).collect();
        let confidence = Self::confidence(&closes);

        debug!(
            symbol = series.symbol(),
            slope = fit.slope,
            intercept = fit.intercept,
            confidence,
            "linear trend fitted"
        );

        report_paced_steps(self.kind(), PROGRESS_STEPS, self.pacing, observer).await?;
        finish_prediction(self.kind(), series, values, confidence)
    }
}
