// =============================================================================
// Sequence Model Predictor — recurrent network forecast
// =============================================================================
//
// Pipeline:
//   1. min-max normalize closes into [0, 1]
//   2. slide a window of `sequence_length` closes -> next close
//   3. hold out the trailing `validation_split` share of samples
//   4. train `epochs` passes of shuffled mini-batches, one progress event and
//      one cooperative yield per epoch
//   5. roll the model forward N times, feeding each prediction back in
//   6. denormalize with the original min/max and clamp at zero
//
// Confidence = clip(85 - min(volatility * 100, 30) + trend_consistency * 10,
// 45, 95), where volatility is measured on the history and trend consistency
// on the forecast itself.

use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

use super::backend::{SequenceBackend, SequenceModel};
use super::{check_horizon, ensure_active, finish_prediction, Predictor, ProgressObserver};
use crate::config::SequenceParams;
use crate::confidence::{clip, trend_consistency, volatility};
use crate::error::ForecastError;
use crate::types::{ModelKind, Prediction, PriceSeries, TrainingProgress};

pub struct SequenceModelPredictor {
    backend: Option<Arc<dyn SequenceBackend>>,
    params: SequenceParams,
}

/// Linear map of the observed price range onto [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
struct MinMax {
    min: f64,
    range: f64,
}

impl MinMax {
    fn fit(values: &[f64]) -> Result<Self, ForecastError> {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        if !range.is_finite() || range <= 0.0 {
            return Err(ForecastError::DegenerateData(
                "price history has no variation".into(),
            ));
        }
        Ok(Self { min, range })
    }

    fn normalize(&self, value: f64) -> f64 {
        (value - self.min) / self.range
    }

    fn denormalize(&self, value: f64) -> f64 {
        value * self.range + self.min
    }
}

/// Sliding windows over the normalized series with a train/validation split.
struct TrainingSet<'a> {
    windows: Vec<&'a [f64]>,
    targets: Vec<f64>,
    split_at: usize,
}

impl<'a> TrainingSet<'a> {
    fn build(normalized: &'a [f64], sequence_length: usize, validation_split: f64) -> Self {
        let (windows, targets): (Vec<&[f64]>, Vec<f64>) = normalized
            .windows(sequence_length + 1)
            .map(|w| (&w[..sequence_length], w[sequence_length]))
            .unzip();

        let samples = windows.len();
        let split_at = ((samples as f64 * (1.0 - validation_split)).floor() as usize)
            .max(1)
            .min(samples);

        Self {
            windows,
            targets,
            split_at,
        }
    }

    fn len(&self) -> usize {
        self.windows.len()
    }

    fn train_len(&self) -> usize {
        self.split_at
    }

    fn validation(&self) -> (&[&'a [f64]], &[f64]) {
        (&self.windows[self.split_at..], &self.targets[self.split_at..])
    }
}

impl SequenceModelPredictor {
    pub fn new(backend: Option<Arc<dyn SequenceBackend>>, params: SequenceParams) -> Self {
        Self { backend, params }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub fn params(&self) -> &SequenceParams {
        &self.params
    }

    /// Mini-batch size: half the samples, capped at `max_batch_size`, at least 1.
    pub fn batch_size(&self, samples: usize) -> usize {
        (samples / 2).min(self.params.max_batch_size).max(1)
    }

    pub fn confidence(forecast: &[f64], history: &[f64]) -> f64 {
        if forecast.is_empty() || history.is_empty() {
            return 50.0;
        }
        let volatility_penalty = (volatility(history) * 100.0).min(30.0);
        let trend_bonus = trend_consistency(forecast) * 10.0;
        clip(85.0 - volatility_penalty + trend_bonus, 45.0, 95.0)
    }

    async fn train(
        &self,
        model: &mut dyn SequenceModel,
        data: &TrainingSet<'_>,
        observer: &dyn ProgressObserver,
    ) -> Result<(), ForecastError> {
        let epochs = self.params.epochs;
        let batch_size = self.batch_size(data.len());
        let mut rng = match self.params.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
            None => StdRng::from_os_rng(),
        };
        let mut order: Vec<usize> = (0..data.train_len()).collect();
        let (val_windows, val_targets) = data.validation();

        for epoch in 1..=epochs {
            ensure_active(observer)?;
            order.shuffle(&mut rng);

            let mut weighted_loss = 0.0;
            for chunk in order.chunks(batch_size) {
                let windows: Vec<&[f64]> = chunk.iter().map(|&i| data.windows[i]).collect();
                let targets: Vec<f64> = chunk.iter().map(|&i| data.targets[i]).collect();
                weighted_loss += model.train_batch(&windows, &targets)? * chunk.len() as f64;
            }
            let loss = weighted_loss / order.len() as f64;

            let val_loss = if val_windows.is_empty() {
                None
            } else {
                Some(model.evaluate(val_windows, val_targets)?)
            };

            if !loss.is_finite() || val_loss.is_some_and(|v| !v.is_finite()) {
                return Err(ForecastError::Training(format!(
                    "non-finite loss at epoch {epoch}"
                )));
            }

            debug!(epoch, total = epochs, loss, val_loss = ?val_loss, "sequence epoch finished");

            observer.on_progress(TrainingProgress {
                model: ModelKind::Sequence,
                epoch,
                total_epochs: epochs,
                loss: Some(loss),
                val_loss,
            });
            tokio::task::yield_now().await;
        }

        ensure_active(observer)
    }

    fn roll_forward(
        &self,
        model: &dyn SequenceModel,
        normalized: &[f64],
        scale: MinMax,
        horizon: usize,
    ) -> Result<Vec<f64>, ForecastError> {
        let seq = self.params.sequence_length;
        let mut window = normalized[normalized.len() - seq..].to_vec();
        let mut values = Vec::with_capacity(horizon);

        for _ in 0..horizon {
            let next = model.predict_next(&window)?;
            if !next.is_finite() {
                return Err(ForecastError::Training(format!(
                    "non-finite model output {next}"
                )));
            }
            values.push(scale.denormalize(next).max(0.0));
            window.rotate_left(1);
            window[seq - 1] = next;
        }

        Ok(values)
    }
}

#[async_trait]
impl Predictor for SequenceModelPredictor {
    fn kind(&self) -> ModelKind {
        ModelKind::Sequence
    }

    async fn predict(
        &self,
        series: &PriceSeries,
        horizon: usize,
        observer: &dyn ProgressObserver,
    ) -> Result<Prediction, ForecastError> {
        check_horizon(horizon)?;
        if self.params.sequence_length == 0 {
            return Err(ForecastError::Training(
                "sequence_length must be at least 1".into(),
            ));
        }
        let Some(backend) = &self.backend else {
            return Err(ForecastError::ModelUnavailable(
                "no sequence backend installed".into(),
            ));
        };

        let closes = series.closes();
        let required = self.params.min_series_len();
        if closes.len() < required {
            return Err(ForecastError::InsufficientData {
                required,
                actual: closes.len(),
            });
        }

        let scale = MinMax::fit(&closes)?;
        let normalized: Vec<f64> = closes.iter().map(|&c| scale.normalize(c)).collect();
        let data = TrainingSet::build(
            &normalized,
            self.params.sequence_length,
            self.params.validation_split,
        );
        if data.train_len() == 0 {
            return Err(ForecastError::InsufficientData {
                required: self.params.sequence_length + 1,
                actual: closes.len(),
            });
        }

        info!(
            symbol = series.symbol(),
            backend = backend.name(),
            samples = data.len(),
            train = data.train_len(),
            epochs = self.params.epochs,
            "training sequence model"
        );

        let mut model = backend.build(&self.params.model_spec())?;
        self.train(model.as_mut(), &data, observer).await?;

        let values = self.roll_forward(model.as_ref(), &normalized, scale, horizon)?;
        let confidence = Self::confidence(&values, &closes);

        finish_prediction(self.kind(), series, values, confidence)
    }
}
