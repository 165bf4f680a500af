// =============================================================================
// Predictors — interchangeable forecasting strategies
// =============================================================================
//
// Every strategy implements `Predictor`: given a validated series and a
// horizon it either returns a complete `Prediction` or fails with a
// `ForecastError`, never a partial result. Progress is pushed through a
// `ProgressObserver` before the result is returned.
//
//   SequenceModelPredictor    recurrent network via a `SequenceBackend`
//   LinearTrendPredictor      closed-form OLS trend
//   MovingAveragePredictor    SMA/EMA blend plus recent drift
//
// Shared post-processing (clamping, forecast dates, cooperative pacing) lives
// here so the three strategies stay consistent.

pub mod backend;
pub mod linear;
pub mod moving_average;
pub mod sequence;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ForecastError;
use crate::types::{ModelKind, Prediction, PriceSeries, TrainingProgress};

pub use backend::{SequenceBackend, SequenceModel, SequenceModelSpec};
pub use linear::LinearTrendPredictor;
pub use moving_average::MovingAveragePredictor;
pub use sequence::SequenceModelPredictor;

/// Receives progress notifications from a running predictor.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: TrainingProgress);

    /// Polled at every epoch or pacing step; `true` aborts the run.
    fn is_cancelled(&self) -> bool {
        false
    }

    /// Generation reported in the `Superseded` error when cancelled.
    fn generation(&self) -> u64 {
        0
    }
}

/// Observer that drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _progress: TrainingProgress) {}
}

#[async_trait]
pub trait Predictor: Send + Sync {
    fn kind(&self) -> ModelKind;

    async fn predict(
        &self,
        series: &PriceSeries,
        horizon: usize,
        observer: &dyn ProgressObserver,
    ) -> Result<Prediction, ForecastError>;
}

pub(crate) fn check_horizon(horizon: usize) -> Result<(), ForecastError> {
    if horizon == 0 {
        return Err(ForecastError::InvalidRequest(
            "horizon must be at least one day".into(),
        ));
    }
    Ok(())
}

pub(crate) fn ensure_active(observer: &dyn ProgressObserver) -> Result<(), ForecastError> {
    if observer.is_cancelled() {
        return Err(ForecastError::Superseded {
            generation: observer.generation(),
        });
    }
    Ok(())
}

/// Emit `steps` progress events, sleeping `pacing` before each one.
///
/// With zero pacing the task still yields between steps so a concurrent
/// supersede request gets a chance to run.
pub(crate) async fn report_paced_steps(
    model: ModelKind,
    steps: usize,
    pacing: Duration,
    observer: &dyn ProgressObserver,
) -> Result<(), ForecastError> {
    for step in 1..=steps {
        ensure_active(observer)?;
        if pacing.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(pacing).await;
        }
        observer.on_progress(TrainingProgress::step(model, step, steps));
    }
    ensure_active(observer)
}

/// Clamp `values` to >= 0 and attach forecast dates after the series end.
pub(crate) fn finish_prediction(
    model: ModelKind,
    series: &PriceSeries,
    values: Vec<f64>,
    confidence: f64,
) -> Result<Prediction, ForecastError> {
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(ForecastError::Training(format!(
            "{model} produced a non-finite forecast value {bad}"
        )));
    }
    let values: Vec<f64> = values.into_iter().map(|v| v.max(0.0)).collect();
    let dates = series.future_dates(values.len())?;
    Ok(Prediction::new(model, values, dates, confidence))
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn paced_steps_are_increasing() {
        let observer = RecordingObserver::default();
        report_paced_steps(ModelKind::Linear, 10, Duration::ZERO, &observer)
            .await
            .unwrap();
        let events = observer.events.lock();
        assert_eq!(events.len(), 10);
        assert!(events.windows(2).all(|w| w[1].epoch == w[0].epoch + 1));
        assert_eq!(events[9].epoch, 10);
        assert_eq!(events[9].total_epochs, 10);
    }

    #[tokio::test]
    async fn cancelled_observer_stops_pacing() {
        let err = report_paced_steps(ModelKind::MovingAverage, 5, Duration::ZERO, &CancelledObserver)
            .await
            .unwrap_err();
        assert_eq!(err, ForecastError::Superseded { generation: 7 });
    }

    #[test]
    fn finish_clamps_negative_values() {
        let series = series_from_closes(&[3.0, 2.0, 1.0]);
        let p = finish_prediction(ModelKind::Linear, &series, vec![0.5, -1.0], 40.0).unwrap();
        assert_eq!(p.values, vec![0.5, 0.0]);
        assert_dates_follow(&series, &p);
    }

    #[test]
    fn finish_rejects_nan() {
        let series = series_from_closes(&[1.0, 2.0]);
        let err = finish_prediction(ModelKind::Sequence, &series, vec![f64::NAN], 50.0).unwrap_err();
        assert!(matches!(err, ForecastError::Training(_)));
    }

    #[test]
    fn zero_horizon_rejected() {
        assert!(matches!(check_horizon(0), Err(ForecastError::InvalidRequest(_))));
        assert!(check_horizon(1).is_ok());
    }
}
