// =============================================================================
// Forecast Orchestrator — model selection, fallback and supersession
// =============================================================================
//
// Owns the current price series and the most recent prediction. A run walks
// the fallback chain starting at the requested model until one predictor
// succeeds or the chain is exhausted.
//
// Every run takes a fresh generation number. Loading a new series or calling
// `SupersedeHandle::supersede` bumps the counter; a run that observes a newer
// generation (at an epoch boundary, between fallback steps, or right before
// storing its result) is abandoned with `Superseded` and its output is
// dropped.
//
// Progress, state transitions, fallback notices and the terminal outcome are
// published on an unbounded mpsc channel as `ForecastEvent`s. `run` holds the
// orchestrator mutably, so the channel is the only way to watch a run from
// outside; `state()` reports the state the last run ended in.
//
// A predictor trains and forecasts inside a single `predict` call, so
// `Training(m)` spans that call and `Predicting(m)` covers validating and
// storing the returned forecast.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::state::{fallback_after, ForecastState};
use crate::config::{ForecastConfig, ForecastRequest};
use crate::error::{FailedAttempt, ForecastError};
use crate::nn::NdarrayBackend;
use crate::predictors::{
    LinearTrendPredictor, MovingAveragePredictor, Predictor, ProgressObserver, SequenceBackend,
    SequenceModelPredictor,
};
use crate::types::{ModelKind, Prediction, PriceSeries, TrainingProgress};

/// Shared read access to the most recent successful prediction.
pub type PredictionSlot = Arc<RwLock<Option<Prediction>>>;

/// Notifications published while a run is in flight.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ForecastEvent {
    Started {
        generation: u64,
        run_id: Uuid,
        model: ModelKind,
        horizon_days: usize,
    },
    Progress {
        generation: u64,
        progress: TrainingProgress,
    },
    State {
        generation: u64,
        state: ForecastState,
    },
    Fallback {
        generation: u64,
        from: ModelKind,
        to: ModelKind,
        reason: String,
    },
    Completed {
        generation: u64,
        prediction: Prediction,
    },
    Failed {
        generation: u64,
        reason: String,
    },
}

/// Invalidates whichever run is currently in flight.
#[derive(Debug, Clone)]
pub struct SupersedeHandle {
    generation: Arc<AtomicU64>,
}

impl SupersedeHandle {
    /// Bump the generation and return the new value.
    pub fn supersede(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// Observer handed to predictors for one run.
struct RunObserver {
    generation: u64,
    counter: Arc<AtomicU64>,
    events: Option<mpsc::UnboundedSender<ForecastEvent>>,
}

impl ProgressObserver for RunObserver {
    fn on_progress(&self, progress: TrainingProgress) {
        if self.is_cancelled() {
            return;
        }
        debug!(
            generation = self.generation,
            model = %progress.model,
            epoch = progress.epoch,
            total = progress.total_epochs,
            "forecast progress"
        );
        if let Some(tx) = &self.events {
            let _ = tx.send(ForecastEvent::Progress {
                generation: self.generation,
                progress,
            });
        }
    }

    fn is_cancelled(&self) -> bool {
        self.counter.load(Ordering::SeqCst) != self.generation
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}

pub struct ForecastOrchestrator {
    series: Option<PriceSeries>,
    predictors: HashMap<ModelKind, Arc<dyn Predictor>>,
    generation: Arc<AtomicU64>,
    state: ForecastState,
    last_prediction: PredictionSlot,
    events: Option<mpsc::UnboundedSender<ForecastEvent>>,
}

impl ForecastOrchestrator {
    /// Orchestrator with the built-in predictors configured from `config`.
    ///
    /// The sequence predictor gets the ndarray backend unless
    /// `enable_sequence_model` is false.
    pub fn new(config: &ForecastConfig) -> Self {
        let backend: Option<Arc<dyn SequenceBackend>> = if config.enable_sequence_model {
            Some(Arc::new(NdarrayBackend))
        } else {
            None
        };
        let pacing = config.progress_pacing();

        let predictors: Vec<Arc<dyn Predictor>> = vec![
            Arc::new(SequenceModelPredictor::new(backend, config.sequence.clone())),
            Arc::new(LinearTrendPredictor::new(pacing)),
            Arc::new(MovingAveragePredictor::new(pacing)),
        ];
        Self::with_predictors(predictors)
    }

    /// Orchestrator over an explicit predictor set; later entries replace
    /// earlier ones of the same kind.
    pub fn with_predictors(predictors: Vec<Arc<dyn Predictor>>) -> Self {
        let mut orchestrator = Self {
            series: None,
            predictors: HashMap::new(),
            generation: Arc::new(AtomicU64::new(0)),
            state: ForecastState::Idle,
            last_prediction: Arc::new(RwLock::new(None)),
            events: None,
        };
        for predictor in predictors {
            orchestrator.register_predictor(predictor);
        }
        orchestrator
    }

    pub fn register_predictor(&mut self, predictor: Arc<dyn Predictor>) {
        self.predictors.insert(predictor.kind(), predictor);
    }

    /// Route events to a new channel and return its receiver. Replaces any
    /// previous subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ForecastEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    /// Replace the price series. Any in-flight run is superseded and the
    /// previous prediction is discarded.
    pub fn set_series(&mut self, series: PriceSeries) {
        let generation = self.supersede_handle().supersede();
        info!(
            symbol = series.symbol(),
            bars = series.len(),
            generation,
            "price series loaded"
        );
        self.series = Some(series);
        *self.last_prediction.write() = None;
        self.transition(ForecastState::Idle);
    }

    pub fn series(&self) -> Option<&PriceSeries> {
        self.series.as_ref()
    }

    pub fn state(&self) -> ForecastState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn last_prediction(&self) -> Option<Prediction> {
        self.last_prediction.read().clone()
    }

    pub fn prediction_slot(&self) -> PredictionSlot {
        Arc::clone(&self.last_prediction)
    }

    pub fn supersede_handle(&self) -> SupersedeHandle {
        SupersedeHandle {
            generation: Arc::clone(&self.generation),
        }
    }

    /// Run one forecast request through the fallback chain.
    ///
    /// # Errors
    /// - `InvalidRequest` for a zero horizon or when no series is loaded
    /// - `Superseded` when a newer generation started before completion
    /// - `PredictionFailed` with every attempt when the chain is exhausted
    pub async fn run(&mut self, request: ForecastRequest) -> Result<Prediction, ForecastError> {
        if request.horizon_days == 0 {
            return Err(ForecastError::InvalidRequest(
                "horizon_days must be at least 1".into(),
            ));
        }
        let Some(series) = self.series.clone() else {
            return Err(ForecastError::InvalidRequest("no price series loaded".into()));
        };

        let generation = self.supersede_handle().supersede();
        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            generation,
            symbol = series.symbol(),
            model = %request.model,
            horizon_days = request.horizon_days,
            "forecast run started"
        );
        self.emit(ForecastEvent::Started {
            generation,
            run_id,
            model: request.model,
            horizon_days: request.horizon_days,
        });
        self.transition(ForecastState::Selecting);

        let mut attempts: Vec<FailedAttempt> = Vec::new();
        let mut next = Some(request.model);

        while let Some(model) = next {
            self.ensure_current(generation)?;
            self.transition(ForecastState::Training(model));

            let outcome = match self.predictors.get(&model).cloned() {
                Some(predictor) => {
                    let observer = RunObserver {
                        generation,
                        counter: Arc::clone(&self.generation),
                        events: self.events.clone(),
                    };
                    predictor
                        .predict(&series, request.horizon_days, &observer)
                        .await
                }
                None => Err(ForecastError::ModelUnavailable(format!(
                    "no {model} predictor registered"
                ))),
            };

            match outcome {
                Ok(prediction) => {
                    self.transition(ForecastState::Predicting(model));
                    self.ensure_current(generation)?;
                    return Ok(self.complete(generation, run_id, prediction));
                }
                Err(ForecastError::Superseded { .. }) => {
                    return Err(self.abandon(generation));
                }
                Err(err) => {
                    let reason = err.to_string();
                    attempts.push(FailedAttempt {
                        model,
                        reason: reason.clone(),
                    });
                    next = fallback_after(model);

                    if let Some(to) = next {
                        warn!(
                            %run_id,
                            generation,
                            from = %model,
                            to = %to,
                            reason = %reason,
                            "predictor failed, falling back"
                        );
                        self.emit(ForecastEvent::Fallback {
                            generation,
                            from: model,
                            to,
                            reason,
                        });
                        self.transition(ForecastState::Selecting);
                    }
                }
            }
        }

        self.transition(ForecastState::Failed);
        let err = ForecastError::PredictionFailed { attempts };
        error!(%run_id, generation, error = %err, "all prediction methods failed");
        self.emit(ForecastEvent::Failed {
            generation,
            reason: err.to_string(),
        });
        Err(err)
    }

    fn complete(&mut self, generation: u64, run_id: Uuid, prediction: Prediction) -> Prediction {
        *self.last_prediction.write() = Some(prediction.clone());
        self.transition(ForecastState::Done(prediction.model));
        info!(
            %run_id,
            generation,
            model = %prediction.model,
            horizon = prediction.horizon(),
            confidence = prediction.confidence,
            "forecast completed"
        );
        self.emit(ForecastEvent::Completed {
            generation,
            prediction: prediction.clone(),
        });
        prediction
    }

    fn ensure_current(&mut self, generation: u64) -> Result<(), ForecastError> {
        if self.generation() == generation {
            return Ok(());
        }
        Err(self.abandon(generation))
    }

    fn abandon(&mut self, generation: u64) -> ForecastError {
        info!(
            generation,
            current = self.generation(),
            "forecast run superseded, result discarded"
        );
        self.transition(ForecastState::Idle);
        ForecastError::Superseded { generation }
    }

    fn transition(&mut self, next: ForecastState) {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "unexpected forecast state transition");
        }
        debug!(from = %self.state, to = %next, "forecast state");
        self.state = next;
        self.emit(ForecastEvent::State {
            generation: self.generation(),
            state: next,
        });
    }

    fn emit(&self, event: ForecastEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SequenceParams;
    use crate::predictors::test_support::series_from_closes;
    use async_trait::async_trait;

    fn quiet_config() -> ForecastConfig {
        ForecastConfig {
            progress_pacing_ms: 0,
            sequence: SequenceParams {
                epochs: 3,
                seed: Some(5),
                ..SequenceParams::default()
            },
            ..ForecastConfig::default()
        }
    }

    fn request(model: ModelKind, days: usize) -> ForecastRequest {
        ForecastRequest::new(model, days).unwrap()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ForecastEvent>) -> Vec<ForecastEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    /// Always fails with the given error.
    struct FailingPredictor {
        kind: ModelKind,
        error: ForecastError,
    }

    #[async_trait]
    impl Predictor for FailingPredictor {
        fn kind(&self) -> ModelKind {
            self.kind
        }

        async fn predict(
            &self,
            _series: &PriceSeries,
            _horizon: usize,
            _observer: &dyn ProgressObserver,
        ) -> Result<Prediction, ForecastError> {
            Err(self.error.clone())
        }
    }

    /// Supersedes its own run, then returns a valid prediction.
    struct SupersedingPredictor {
        handle: SupersedeHandle,
    }

    #[async_trait]
    impl Predictor for SupersedingPredictor {
        fn kind(&self) -> ModelKind {
            ModelKind::Linear
        }

        async fn predict(
            &self,
            series: &PriceSeries,
            horizon: usize,
            observer: &dyn ProgressObserver,
        ) -> Result<Prediction, ForecastError> {
            let inner = LinearTrendPredictor::new(std::time::Duration::ZERO);
            let prediction = inner.predict(series, horizon, observer).await?;
            self.handle.supersede();
            Ok(prediction)
        }
    }

    fn failing(kind: ModelKind, error: ForecastError) -> Arc<dyn Predictor> {
        Arc::new(FailingPredictor { kind, error })
    }

    #[tokio::test]
    async fn short_series_falls_back_to_linear() {
        let mut orch = ForecastOrchestrator::new(&quiet_config());
        let mut rx = orch.subscribe();
        orch.set_series(series_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0]));

        let p = orch.run(request(ModelKind::Sequence, 7)).await.unwrap();
        assert_eq!(p.model, ModelKind::Linear);
        assert_eq!(p.values.len(), 7);
        assert_eq!(orch.state(), ForecastState::Done(ModelKind::Linear));
        assert_eq!(orch.last_prediction(), Some(p.clone()));

        let events = drain(&mut rx);
        let fallback = events
            .iter()
            .find_map(|e| match e {
                ForecastEvent::Fallback { from, to, reason, .. } => Some((*from, *to, reason.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(fallback.0, ModelKind::Sequence);
        assert_eq!(fallback.1, ModelKind::Linear);
        assert!(fallback.2.contains("insufficient data"));
        assert!(matches!(events.last(), Some(ForecastEvent::Completed { .. })));
    }

    fn states(events: &[ForecastEvent]) -> Vec<ForecastState> {
        events
            .iter()
            .filter_map(|e| match e {
                ForecastEvent::State { state, .. } => Some(*state),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn single_bar_lands_on_moving_average() {
        let mut orch = ForecastOrchestrator::new(&quiet_config());
        orch.set_series(series_from_closes(&[42.0]));
        let mut rx = orch.subscribe();

        let p = orch.run(request(ModelKind::Sequence, 3)).await.unwrap();
        assert_eq!(p.model, ModelKind::MovingAverage);
        assert_eq!(p.values, vec![42.0, 42.0, 42.0]);
        assert_eq!(orch.state(), ForecastState::Done(ModelKind::MovingAverage));

        let events = drain(&mut rx);
        let hops: Vec<(ModelKind, ModelKind, String)> = events
            .iter()
            .filter_map(|e| match e {
                ForecastEvent::Fallback { from, to, reason, .. } => Some((*from, *to, reason.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(hops.len(), 2);
        assert_eq!((hops[0].0, hops[0].1), (ModelKind::Sequence, ModelKind::Linear));
        assert_eq!((hops[1].0, hops[1].1), (ModelKind::Linear, ModelKind::MovingAverage));
        assert!(hops.iter().all(|h| h.2.contains("insufficient data")));

        assert_eq!(
            states(&events),
            vec![
                ForecastState::Selecting,
                ForecastState::Training(ModelKind::Sequence),
                ForecastState::Selecting,
                ForecastState::Training(ModelKind::Linear),
                ForecastState::Selecting,
                ForecastState::Training(ModelKind::MovingAverage),
                ForecastState::Predicting(ModelKind::MovingAverage),
                ForecastState::Done(ModelKind::MovingAverage),
            ]
        );
        assert!(matches!(events.last(), Some(ForecastEvent::Completed { .. })));
    }

    #[tokio::test]
    async fn superseded_run_publishes_idle() {
        let mut orch = ForecastOrchestrator::with_predictors(vec![]);
        let handle = orch.supersede_handle();
        orch.register_predictor(Arc::new(SupersedingPredictor { handle }));
        orch.set_series(series_from_closes(&[1.0, 2.0, 3.0]));
        let mut rx = orch.subscribe();

        orch.run(request(ModelKind::Linear, 2)).await.unwrap_err();
        let seen = states(&drain(&mut rx));
        assert_eq!(seen.last(), Some(&ForecastState::Idle));
        assert!(!seen.iter().any(|s| matches!(s, ForecastState::Done(_))));
    }

    #[tokio::test]
    async fn constant_series_falls_back_with_floor_confidence() {
        let mut orch = ForecastOrchestrator::new(&quiet_config());
        orch.set_series(series_from_closes(&[100.0; 30]));

        let p = orch.run(request(ModelKind::Sequence, 10)).await.unwrap();
        assert_eq!(p.model, ModelKind::Linear);
        assert_eq!(p.confidence, 40.0);
    }

    #[tokio::test]
    async fn disabled_sequence_model_still_predicts() {
        let mut cfg = quiet_config();
        cfg.enable_sequence_model = false;
        let mut orch = ForecastOrchestrator::new(&cfg);
        let closes: Vec<f64> = (0..40).map(|i| 50.0 + i as f64).collect();
        orch.set_series(series_from_closes(&closes));

        let p = orch.run(request(ModelKind::Sequence, 5)).await.unwrap();
        assert_eq!(p.model, ModelKind::Linear);
    }

    #[tokio::test]
    async fn sequence_model_runs_end_to_end() {
        let mut orch = ForecastOrchestrator::new(&quiet_config());
        let mut rx = orch.subscribe();
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + (i as f64 * 0.3).sin() * 8.0).collect();
        orch.set_series(series_from_closes(&closes));

        let p = orch.run(request(ModelKind::Sequence, 14)).await.unwrap();
        assert_eq!(p.model, ModelKind::Sequence);

        let epochs: Vec<usize> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                ForecastEvent::Progress { progress, .. } => Some(progress.epoch),
                _ => None,
            })
            .collect();
        assert_eq!(epochs, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn exhausted_chain_reports_every_attempt() {
        let mut orch = ForecastOrchestrator::with_predictors(vec![
            failing(ModelKind::Sequence, ForecastError::ModelUnavailable("off".into())),
            failing(ModelKind::Linear, ForecastError::DegenerateData("flat".into())),
            failing(ModelKind::MovingAverage, ForecastError::Training("boom".into())),
        ]);
        let mut rx = orch.subscribe();
        orch.set_series(series_from_closes(&[1.0, 2.0, 3.0]));

        let err = orch.run(request(ModelKind::Sequence, 3)).await.unwrap_err();
        let attempts = match err {
            ForecastError::PredictionFailed { attempts } => attempts,
            other => panic!("expected PredictionFailed, got {other:?}"),
        };
        let models: Vec<ModelKind> = attempts.iter().map(|a| a.model).collect();
        assert_eq!(
            models,
            vec![ModelKind::Sequence, ModelKind::Linear, ModelKind::MovingAverage]
        );
        assert_eq!(orch.state(), ForecastState::Failed);
        assert!(orch.last_prediction().is_none());

        let events = drain(&mut rx);
        let fallbacks = events
            .iter()
            .filter(|e| matches!(e, ForecastEvent::Fallback { .. }))
            .count();
        assert_eq!(fallbacks, 2);
        assert!(matches!(events.last(), Some(ForecastEvent::Failed { .. })));
    }

    #[tokio::test]
    async fn moving_average_failure_does_not_retry_itself() {
        let mut orch = ForecastOrchestrator::with_predictors(vec![failing(
            ModelKind::MovingAverage,
            ForecastError::Training("boom".into()),
        )]);
        orch.set_series(series_from_closes(&[1.0, 2.0]));

        let err = orch.run(request(ModelKind::MovingAverage, 3)).await.unwrap_err();
        match err {
            ForecastError::PredictionFailed { attempts } => assert_eq!(attempts.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn superseded_run_is_discarded() {
        let mut orch = ForecastOrchestrator::with_predictors(vec![]);
        let handle = orch.supersede_handle();
        orch.register_predictor(Arc::new(SupersedingPredictor { handle }));
        orch.set_series(series_from_closes(&[1.0, 2.0, 3.0, 4.0]));

        let err = orch.run(request(ModelKind::Linear, 3)).await.unwrap_err();
        assert!(matches!(err, ForecastError::Superseded { .. }));
        assert!(orch.last_prediction().is_none());
        assert_eq!(orch.state(), ForecastState::Idle);
    }

    #[tokio::test]
    async fn newer_run_replaces_prediction() {
        let mut orch = ForecastOrchestrator::new(&quiet_config());
        orch.set_series(series_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0]));

        let first = orch.run(request(ModelKind::Linear, 3)).await.unwrap();
        let second = orch.run(request(ModelKind::MovingAverage, 5)).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(orch.last_prediction(), Some(second));
        assert!(orch.generation() >= 3);
    }

    #[tokio::test]
    async fn new_series_clears_prediction() {
        let mut orch = ForecastOrchestrator::new(&quiet_config());
        orch.set_series(series_from_closes(&[1.0, 2.0, 3.0]));
        orch.run(request(ModelKind::Linear, 2)).await.unwrap();
        assert!(orch.last_prediction().is_some());

        let slot = orch.prediction_slot();
        orch.set_series(series_from_closes(&[3.0, 2.0, 1.0]));
        assert!(slot.read().is_none());
        assert_eq!(orch.state(), ForecastState::Idle);
    }

    #[tokio::test]
    async fn missing_series_or_zero_horizon_rejected() {
        let mut orch = ForecastOrchestrator::new(&quiet_config());
        let err = orch.run(request(ModelKind::Linear, 3)).await.unwrap_err();
        assert!(matches!(err, ForecastError::InvalidRequest(_)));

        orch.set_series(series_from_closes(&[1.0, 2.0]));
        let zero = ForecastRequest {
            model: ModelKind::Linear,
            horizon_days: 0,
        };
        assert!(matches!(
            orch.run(zero).await,
            Err(ForecastError::InvalidRequest(_))
        ));
    }
}
