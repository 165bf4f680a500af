// =============================================================================
// Aurora Forecast — price analytics and multi-model forecasting core
// =============================================================================
//
// Leaf-first module map:
//
//   types / error   shared data model and error kinds
//   indicators      SMA, EMA, RSI, MACD and the display snapshot
//   confidence      volatility, trend consistency, R², clip
//   nn              ndarray LSTM network behind the sequence backend seam
//   predictors      Predictor contract and its three strategies
//   forecast        fallback state machine and the orchestrator
//   config          JSON configuration with serde defaults
//   synthetic       random-walk demo series

pub mod config;
pub mod confidence;
pub mod error;
pub mod forecast;
pub mod indicators;
pub mod nn;
pub mod predictors;
pub mod synthetic;
pub mod types;

pub use config::{ForecastConfig, ForecastRequest, SequenceParams};
pub use error::{FailedAttempt, ForecastError};
pub use forecast::{ForecastEvent, ForecastOrchestrator, ForecastState, SupersedeHandle};
pub use indicators::IndicatorSnapshot;
pub use types::{Checkpoint, ModelKind, Prediction, PriceBar, PriceSeries, TrainingProgress};
