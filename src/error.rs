// =============================================================================
// Forecasting error kinds
// =============================================================================
//
// Indicator functions never return these: they fall back to neutral values.
// Predictors fail with one of the recoverable kinds, which the orchestrator
// turns into the next fallback step. A forecast run surfaces only
// `InvalidRequest` (rejected up front), `PredictionFailed` (chain exhausted)
// and `Superseded` (stale run).

use thiserror::Error;

use crate::types::ModelKind;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    /// Series shorter than the predictor's minimum.
    #[error("insufficient data: need at least {required} prices, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// Zero price range or zero variance where a ratio is required.
    #[error("degenerate data: {0}")]
    DegenerateData(String),

    /// The numeric backend required by the model is not installed.
    #[error("model backend unavailable: {0}")]
    ModelUnavailable(String),

    /// Generic failure while fitting or evaluating a model.
    #[error("training failed: {0}")]
    Training(String),

    /// Malformed price history (ordering, duplicates, negative values).
    #[error("invalid price series: {0}")]
    InvalidSeries(String),

    /// Malformed forecast request (e.g. zero horizon).
    #[error("invalid forecast request: {0}")]
    InvalidRequest(String),

    /// A newer request invalidated this run; its result was discarded.
    #[error("forecast run {generation} superseded by a newer request")]
    Superseded { generation: u64 },

    /// Every predictor in the fallback chain failed.
    #[error("all prediction methods failed ({})", summarize(.attempts))]
    PredictionFailed { attempts: Vec<FailedAttempt> },
}

/// One failed step of the fallback chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedAttempt {
    pub model: ModelKind,
    pub reason: String,
}

fn summarize(attempts: &[FailedAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.model, a.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_failed_lists_every_attempt() {
        let err = ForecastError::PredictionFailed {
            attempts: vec![
                FailedAttempt {
                    model: ModelKind::Linear,
                    reason: "boom".into(),
                },
                FailedAttempt {
                    model: ModelKind::MovingAverage,
                    reason: "bust".into(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("linear: boom"));
        assert!(msg.contains("moving_average: bust"));
    }

    #[test]
    fn insufficient_data_message() {
        let err = ForecastError::InsufficientData {
            required: 15,
            actual: 5,
        };
        assert_eq!(err.to_string(), "insufficient data: need at least 15 prices, got 5");
    }
}
