// =============================================================================
// Forecast run state machine
// =============================================================================
//
//   Idle -> Selecting -> Training(m) -> Predicting(m) -> Done(m)
//                  ^          |
//                  |          v  (predictor failed, fallback exists)
//                  +------ Selecting
//                             |
//                             v  (no fallback left)
//                           Failed
//
// The fallback chain itself is a pure function of the model that failed.

use serde::Serialize;

use crate::types::ModelKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "model", rename_all = "snake_case")]
pub enum ForecastState {
    Idle,
    Selecting,
    Training(ModelKind),
    Predicting(ModelKind),
    Done(ModelKind),
    Failed,
}

impl Default for ForecastState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for ForecastState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Selecting => write!(f, "selecting"),
            Self::Training(m) => write!(f, "training({m})"),
            Self::Predicting(m) => write!(f, "predicting({m})"),
            Self::Done(m) => write!(f, "done({m})"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl ForecastState {
    /// Whether a run is between `Selecting` and a terminal state.
    pub fn is_running(self) -> bool {
        matches!(
            self,
            Self::Selecting | Self::Training(_) | Self::Predicting(_)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done(_) | Self::Failed)
    }

    /// Legal edges of the run graph. Any state may return to `Idle` when a run
    /// is abandoned, and a new run may start from any non-running state.
    pub fn can_transition_to(self, next: ForecastState) -> bool {
        use ForecastState::*;
        match (self, next) {
            (_, Idle) => true,
            (Idle | Done(_) | Failed, Selecting) => true,
            (Selecting, Training(_)) => true,
            (Selecting, Failed) => true,
            (Training(a), Predicting(b)) => a == b,
            (Training(_), Selecting) => true,
            (Training(_), Failed) => true,
            (Predicting(a), Done(b)) => a == b,
            _ => false,
        }
    }
}

/// Next model to try after `failed`, or `None` when the chain is exhausted.
///
/// Sequence -> Linear -> MovingAverage -> (none)
pub fn fallback_after(failed: ModelKind) -> Option<ModelKind> {
    match failed {
        ModelKind::Sequence => Some(ModelKind::Linear),
        ModelKind::Linear => Some(ModelKind::MovingAverage),
        ModelKind::MovingAverage => None,
    }
}

/// Full list of models a request starting at `first` may try, in order.
pub fn fallback_chain(first: ModelKind) -> Vec<ModelKind> {
    std::iter::successors(Some(first), |m| fallback_after(*m)).collect()
}
