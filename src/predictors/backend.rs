// =============================================================================
// Sequence backend seam
// =============================================================================
//
// The sequence predictor drives training (epochs, batching, shuffling,
// progress) but never touches tensors directly. A backend builds a model from
// a `SequenceModelSpec`; the model only has to fit one mini-batch at a time
// and predict the next value of a window. Swapping the hand-rolled ndarray
// network for another numeric library means implementing these two traits.

use crate::error::ForecastError;

/// Architecture and optimizer settings for a sequence model.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceModelSpec {
    /// Number of past values fed to the model.
    pub sequence_length: usize,
    /// Units in the recurrent layer.
    pub hidden_units: usize,
    /// Units in the dense ReLU layer after the recurrent layer.
    pub dense_units: usize,
    pub learning_rate: f64,
    /// Seed for weight initialisation; `None` draws from the OS.
    pub seed: Option<u64>,
}

/// A trainable one-step-ahead sequence model.
pub trait SequenceModel: Send {
    /// Take one optimizer step on a mini-batch and return its MSE before the
    /// update. Every window must have `sequence_length` elements.
    fn train_batch(&mut self, windows: &[&[f64]], targets: &[f64]) -> Result<f64, ForecastError>;

    /// Predict the value that follows `window`.
    fn predict_next(&self, window: &[f64]) -> Result<f64, ForecastError>;

    /// Mean squared error over a set of samples without updating weights.
    fn evaluate(&self, windows: &[&[f64]], targets: &[f64]) -> Result<f64, ForecastError> {
        if windows.is_empty() {
            return Ok(0.0);
        }
        let mut total = 0.0;
        for (window, target) in windows.iter().zip(targets) {
            let err = self.predict_next(window)? - target;
            total += err * err;
        }
        Ok(total / windows.len() as f64)
    }
}

/// Factory for [`SequenceModel`]s.
pub trait SequenceBackend: Send + Sync {
    fn name(&self) -> &str;

    fn build(&self, spec: &SequenceModelSpec) -> Result<Box<dyn SequenceModel>, ForecastError>;
}
