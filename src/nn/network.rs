//! Recurrent forecaster: LSTM → Dense(ReLU) → Dense(linear, 1)
//!
//! Trained one mini-batch at a time with a mean-squared-error objective and
//! Adam. Implements the `SequenceModel` seam so the sequence predictor never
//! depends on ndarray directly.

use ndarray::{Array1, Ix1, Ix2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use super::adam::{Adam, AdamSlot};
use super::dense::{Activation, Dense, DenseGrads};
use super::lstm::{Lstm, LstmGrads};
use crate::error::ForecastError;
use crate::predictors::backend::{SequenceBackend, SequenceModel, SequenceModelSpec};

/// Optimizer state for every parameter tensor of the network.
struct OptimizerState {
    adam: Adam,
    lstm_w: AdamSlot<Ix2>,
    lstm_u: AdamSlot<Ix2>,
    lstm_b: AdamSlot<Ix1>,
    hidden_w: AdamSlot<Ix2>,
    hidden_b: AdamSlot<Ix1>,
    output_w: AdamSlot<Ix2>,
    output_b: AdamSlot<Ix1>,
}

struct Gradients {
    lstm: LstmGrads,
    hidden: DenseGrads,
    output: DenseGrads,
}

pub struct SequenceNetwork {
    sequence_length: usize,
    lstm: Lstm,
    hidden: Dense,
    output: Dense,
    optimizer: OptimizerState,
}

impl SequenceNetwork {
    pub fn new(spec: &SequenceModelSpec) -> Result<Self, ForecastError> {
        if spec.sequence_length == 0 || spec.hidden_units == 0 || spec.dense_units == 0 {
            return Err(ForecastError::Training(format!(
                "invalid network shape: sequence {} / hidden {} / dense {}",
                spec.sequence_length, spec.hidden_units, spec.dense_units
            )));
        }
        if !(spec.learning_rate.is_finite() && spec.learning_rate > 0.0) {
            return Err(ForecastError::Training(format!(
                "invalid learning rate {}",
                spec.learning_rate
            )));
        }

        let mut rng = match spec.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let lstm = Lstm::new(1, spec.hidden_units, &mut rng);
        let hidden = Dense::new(spec.hidden_units, spec.dense_units, Activation::Relu, &mut rng);
        let output = Dense::new(spec.dense_units, 1, Activation::Linear, &mut rng);

        let optimizer = OptimizerState {
            adam: Adam::new(spec.learning_rate),
            lstm_w: AdamSlot::like(&lstm.w),
            lstm_u: AdamSlot::like(&lstm.u),
            lstm_b: AdamSlot::like(&lstm.b),
            hidden_w: AdamSlot::like(&hidden.weights),
            hidden_b: AdamSlot::like(&hidden.biases),
            output_w: AdamSlot::like(&output.weights),
            output_b: AdamSlot::like(&output.biases),
        };

        debug!(
            sequence_length = spec.sequence_length,
            hidden_units = spec.hidden_units,
            dense_units = spec.dense_units,
            learning_rate = spec.learning_rate,
            "sequence network built"
        );

        Ok(Self {
            sequence_length: spec.sequence_length,
            lstm,
            hidden,
            output,
            optimizer,
        })
    }

    fn check_window(&self, window: &[f64]) -> Result<(), ForecastError> {
        if window.len() != self.sequence_length {
            return Err(ForecastError::Training(format!(
                "window length {} does not match sequence length {}",
                window.len(),
                self.sequence_length
            )));
        }
        Ok(())
    }

    fn forward_value(&self, window: &[f64]) -> f64 {
        let inputs = to_inputs(window);
        let trace = self.lstm.forward(&inputs);
        let (_, hidden_out) = self.hidden.forward(trace.last_hidden());
        let (_, out) = self.output.forward(&hidden_out);
        out[0]
    }

    /// Batch MSE and its gradients with respect to every parameter.
    fn loss_and_gradients(&self, windows: &[&[f64]], targets: &[f64]) -> (f64, Gradients) {
        let mut grads = Gradients {
            lstm: self.lstm.zero_grads(),
            hidden: self.hidden.zero_grads(),
            output: self.output.zero_grads(),
        };

        let batch = windows.len() as f64;
        let mut loss = 0.0;

        for (window, &target) in windows.iter().zip(targets) {
            let inputs = to_inputs(window);
            let trace = self.lstm.forward(&inputs);
            let h_last = trace.last_hidden();
            let (hidden_pre, hidden_out) = self.hidden.forward(h_last);
            let (output_pre, out) = self.output.forward(&hidden_out);

            let err = out[0] - target;
            loss += err * err / batch;

            let d_out = Array1::from_elem(1, 2.0 * err / batch);
            let d_hidden_out = self
                .output
                .backward(&hidden_out, &output_pre, &d_out, &mut grads.output);
            let d_h_last = self
                .hidden
                .backward(h_last, &hidden_pre, &d_hidden_out, &mut grads.hidden);
            self.lstm.backward(&trace, &d_h_last, &mut grads.lstm);
        }

        (loss, grads)
    }

    fn apply_gradients(&mut self, grads: &Gradients) {
        let opt = &mut self.optimizer;
        opt.adam.begin_step();
        opt.adam.update(&mut opt.lstm_w, &mut self.lstm.w, &grads.lstm.w);
        opt.adam.update(&mut opt.lstm_u, &mut self.lstm.u, &grads.lstm.u);
        opt.adam.update(&mut opt.lstm_b, &mut self.lstm.b, &grads.lstm.b);
        opt.adam
            .update(&mut opt.hidden_w, &mut self.hidden.weights, &grads.hidden.weights);
        opt.adam
            .update(&mut opt.hidden_b, &mut self.hidden.biases, &grads.hidden.biases);
        opt.adam
            .update(&mut opt.output_w, &mut self.output.weights, &grads.output.weights);
        opt.adam
            .update(&mut opt.output_b, &mut self.output.biases, &grads.output.biases);
    }
}

impl SequenceModel for SequenceNetwork {
    fn train_batch(&mut self, windows: &[&[f64]], targets: &[f64]) -> Result<f64, ForecastError> {
        if windows.is_empty() || windows.len() != targets.len() {
            return Err(ForecastError::Training(format!(
                "batch has {} windows and {} targets",
                windows.len(),
                targets.len()
            )));
        }
        for window in windows {
            self.check_window(window)?;
        }

        let (loss, grads) = self.loss_and_gradients(windows, targets);
        if !loss.is_finite() {
            return Err(ForecastError::Training(format!("non-finite batch loss {loss}")));
        }

        self.apply_gradients(&grads);
        Ok(loss)
    }

    fn predict_next(&self, window: &[f64]) -> Result<f64, ForecastError> {
        self.check_window(window)?;
        let value = self.forward_value(window);
        if !value.is_finite() {
            return Err(ForecastError::Training(format!("non-finite model output {value}")));
        }
        Ok(value)
    }
}

fn to_inputs(window: &[f64]) -> Vec<Array1<f64>> {
    window.iter().map(|&v| Array1::from_elem(1, v)).collect()
}

// =============================================================================
// Backend
// =============================================================================

/// Built-in CPU backend using ndarray.
#[derive(Debug, Clone, Copy, Default)]
pub struct NdarrayBackend;

impl SequenceBackend for NdarrayBackend {
    fn name(&self) -> &str {
        "ndarray-lstm"
    }

    fn build(&self, spec: &SequenceModelSpec) -> Result<Box<dyn SequenceModel>, ForecastError> {
        Ok(Box::new(SequenceNetwork::new(spec)?))
    }
}
