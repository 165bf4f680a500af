//! Dense (fully connected) layer
//!
//! `output = activation(W · input + b)` for a single sample vector, with the
//! pre-activation returned from `forward` so the caller can hand it back to
//! `backward` without the layer caching anything.

use ndarray::{Array1, Array2};
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Linear,
    Relu,
}

impl Activation {
    fn apply(self, z: f64) -> f64 {
        match self {
            Self::Linear => z,
            Self::Relu => z.max(0.0),
        }
    }

    fn derivative(self, z: f64) -> f64 {
        match self {
            Self::Linear => 1.0,
            Self::Relu => {
                if z > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dense {
    /// Weight matrix (output_size x input_size)
    pub weights: Array2<f64>,
    pub biases: Array1<f64>,
    pub activation: Activation,
}

/// Accumulated gradients for one [`Dense`] layer.
#[derive(Debug, Clone)]
pub struct DenseGrads {
    pub weights: Array2<f64>,
    pub biases: Array1<f64>,
}

impl Dense {
    /// Glorot-uniform weights, zero biases.
    pub fn new<R: Rng>(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let limit = (6.0 / (input_size + output_size) as f64).sqrt();
        let weights =
            Array2::from_shape_fn((output_size, input_size), |_| rng.random_range(-limit..limit));

        Self {
            weights,
            biases: Array1::zeros(output_size),
            activation,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.ncols()
    }

    pub fn output_size(&self) -> usize {
        self.weights.nrows()
    }

    /// Returns `(pre_activation, output)`.
    pub fn forward(&self, input: &Array1<f64>) -> (Array1<f64>, Array1<f64>) {
        let z = self.weights.dot(input) + &self.biases;
        let activation = self.activation;
        let out = z.mapv(|v| activation.apply(v));
        (z, out)
    }

    /// Accumulate parameter gradients into `grads` and return dL/d(input).
    pub fn backward(
        &self,
        input: &Array1<f64>,
        pre_activation: &Array1<f64>,
        d_output: &Array1<f64>,
        grads: &mut DenseGrads,
    ) -> Array1<f64> {
        let activation = self.activation;
        let delta: Array1<f64> = d_output
            .iter()
            .zip(pre_activation.iter())
            .map(|(&d, &z)| d * activation.derivative(z))
            .collect();

        grads.weights += &outer(&delta, input);
        grads.biases += &delta;

        self.weights.t().dot(&delta)
    }

    pub fn zero_grads(&self) -> DenseGrads {
        DenseGrads {
            weights: Array2::zeros(self.weights.raw_dim()),
            biases: Array1::zeros(self.biases.len()),
        }
    }
}

/// Outer product `a ⊗ b` as an (a.len() x b.len()) matrix.
pub(crate) fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    Array2::from_shape_fn((a.len(), b.len()), |(i, j)| a[i] * b[j])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn shapes_and_glorot_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let layer = Dense::new(20, 10, Activation::Relu, &mut rng);
        assert_eq!(layer.weights.dim(), (10, 20));
        assert_eq!(layer.input_size(), 20);
        assert_eq!(layer.output_size(), 10);
        let limit = (6.0_f64 / 30.0).sqrt();
        assert!(layer.weights.iter().all(|w| w.abs() <= limit));
    }

    #[test]
    fn relu_zeroes_negative_outputs() {
        let layer = Dense {
            weights: array![[1.0, 0.0], [-1.0, 0.0]],
            biases: array![0.0, 0.0],
            activation: Activation::Relu,
        };
        let (z, out) = layer.forward(&array![2.0, 5.0]);
        assert_eq!(z, array![2.0, -2.0]);
        assert_eq!(out, array![2.0, 0.0]);
    }

    #[test]
    fn backward_linear_layer() {
        let layer = Dense {
            weights: array![[2.0, 3.0]],
            biases: array![1.0],
            activation: Activation::Linear,
        };
        let input = array![1.0, -1.0];
        let (z, _) = layer.forward(&input);
        let mut grads = layer.zero_grads();
        let d_input = layer.backward(&input, &z, &array![0.5], &mut grads);
        assert_eq!(grads.weights, array![[0.5, -0.5]]);
        assert_eq!(grads.biases, array![0.5]);
        assert_eq!(d_input, array![1.0, 1.5]);
    }
}
