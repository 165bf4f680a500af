//! LSTM layer (Long Short-Term Memory) with backpropagation through time
//!
//! Gate pre-activations are packed into one `4H` vector in the order
//! input, forget, cell candidate, output:
//!
//!   z = W · x_t + U · h_{t-1} + b
//!   i = σ(z_i)   f = σ(z_f)   g = tanh(z_g)   o = σ(z_o)
//!   c_t = f ⊙ c_{t-1} + i ⊙ g
//!   h_t = o ⊙ tanh(c_t)
//!
//! `forward` returns a [`LstmTrace`] holding every step's activations; the
//! same trace is consumed by `backward`.

use ndarray::{s, Array1, Array2};
use rand::Rng;

use super::dense::outer;

#[derive(Debug, Clone)]
pub struct Lstm {
    pub input_size: usize,
    pub hidden_size: usize,
    /// Input kernel (4H x input_size)
    pub w: Array2<f64>,
    /// Recurrent kernel (4H x H)
    pub u: Array2<f64>,
    /// Gate biases (4H); forget slice initialised to 1
    pub b: Array1<f64>,
}

/// Activations of one time step.
#[derive(Debug, Clone)]
pub struct LstmStep {
    x: Array1<f64>,
    h_prev: Array1<f64>,
    c_prev: Array1<f64>,
    i: Array1<f64>,
    f: Array1<f64>,
    g: Array1<f64>,
    o: Array1<f64>,
    c: Array1<f64>,
}

/// Full unrolled forward pass over one sequence.
#[derive(Debug, Clone)]
pub struct LstmTrace {
    steps: Vec<LstmStep>,
    last_hidden: Array1<f64>,
}

impl LstmTrace {
    pub fn last_hidden(&self) -> &Array1<f64> {
        &self.last_hidden
    }
}

#[derive(Debug, Clone)]
pub struct LstmGrads {
    pub w: Array2<f64>,
    pub u: Array2<f64>,
    pub b: Array1<f64>,
}

impl Lstm {
    pub fn new<R: Rng>(input_size: usize, hidden_size: usize, rng: &mut R) -> Self {
        let gates = 4 * hidden_size;
        let w_limit = (6.0 / (input_size + gates) as f64).sqrt();
        let u_limit = (6.0 / (hidden_size + gates) as f64).sqrt();

        let w = Array2::from_shape_fn((gates, input_size), |_| rng.random_range(-w_limit..w_limit));
        let u = Array2::from_shape_fn((gates, hidden_size), |_| rng.random_range(-u_limit..u_limit));

        let mut b: Array1<f64> = Array1::zeros(gates);
        b.slice_mut(s![hidden_size..2 * hidden_size]).fill(1.0);

        Self {
            input_size,
            hidden_size,
            w,
            u,
            b,
        }
    }

    pub fn forward(&self, inputs: &[Array1<f64>]) -> LstmTrace {
        let h_size = self.hidden_size;
        let mut h: Array1<f64> = Array1::zeros(h_size);
        let mut c: Array1<f64> = Array1::zeros(h_size);
        let mut steps = Vec::with_capacity(inputs.len());

        for x in inputs {
            let z = self.w.dot(x) + self.u.dot(&h) + &self.b;

            let i = z.slice(s![0..h_size]).mapv(sigmoid);
            let f = z.slice(s![h_size..2 * h_size]).mapv(sigmoid);
            let g = z.slice(s![2 * h_size..3 * h_size]).mapv(f64::tanh);
            let o = z.slice(s![3 * h_size..4 * h_size]).mapv(sigmoid);

            let c_next = &f * &c + &i * &g;
            let h_next = &o * &c_next.mapv(f64::tanh);

            steps.push(LstmStep {
                x: x.clone(),
                h_prev: h,
                c_prev: c,
                i,
                f,
                g,
                o,
                c: c_next.clone(),
            });

            h = h_next;
            c = c_next;
        }

        LstmTrace {
            steps,
            last_hidden: h,
        }
    }

    /// Backpropagate dL/dh_T through every step of `trace`, accumulating
    /// parameter gradients into `grads`.
    pub fn backward(&self, trace: &LstmTrace, d_last_hidden: &Array1<f64>, grads: &mut LstmGrads) {
        let h_size = self.hidden_size;
        let mut dh = d_last_hidden.clone();
        let mut dc_next: Array1<f64> = Array1::zeros(h_size);

        for step in trace.steps.iter().rev() {
            let tanh_c = step.c.mapv(f64::tanh);

            let d_o = &dh * &tanh_c;
            let dc = &dc_next + &(&dh * &step.o * &tanh_c.mapv(|t| 1.0 - t * t));

            let d_f = &dc * &step.c_prev;
            let d_i = &dc * &step.g;
            let d_g = &dc * &step.i;

            let mut dz: Array1<f64> = Array1::zeros(4 * h_size);
            dz.slice_mut(s![0..h_size])
                .assign(&(&d_i * &step.i.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![h_size..2 * h_size])
                .assign(&(&d_f * &step.f.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![2 * h_size..3 * h_size])
                .assign(&(&d_g * &step.g.mapv(|v| 1.0 - v * v)));
            dz.slice_mut(s![3 * h_size..4 * h_size])
                .assign(&(&d_o * &step.o.mapv(|v| v * (1.0 - v))));

            grads.w += &outer(&dz, &step.x);
            grads.u += &outer(&dz, &step.h_prev);
            grads.b += &dz;

            dh = self.u.t().dot(&dz);
            dc_next = &dc * &step.f;
        }
    }

    pub fn zero_grads(&self) -> LstmGrads {
        LstmGrads {
            w: Array2::zeros(self.w.raw_dim()),
            u: Array2::zeros(self.u.raw_dim()),
            b: Array1::zeros(self.b.len()),
        }
    }
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}
