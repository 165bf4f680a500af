//! Adam optimizer (Adaptive Moment Estimation)
//!
//! One [`AdamSlot`] per parameter tensor keeps the first and second moment
//! estimates; the shared step counter lives in [`Adam`].

use ndarray::{Array, Dimension, Zip};

#[derive(Debug, Clone)]
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    t: i32,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            t: 0,
        }
    }

    /// Advance the step counter; call once per mini-batch before updating slots.
    pub fn begin_step(&mut self) {
        self.t = self.t.saturating_add(1);
    }

    pub fn steps(&self) -> i32 {
        self.t
    }

    /// Apply one bias-corrected Adam update to `param`.
    pub fn update<D: Dimension>(
        &self,
        slot: &mut AdamSlot<D>,
        param: &mut Array<f64, D>,
        grad: &Array<f64, D>,
    ) {
        let (b1, b2) = (self.beta1, self.beta2);
        let t = self.t.max(1);
        let bias1 = 1.0 - b1.powi(t);
        let bias2 = 1.0 - b2.powi(t);
        let (lr, eps) = (self.learning_rate, self.epsilon);

        Zip::from(param)
            .and(&mut slot.m)
            .and(&mut slot.v)
            .and(grad)
            .for_each(|p, m, v, &g| {
                *m = b1 * *m + (1.0 - b1) * g;
                *v = b2 * *v + (1.0 - b2) * g * g;
                let m_hat = *m / bias1;
                let v_hat = *v / bias2;
                *p -= lr * m_hat / (v_hat.sqrt() + eps);
            });
    }
}

/// Moment estimates for one parameter tensor.
#[derive(Debug, Clone)]
pub struct AdamSlot<D: Dimension> {
    m: Array<f64, D>,
    v: Array<f64, D>,
}

impl<D: Dimension> AdamSlot<D> {
    pub fn like(param: &Array<f64, D>) -> Self {
        Self {
            m: Array::zeros(param.raw_dim()),
            v: Array::zeros(param.raw_dim()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    #[test]
    fn first_step_moves_by_learning_rate() {
        // With bias correction the first update is lr * sign(g).
        let mut adam = Adam::new(0.1);
        let mut p: Array1<f64> = array![1.0, -1.0];
        let mut slot = AdamSlot::like(&p);
        adam.begin_step();
        adam.update(&mut slot, &mut p, &array![2.0, -0.5]);
        assert!((p[0] - 0.9).abs() < 1e-6);
        assert!((p[1] + 0.9).abs() < 1e-6);
    }

    #[test]
    fn minimises_quadratic() {
        // f(x) = (x - 3)^2
        let mut adam = Adam::new(0.1);
        let mut x: Array1<f64> = array![0.0];
        let mut slot = AdamSlot::like(&x);
        for _ in 0..500 {
            adam.begin_step();
            let grad = x.mapv(|v| 2.0 * (v - 3.0));
            adam.update(&mut slot, &mut x, &grad);
        }
        assert!((x[0] - 3.0).abs() < 5e-2, "x = {}", x[0]);
        assert_eq!(adam.steps(), 500);
    }
}
