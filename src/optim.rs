//! Optimizers for the design coefficients
//!
//! A closed set of strategies resolved once at configuration time. Both
//! operate on the flat coefficient vector in the design's documented layout;
//! the projection step that follows them lives in `design`.

use serde::{Deserialize, Serialize};

use crate::error::{FpmError, Result};

/// Optimizer with its persistent state (checkpointed alongside the design)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Optimizer {
    /// Plain gradient descent: p -= lr * g
    Sgd { lr: f64 },
    /// Adam with bias correction
    Adam {
        lr: f64,
        beta1: f64,
        beta2: f64,
        eps: f64,
        m: Vec<f64>,
        v: Vec<f64>,
        t: u64,
    },
}

impl Optimizer {
    pub fn sgd(lr: f64) -> Self {
        Optimizer::Sgd { lr }
    }

    /// Adam with the conventional defaults (beta1=0.9, beta2=0.999, eps=1e-8)
    pub fn adam(lr: f64, n_params: usize) -> Self {
        Optimizer::Adam {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            m: vec![0.0; n_params],
            v: vec![0.0; n_params],
            t: 0,
        }
    }

    /// Resolve a configuration tag, failing fast on unknown names
    pub fn from_tag(tag: &str, lr: f64, n_params: usize) -> Result<Self> {
        match tag {
            "sgd" => Ok(Self::sgd(lr)),
            "adam" => Ok(Self::adam(lr, n_params)),
            other => Err(FpmError::InvalidConfiguration(format!(
                "unsupported optimizer '{other}' (expected adam or sgd)"
            ))),
        }
    }

    /// Apply one update step to the parameters
    pub fn step(&mut self, params: &mut [f64], grads: &[f64]) -> Result<()> {
        if params.len() != grads.len() {
            return Err(FpmError::ShapeMismatch {
                what: "optimizer gradients".into(),
                expected: params.len(),
                got: grads.len(),
            });
        }
        if grads.iter().any(|g| !g.is_finite()) {
            return Err(FpmError::NumericalInstability {
                context: "optimizer gradients".into(),
            });
        }

        match self {
            Optimizer::Sgd { lr } => {
                for (p, &g) in params.iter_mut().zip(grads.iter()) {
                    *p -= *lr * g;
                }
            }
            Optimizer::Adam {
                lr,
                beta1,
                beta2,
                eps,
                m,
                v,
                t,
            } => {
                if m.len() != params.len() {
                    return Err(FpmError::ShapeMismatch {
                        what: "optimizer state".into(),
                        expected: params.len(),
                        got: m.len(),
                    });
                }
                *t += 1;
                let bc1 = 1.0 - beta1.powi(*t as i32);
                let bc2 = 1.0 - beta2.powi(*t as i32);
                for i in 0..params.len() {
                    m[i] = *beta1 * m[i] + (1.0 - *beta1) * grads[i];
                    v[i] = *beta2 * v[i] + (1.0 - *beta2) * grads[i] * grads[i];
                    let m_hat = m[i] / bc1;
                    let v_hat = v[i] / bc2;
                    params[i] -= *lr * m_hat / (v_hat.sqrt() + *eps);
                }
            }
        }
        Ok(())
    }
}
