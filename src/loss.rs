//! Training losses over complex fields
//!
//! A closed set of data-comparison strategies, resolved once at
//! configuration time. Each loss provides its value and the cotangent
//! ∂L/∂Re(x) + i·∂L/∂Im(x) that seeds the unrolled network's reverse pass.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{FpmError, Result};
use crate::fft::wrap_angle;

/// Supported data-comparison losses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Loss {
    /// Full-complex mean squared error
    Complex,
    /// Amplitude-only MSE: insensitive to phase
    Amplitude,
    /// Wrapped-phase MSE: insensitive to amplitude
    Phase,
}

impl FromStr for Loss {
    type Err = FpmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "complex" | "mse" => Ok(Loss::Complex),
            "abs" | "amplitude" => Ok(Loss::Amplitude),
            "phase" => Ok(Loss::Phase),
            other => Err(FpmError::InvalidConfiguration(format!(
                "unsupported loss '{other}' (expected complex, abs, or phase)"
            ))),
        }
    }
}

impl Loss {
    fn check(x: &[Complex64], target: &[Complex64]) -> Result<()> {
        if x.len() != target.len() {
            return Err(FpmError::ShapeMismatch {
                what: "loss target".into(),
                expected: x.len(),
                got: target.len(),
            });
        }
        Ok(())
    }

    /// Loss value, normalized by the pixel count
    pub fn value(&self, x: &[Complex64], target: &[Complex64]) -> Result<f64> {
        Self::check(x, target)?;
        let n = x.len() as f64;

        let total: f64 = match self {
            Loss::Complex => x
                .iter()
                .zip(target.iter())
                .map(|(&a, &t)| (a - t).norm_sqr())
                .sum(),
            Loss::Amplitude => x
                .iter()
                .zip(target.iter())
                .map(|(&a, &t)| {
                    let d = a.norm() - t.norm();
                    d * d
                })
                .sum(),
            Loss::Phase => x
                .iter()
                .zip(target.iter())
                .map(|(&a, &t)| {
                    let d = wrap_angle(a.arg() - t.arg());
                    d * d
                })
                .sum(),
        };

        if !total.is_finite() {
            return Err(FpmError::NumericalInstability {
                context: "loss value".into(),
            });
        }
        Ok(total / n)
    }

    /// Cotangent ∂L/∂Re(x) + i·∂L/∂Im(x), same shape as `x`
    pub fn cotangent(&self, x: &[Complex64], target: &[Complex64]) -> Result<Vec<Complex64>> {
        Self::check(x, target)?;
        let n = x.len() as f64;
        let scale = 2.0 / n;

        let cot: Vec<Complex64> = match self {
            Loss::Complex => x
                .iter()
                .zip(target.iter())
                .map(|(&a, &t)| scale * (a - t))
                .collect(),
            Loss::Amplitude => x
                .iter()
                .zip(target.iter())
                .map(|(&a, &t)| {
                    let r = a.norm();
                    if r > 0.0 {
                        scale * (r - t.norm()) * (a / r)
                    } else {
                        Complex64::new(0.0, 0.0)
                    }
                })
                .collect(),
            Loss::Phase => x
                .iter()
                .zip(target.iter())
                .map(|(&a, &t)| {
                    let r2 = a.norm_sqr();
                    if r2 > 0.0 {
                        // d(arg)/d(re, im) = (-im, re) / |x|^2
                        let d = wrap_angle(a.arg() - t.arg());
                        scale * d * Complex64::new(-a.im, a.re) / r2
                    } else {
                        Complex64::new(0.0, 0.0)
                    }
                })
                .collect(),
        };

        if !crate::kernels::complex::all_finite(&cot) {
            return Err(FpmError::NumericalInstability {
                context: "loss cotangent".into(),
            });
        }
        Ok(cot)
    }
}
