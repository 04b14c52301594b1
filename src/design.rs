//! Learnable illumination design coefficients and their projection
//!
//! The "experiment design" is one group of `num_meas` weights per unrolled
//! layer, learned independently per layer, split into a brightfield subset
//! (indices `0..num_bf`) and a darkfield subset (`num_bf..num_meas`).
//!
//! Projection maps an unconstrained optimizer update back onto the feasible
//! set: every coefficient is clamped to be non-negative, and when a group
//! budget is configured the brightfield (resp. darkfield) weights of each
//! layer are scaled down so their sum does not exceed it. Scale-down-only
//! keeps the operator idempotent. Projection runs after each optimizer step,
//! never inside the forward/backward pass.
//!
//! Layout is stable and documented for checkpoint and visualization
//! consumers: layer-major, measurement-index order
//! (`flat[k * num_meas + m]` is layer k, measurement m).

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{FpmError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Design {
    num_layers: usize,
    num_meas: usize,
    num_bf: usize,
    num_df: usize,
    /// Optional upper bound on the per-layer brightfield weight sum
    bf_budget: Option<f64>,
    /// Optional upper bound on the per-layer darkfield weight sum
    df_budget: Option<f64>,
    /// Layer-major coefficients, length num_layers * num_meas
    coeffs: Vec<f64>,
}

impl Design {
    /// Create a design with uniform coefficients 1/num_meas per layer
    pub fn new(num_layers: usize, num_meas: usize, num_bf: usize, num_df: usize) -> Result<Self> {
        if num_meas == 0 {
            return Err(FpmError::InvalidConfiguration(
                "num_meas must be nonzero".into(),
            ));
        }
        if num_bf + num_df != num_meas {
            return Err(FpmError::InvalidConfiguration(format!(
                "num_bf + num_df must equal num_meas: {num_bf} + {num_df} != {num_meas}"
            )));
        }

        Ok(Self {
            num_layers,
            num_meas,
            num_bf,
            num_df,
            bf_budget: None,
            df_budget: None,
            coeffs: vec![1.0 / num_meas as f64; num_layers * num_meas],
        })
    }

    /// Create a design with uniform-random coefficients in [0, 1)
    pub fn random<R: Rng>(
        num_layers: usize,
        num_meas: usize,
        num_bf: usize,
        num_df: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let mut design = Self::new(num_layers, num_meas, num_bf, num_df)?;
        for c in design.coeffs.iter_mut() {
            *c = rng.gen::<f64>();
        }
        design.project();
        Ok(design)
    }

    /// Configure per-layer group budgets (applied by `project`)
    ///
    /// A budget must be non-negative and finite; anything else would let
    /// `project` emit infeasible coefficients.
    pub fn with_budgets(mut self, bf_budget: Option<f64>, df_budget: Option<f64>) -> Result<Self> {
        check_budget("bf_budget", bf_budget)?;
        check_budget("df_budget", df_budget)?;
        self.bf_budget = bf_budget;
        self.df_budget = df_budget;
        Ok(self)
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.num_layers
    }

    #[inline]
    pub fn num_meas(&self) -> usize {
        self.num_meas
    }

    #[inline]
    pub fn num_bf(&self) -> usize {
        self.num_bf
    }

    #[inline]
    pub fn num_df(&self) -> usize {
        self.num_df
    }

    /// Coefficients of one unrolled layer
    #[inline]
    pub fn layer(&self, k: usize) -> &[f64] {
        &self.coeffs[k * self.num_meas..(k + 1) * self.num_meas]
    }

    /// Flat view in the documented layer-major layout
    #[inline]
    pub fn as_flat(&self) -> &[f64] {
        &self.coeffs
    }

    /// Mutable flat view for the optimizer
    #[inline]
    pub fn as_flat_mut(&mut self) -> &mut [f64] {
        &mut self.coeffs
    }

    /// Replace all coefficients from a flat vector in the documented layout
    pub fn set_flat(&mut self, flat: &[f64]) -> Result<()> {
        if flat.len() != self.coeffs.len() {
            return Err(FpmError::ShapeMismatch {
                what: "design coefficients".into(),
                expected: self.coeffs.len(),
                got: flat.len(),
            });
        }
        self.coeffs.copy_from_slice(flat);
        Ok(())
    }

    /// Check the structural invariants (used after deserialization)
    pub fn validate(&self) -> Result<()> {
        if self.num_meas == 0 || self.num_bf + self.num_df != self.num_meas {
            return Err(FpmError::InvalidConfiguration(format!(
                "invalid bf/df split: {} + {} vs {} measurements",
                self.num_bf, self.num_df, self.num_meas
            )));
        }
        if self.coeffs.len() != self.num_layers * self.num_meas {
            return Err(FpmError::ShapeMismatch {
                what: "design coefficients".into(),
                expected: self.num_layers * self.num_meas,
                got: self.coeffs.len(),
            });
        }
        check_budget("bf_budget", self.bf_budget)?;
        check_budget("df_budget", self.df_budget)?;
        Ok(())
    }

    /// Project the coefficients onto the feasible set, in place
    pub fn project(&mut self) {
        for c in self.coeffs.iter_mut() {
            if *c < 0.0 {
                *c = 0.0;
            }
        }

        for k in 0..self.num_layers {
            let base = k * self.num_meas;
            if let Some(budget) = self.bf_budget {
                rescale_group(&mut self.coeffs[base..base + self.num_bf], budget);
            }
            if let Some(budget) = self.df_budget {
                rescale_group(
                    &mut self.coeffs[base + self.num_bf..base + self.num_meas],
                    budget,
                );
            }
        }
    }
}

/// Reject group budgets `project` cannot honor
pub(crate) fn check_budget(name: &str, budget: Option<f64>) -> Result<()> {
    if let Some(b) = budget {
        if !b.is_finite() || b < 0.0 {
            return Err(FpmError::InvalidConfiguration(format!(
                "{name} must be non-negative and finite, got {b}"
            )));
        }
    }
    Ok(())
}

/// Scale a weight group down so its sum does not exceed the budget
fn rescale_group(group: &mut [f64], budget: f64) {
    let sum: f64 = group.iter().sum();
    if sum > budget && sum > 0.0 {
        let scale = budget / sum;
        for c in group.iter_mut() {
            *c *= scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_split() {
        assert!(Design::new(2, 6, 1, 5).is_ok());
    }

    #[test]
    fn test_invalid_split_rejected() {
        // num_bf + num_df != num_meas
        let err = Design::new(2, 6, 2, 5).unwrap_err();
        assert!(matches!(err, FpmError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_zero_meas_rejected() {
        assert!(Design::new(1, 0, 0, 0).is_err());
    }

    #[test]
    fn test_projection_clamps_negatives() {
        let mut d = Design::new(2, 4, 2, 2).unwrap();
        d.set_flat(&[-1.0, 0.5, -0.1, 2.0, 0.0, -3.0, 1.0, 0.25])
            .unwrap();
        d.project();
        for (i, &c) in d.as_flat().iter().enumerate() {
            assert!(c >= 0.0, "coefficient {} negative after projection: {}", i, c);
        }
        // Positive entries untouched when no budget is set
        assert!((d.as_flat()[3] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_projection_idempotent() {
        let mut d = Design::new(3, 4, 1, 3)
            .unwrap()
            .with_budgets(Some(1.0), Some(0.5))
            .unwrap();
        d.set_flat(&[
            -0.5, 2.0, 0.1, 0.9, //
            3.0, 0.2, 0.2, 0.2, //
            0.0, -1.0, 4.0, 4.0,
        ])
        .unwrap();

        d.project();
        let once = d.as_flat().to_vec();
        d.project();
        let twice = d.as_flat().to_vec();

        for (i, (&a, &b)) in once.iter().zip(twice.iter()).enumerate() {
            assert!(
                (a - b).abs() < 1e-12,
                "projection not idempotent at index {}: {} vs {}",
                i,
                a,
                b
            );
        }
    }

    #[test]
    fn test_budget_respected_per_layer_group() {
        let mut d = Design::new(2, 4, 2, 2)
            .unwrap()
            .with_budgets(Some(1.0), Some(1.0))
            .unwrap();
        d.set_flat(&[5.0, 5.0, 0.1, 0.1, 0.2, 0.3, 8.0, 2.0]).unwrap();
        d.project();

        for k in 0..2 {
            let layer = d.layer(k);
            let bf_sum: f64 = layer[..2].iter().sum();
            let df_sum: f64 = layer[2..].iter().sum();
            assert!(bf_sum <= 1.0 + 1e-12, "bf budget exceeded in layer {k}: {bf_sum}");
            assert!(df_sum <= 1.0 + 1e-12, "df budget exceeded in layer {k}: {df_sum}");
        }
        // Groups under budget keep their values
        assert!((d.layer(0)[2] - 0.1).abs() < 1e-12);
        assert!((d.layer(1)[0] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_infeasible_budgets_rejected() {
        // A negative budget would flip rescaled coefficients negative and
        // break both non-negativity and idempotence of the projection
        let err = Design::new(1, 2, 1, 1)
            .unwrap()
            .with_budgets(Some(-1.0), None)
            .unwrap_err();
        assert!(matches!(err, FpmError::InvalidConfiguration(_)));

        assert!(Design::new(1, 2, 1, 1)
            .unwrap()
            .with_budgets(None, Some(f64::NAN))
            .is_err());
        assert!(Design::new(1, 2, 1, 1)
            .unwrap()
            .with_budgets(Some(f64::INFINITY), None)
            .is_err());
    }

    #[test]
    fn test_zero_budget_projects_group_to_zero() {
        let mut d = Design::new(1, 2, 1, 1)
            .unwrap()
            .with_budgets(Some(0.0), None)
            .unwrap();
        d.set_flat(&[2.0, 0.5]).unwrap();
        d.project();
        assert_eq!(d.as_flat()[0], 0.0);
        assert!((d.as_flat()[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_random_design_is_feasible() {
        let mut rng = rand::thread_rng();
        let d = Design::random(2, 5, 2, 3, &mut rng).unwrap();
        assert!(d.as_flat().iter().all(|&c| c >= 0.0));
        assert_eq!(d.as_flat().len(), 10);
    }

    #[test]
    fn test_layer_layout() {
        let mut d = Design::new(2, 3, 1, 2).unwrap();
        d.set_flat(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]).unwrap();
        assert_eq!(d.layer(0), &[0.1, 0.2, 0.3]);
        assert_eq!(d.layer(1), &[0.4, 0.5, 0.6]);
    }
}
