//! Network container
//!
//! `FpmModel` assembles the fixed optics, the forward model, and the
//! learnable design into the unrolled network. It holds the only mutable
//! reference to the learnable parameters; the training loop reads and
//! updates them exclusively through this container.

use num_complex::Complex64;

use crate::design::Design;
use crate::error::{FpmError, Result};
use crate::forward::ForwardModel;
use crate::optics::Optics;
use crate::unroll::{self, EvalTrace};

pub struct FpmModel {
    optics: Optics,
    forward: ForwardModel,
    design: Design,
    alpha: f64,
}

impl FpmModel {
    /// Assemble the container; fails fast on any inconsistency
    pub fn new(
        optics: Optics,
        groups: Vec<Vec<usize>>,
        design: Design,
        alpha: f64,
    ) -> Result<Self> {
        if alpha <= 0.0 || !alpha.is_finite() {
            return Err(FpmError::InvalidConfiguration(format!(
                "step size alpha must be positive and finite, got {alpha}"
            )));
        }
        if design.num_meas() != groups.len() {
            return Err(FpmError::InvalidConfiguration(format!(
                "design has {} measurements but {} groups were configured",
                design.num_meas(),
                groups.len()
            )));
        }
        let forward = ForwardModel::new(&optics, groups)?;
        Ok(Self {
            optics,
            forward,
            design,
            alpha,
        })
    }

    #[inline]
    pub fn optics(&self) -> &Optics {
        &self.optics
    }

    #[inline]
    pub fn design(&self) -> &Design {
        &self.design
    }

    #[inline]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    #[inline]
    pub fn num_unrolls(&self) -> usize {
        self.design.num_layers()
    }

    /// Mutable flat view of the learnable parameters, for the optimizer only
    pub fn params_mut(&mut self) -> &mut [f64] {
        self.design.as_flat_mut()
    }

    /// Deterministic, non-learned initial field estimate: amplitude is the
    /// square root of the per-pixel measurement mean, phase zero
    pub fn initialize(&self, measurements: &[Vec<f64>]) -> Result<Vec<Complex64>> {
        crate::gradient::check_measurements(&self.forward, measurements)?;

        let n = self.forward.n_pixels();
        let mut mean = vec![0.0; n];
        for meas in measurements {
            for (acc, &v) in mean.iter_mut().zip(meas.iter()) {
                *acc += v;
            }
        }
        let scale = 1.0 / measurements.len() as f64;
        Ok(mean
            .iter()
            .map(|&v| Complex64::new((v * scale).max(0.0).sqrt(), 0.0))
            .collect())
    }

    /// Run the full unroll from x0, recording states for the reverse pass
    pub fn evaluate(&mut self, x0: &[Complex64], y: &[Vec<f64>]) -> Result<EvalTrace> {
        unroll::evaluate(&mut self.forward, x0, y, &self.design, self.alpha)
    }

    /// Backpropagate a loss cotangent at the output through every layer
    ///
    /// Returns coefficient gradients in the design's flat layout.
    pub fn backward(
        &mut self,
        trace: &EvalTrace,
        y: &[Vec<f64>],
        cotangent: &[Complex64],
    ) -> Result<Vec<f64>> {
        unroll::backward(
            &mut self.forward,
            trace,
            y,
            &self.design,
            self.alpha,
            cotangent,
        )
    }

    /// Re-constrain the design after an optimizer step
    pub fn projection(&mut self) {
        self.design.project();
    }
}
