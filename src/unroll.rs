//! Unrolled gradient-descent network
//!
//! The reconstruction network is a fixed, strictly ordered sequence of
//! physics-based update steps
//!
//! x_{k+1} = x_k − α · G(x_k, y, c_k)
//!
//! where G is the data-fidelity gradient and c_k is layer k's slice of the
//! learnable illumination design. All layers share identical physics and
//! differ only in their coefficient slice, so a layer is a pure function of
//! (field, coefficients, measurements) rather than an object. Evaluation is
//! terminal after the last layer; zero layers is the identity.
//!
//! The reverse pass is hand-derived. Writing the loss cotangent as the
//! packaged partials g = ∂L/∂Re(x) + i·∂L/∂Im(x), the realified transpose of
//! a complex-linear operator is its conjugate transpose, so A_l transports
//! cotangents forward and A_l^H transports them back. With u_l = A_l x_k,
//! s_l = A_l g, i0_m = Σ_l |u_l|², r_m = c_m·i0_m − y_m and
//! q_m = Σ_l Re(conj(s_l) ⊙ u_l), one layer's adjoint is
//!
//! ∂L/∂c_m     = −α · Σ_p (r_m + c_m·i0_m)[p] · q_m[p]
//! g_{k}       = g_{k+1} − α · Σ_m Σ_l A_l^H( 2c_m²·(q_m ⊙ u_l) + c_m·(r_m ⊙ s_l) )
//!
//! The q_m term is the Gauss-Newton-like curvature of the intensity
//! measurement; the r_m term carries the residual itself.

use num_complex::Complex64;

use crate::design::Design;
use crate::error::{FpmError, Result};
use crate::forward::ForwardModel;
use crate::gradient::{check_measurements, gradient};
use crate::kernels::complex as cx;

/// Field states recorded during evaluation: x_0 .. x_N
pub struct EvalTrace {
    states: Vec<Vec<Complex64>>,
}

impl EvalTrace {
    /// Final field estimate x_N
    pub fn output(&self) -> &[Complex64] {
        self.states.last().expect("trace always holds x_0")
    }

    /// Per-layer outputs x_1 .. x_N, in layer order
    pub fn intermediates(&self) -> &[Vec<Complex64>] {
        &self.states[1..]
    }

    /// Number of unrolled layers the trace passed through
    pub fn num_layers(&self) -> usize {
        self.states.len() - 1
    }
}

/// One unrolled update step: x − α · G(x, y, coeffs)
pub fn update_step(
    fm: &mut ForwardModel,
    x: &[Complex64],
    y: &[Vec<f64>],
    coeffs: &[f64],
    alpha: f64,
) -> Result<Vec<Complex64>> {
    let g = gradient(fm, x, y, coeffs)?;
    Ok(x.iter().zip(g.iter()).map(|(&xi, &gi)| xi - alpha * gi).collect())
}

/// Run the full unroll, recording every state for the reverse pass
pub fn evaluate(
    fm: &mut ForwardModel,
    x0: &[Complex64],
    y: &[Vec<f64>],
    design: &Design,
    alpha: f64,
) -> Result<EvalTrace> {
    check_measurements(fm, y)?;

    let mut states = Vec::with_capacity(design.num_layers() + 1);
    states.push(x0.to_vec());

    for k in 0..design.num_layers() {
        let next = update_step(fm, states.last().expect("states starts with x_0"), y, design.layer(k), alpha)
            .map_err(|e| e.at_layer(k))?;
        states.push(next);
    }

    Ok(EvalTrace { states })
}

/// Backpropagate a loss cotangent at x_N through every layer
///
/// # Arguments
/// * `trace` - States recorded by `evaluate` for the same design
/// * `cotangent` - ∂L/∂Re(x_N) + i·∂L/∂Im(x_N)
///
/// # Returns
/// Gradient of the loss with respect to the design coefficients, flat in the
/// design's documented layer-major layout
pub fn backward(
    fm: &mut ForwardModel,
    trace: &EvalTrace,
    y: &[Vec<f64>],
    design: &Design,
    alpha: f64,
    cotangent: &[Complex64],
) -> Result<Vec<f64>> {
    check_measurements(fm, y)?;

    let num_layers = design.num_layers();
    if trace.num_layers() != num_layers {
        return Err(FpmError::ShapeMismatch {
            what: "evaluation trace".into(),
            expected: num_layers,
            got: trace.num_layers(),
        });
    }
    let n = fm.n_pixels();
    if cotangent.len() != n {
        return Err(FpmError::ShapeMismatch {
            what: "loss cotangent".into(),
            expected: n,
            got: cotangent.len(),
        });
    }

    let num_meas = design.num_meas();
    let mut coeff_grads = vec![0.0; num_layers * num_meas];

    let mut g = cotangent.to_vec();
    let mut u = vec![Complex64::new(0.0, 0.0); n];
    let mut back = vec![Complex64::new(0.0, 0.0); n];
    let mut w = vec![Complex64::new(0.0, 0.0); n];

    for k in (0..num_layers).rev() {
        let x = &trace.states[k];
        let coeffs = design.layer(k);
        let mut g_prev = g.clone();

        for m in 0..fm.n_meas() {
            let c = coeffs[m];
            let group = fm.groups()[m].clone();

            // Recompute the sub-source fields and the multiplexed residual
            let mut fields = Vec::with_capacity(group.len());
            let mut i0 = vec![0.0; n];
            for &l in &group {
                fm.apply(l, x, &mut u)?;
                cx::abs2_acc(&mut i0, &u, 1.0);
                fields.push(u.clone());
            }
            let r: Vec<f64> = i0
                .iter()
                .zip(y[m].iter())
                .map(|(&i0p, &yp)| c * i0p - yp)
                .collect();

            // Transport the cotangent forward: s_l = A_l g
            let mut s_fields = Vec::with_capacity(group.len());
            let mut q = vec![0.0; n];
            for &l in &group {
                fm.apply(l, &g, &mut u)?;
                s_fields.push(u.clone());
            }
            for (s, uf) in s_fields.iter().zip(fields.iter()) {
                for p in 0..n {
                    q[p] += (s[p].conj() * uf[p]).re;
                }
            }

            // Coefficient gradient for this layer/measurement
            let mut dc = 0.0;
            for p in 0..n {
                dc += (r[p] + c * i0[p]) * q[p];
            }
            coeff_grads[k * num_meas + m] = -alpha * dc;

            // Field cotangent: back-project the curvature and residual terms
            for (gi, &l) in group.iter().enumerate() {
                for p in 0..n {
                    w[p] = 2.0 * c * c * q[p] * fields[gi][p] + c * r[p] * s_fields[gi][p];
                }
                fm.apply_adjoint(l, &w, &mut back)?;
                cx::axpy(&mut g_prev, &back, -alpha);
            }
        }

        if !cx::all_finite(&g_prev) {
            return Err(FpmError::NumericalInstability {
                context: format!("backward pass (layer {k})"),
            });
        }
        g = g_prev;
    }

    Ok(coeff_grads)
}
