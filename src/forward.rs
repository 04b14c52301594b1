//! Forward optical operator for multiplexed FPM measurements
//!
//! For LED l the low-resolution field is
//!
//! u_l = A_l x = IFFT( P ⊙ FFT( t_l ⊙ x ) )
//!
//! where P is the pupil aperture and t_l the planewave tilt ramp. A
//! measurement m multiplexes a fixed group S_m of LEDs, weighted by its
//! learnable illumination coefficient c_m:
//!
//! I_m = c_m · Σ_{l ∈ S_m} |A_l x|²
//!
//! The adjoint A_l^H v = conj(t_l) ⊙ IFFT( P ⊙ FFT(v) ) is exact including
//! the FFT normalization, which the gradient operator and the hand-derived
//! backward pass both rely on.

use num_complex::Complex64;

use crate::error::{FpmError, Result};
use crate::fft::Fft2dWorkspace;
use crate::kernels::complex as cx;
use crate::optics::Optics;

/// Largest number of complex scratch elements the model will allocate.
/// Grid/LED combinations beyond this fail with `ResourceExhaustion`.
const MAX_ELEMENTS: usize = 1 << 30;

/// Precomputed transfer functions plus FFT workspace for one experiment
pub struct ForwardModel {
    nx: usize,
    ny: usize,
    pupil: Vec<f64>,
    tilts: Vec<Vec<Complex64>>,
    /// Measurement index -> contributing LED sub-sources
    groups: Vec<Vec<usize>>,
    fft: Fft2dWorkspace,
    work: Vec<Complex64>,
}

impl ForwardModel {
    /// Build the model from optics metadata and a measurement->LED grouping
    pub fn new(optics: &Optics, groups: Vec<Vec<usize>>) -> Result<Self> {
        optics.validate()?;

        if groups.is_empty() {
            return Err(FpmError::InvalidConfiguration(
                "at least one measurement group is required".into(),
            ));
        }
        for (m, group) in groups.iter().enumerate() {
            if group.is_empty() {
                return Err(FpmError::InvalidConfiguration(format!(
                    "measurement {m} has no contributing LEDs"
                )));
            }
            for &l in group {
                if l >= optics.n_leds() {
                    return Err(FpmError::InvalidConfiguration(format!(
                        "measurement {m} references LED {l}, but only {} exist",
                        optics.n_leds()
                    )));
                }
            }
        }

        let n = optics.n_pixels();
        if n
            .checked_mul(optics.n_leds() + 2)
            .map_or(true, |t| t > MAX_ELEMENTS)
        {
            return Err(FpmError::ResourceExhaustion {
                context: format!(
                    "{}x{} grid with {} LEDs exceeds the allocation budget",
                    optics.nx,
                    optics.ny,
                    optics.n_leds()
                ),
            });
        }

        let tilts = (0..optics.n_leds())
            .map(|l| optics.tilt(l))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            nx: optics.nx,
            ny: optics.ny,
            pupil: optics.pupil(),
            tilts,
            groups,
            fft: Fft2dWorkspace::new(optics.nx, optics.ny),
            work: vec![Complex64::new(0.0, 0.0); n],
        })
    }

    /// One LED per measurement, in LED order
    pub fn identity_groups(n_leds: usize) -> Vec<Vec<usize>> {
        (0..n_leds).map(|l| vec![l]).collect()
    }

    #[inline]
    pub fn n_pixels(&self) -> usize {
        self.nx * self.ny
    }

    #[inline]
    pub fn n_meas(&self) -> usize {
        self.groups.len()
    }

    #[inline]
    pub fn groups(&self) -> &[Vec<usize>] {
        &self.groups
    }

    fn check_field(&self, what: &'static str, x: &[Complex64]) -> Result<()> {
        if x.len() != self.n_pixels() {
            return Err(FpmError::ShapeMismatch {
                what: what.into(),
                expected: self.n_pixels(),
                got: x.len(),
            });
        }
        Ok(())
    }

    fn check_led(&self, led: usize) -> Result<()> {
        if led >= self.tilts.len() {
            return Err(FpmError::InvalidConfiguration(format!(
                "LED index {led} out of range ({} LEDs configured)",
                self.tilts.len()
            )));
        }
        Ok(())
    }

    fn check_coeffs(&self, coeffs: &[f64]) -> Result<()> {
        if coeffs.len() != self.groups.len() {
            return Err(FpmError::ShapeMismatch {
                what: "illumination coefficients".into(),
                expected: self.groups.len(),
                got: coeffs.len(),
            });
        }
        Ok(())
    }

    /// u = A_l x: tilt, pupil-filter in k-space, return to real space
    pub fn apply(&mut self, led: usize, x: &[Complex64], out: &mut [Complex64]) -> Result<()> {
        self.check_led(led)?;
        self.check_field("field estimate", x)?;
        self.check_field("forward output", out)?;

        cx::mul(out, x, &self.tilts[led]);
        self.fft.fft2d(out);
        cx::mul_real_inplace(out, &self.pupil);
        self.fft.ifft2d(out);
        Ok(())
    }

    /// x = A_l^H v: pupil-filter in k-space, then remove the tilt
    pub fn apply_adjoint(
        &mut self,
        led: usize,
        v: &[Complex64],
        out: &mut [Complex64],
    ) -> Result<()> {
        self.check_led(led)?;
        self.check_field("adjoint input", v)?;
        self.check_field("adjoint output", out)?;

        out.copy_from_slice(v);
        self.fft.fft2d(out);
        cx::mul_real_inplace(out, &self.pupil);
        self.fft.ifft2d(out);
        cx::mul_conj_inplace(out, &self.tilts[led]);
        Ok(())
    }

    /// Simulated intensity stack: I_m = c_m · Σ_{l ∈ S_m} |A_l x|²
    ///
    /// Pure function of the inputs and the fixed optics; output is
    /// non-negative everywhere for non-negative coefficients.
    pub fn intensities(&mut self, x: &[Complex64], coeffs: &[f64]) -> Result<Vec<Vec<f64>>> {
        self.check_field("field estimate", x)?;
        self.check_coeffs(coeffs)?;

        let n = self.n_pixels();
        let mut stack = Vec::with_capacity(self.groups.len());

        for m in 0..self.groups.len() {
            let mut intensity = vec![0.0; n];
            for gi in 0..self.groups[m].len() {
                let l = self.groups[m][gi];
                self.work.copy_from_slice(x);
                cx::mul_inplace(&mut self.work, &self.tilts[l]);
                self.fft.fft2d(&mut self.work);
                cx::mul_real_inplace(&mut self.work, &self.pupil);
                self.fft.ifft2d(&mut self.work);
                cx::abs2_acc(&mut intensity, &self.work, coeffs[m]);
            }
            stack.push(intensity);
        }

        Ok(stack)
    }
}
