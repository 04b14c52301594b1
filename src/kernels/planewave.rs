//! Planewave illumination tilt kernels
//!
//! Each LED illuminates the sample with a tilted planewave. In real space the
//! tilt is a unit-modulus phase ramp
//!
//! t(r) = exp(i 2π (fx·x + fy·y)),   (fx, fy) = (sin θx, sin θy) / λ
//!
//! which shifts the sample spectrum by (fx, fy) in k-space. An LED is
//! brightfield when its illumination NA lies within the objective NA,
//! darkfield otherwise.

use num_complex::Complex64;
use std::f64::consts::PI;

/// Spatial frequency of an LED tilt from its illumination angles (radians)
#[inline]
pub fn tilt_frequency(angle_x: f64, angle_y: f64, wavelength: f64) -> (f64, f64) {
    (angle_x.sin() / wavelength, angle_y.sin() / wavelength)
}

/// Generate the real-space tilt phase ramp for one LED
///
/// # Arguments
/// * `nx`, `ny` - Grid dimensions
/// * `dx` - Reconstruction pixel size (same units as wavelength)
/// * `angle_x`, `angle_y` - Illumination angles in radians
/// * `wavelength` - Illumination wavelength
///
/// # Returns
/// Flattened complex ramp of size nx*ny, row-major, unit modulus everywhere
pub fn tilt_ramp(
    nx: usize,
    ny: usize,
    dx: f64,
    angle_x: f64,
    angle_y: f64,
    wavelength: f64,
) -> Vec<Complex64> {
    let (fx, fy) = tilt_frequency(angle_x, angle_y, wavelength);
    let mut t = vec![Complex64::new(0.0, 0.0); nx * ny];

    for j in 0..ny {
        let y = j as f64 * dx;
        for i in 0..nx {
            let x = i as f64 * dx;
            let phase = 2.0 * PI * (fx * x + fy * y);
            t[i + j * nx] = Complex64::new(phase.cos(), phase.sin());
        }
    }

    t
}

/// True when the LED's illumination NA lies within the objective NA
#[inline]
pub fn is_brightfield(angle_x: f64, angle_y: f64, na: f64) -> bool {
    let sx = angle_x.sin();
    let sy = angle_y.sin();
    (sx * sx + sy * sy).sqrt() <= na
}
