//! Pupil aperture kernel
//!
//! The pupil function is the k-space support of the imaging system: a
//! circular low-pass aperture with cutoff frequency NA / wavelength. In
//! k-space:
//!
//! P(k) = 1 if |k| <= NA / lambda, else 0
//!
//! centered at index (0, 0) (not shifted), matching the unshifted FFT layout.

use crate::fft::fftfreq;

/// Generate the circular pupil aperture in k-space
///
/// # Arguments
/// * `nx`, `ny` - Grid dimensions
/// * `dx` - Reconstruction pixel size (same units as wavelength)
/// * `na` - Numerical aperture of the objective
/// * `wavelength` - Illumination wavelength
///
/// # Returns
/// Flattened binary pupil array of size nx*ny, row-major, DC at index 0
pub fn pupil_kernel(nx: usize, ny: usize, dx: f64, na: f64, wavelength: f64) -> Vec<f64> {
    let mut p = vec![0.0; nx * ny];

    let fx = fftfreq(nx, dx);
    let fy = fftfreq(ny, dx);

    let cutoff = na / wavelength;
    let cutoff_sq = cutoff * cutoff;

    for j in 0..ny {
        let fy_val = fy[j];
        for i in 0..nx {
            let fx_val = fx[i];
            let f_sq = fx_val * fx_val + fy_val * fy_val;
            if f_sq <= cutoff_sq {
                p[i + j * nx] = 1.0;
            }
        }
    }

    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pupil_dc_inside() {
        let p = pupil_kernel(8, 8, 1.0, 0.25, 0.5);
        assert!((p[0] - 1.0).abs() < 1e-12, "DC must lie inside the pupil");
    }

    #[test]
    fn test_pupil_binary() {
        let p = pupil_kernel(16, 16, 1.0, 0.25, 0.5);
        for (i, &v) in p.iter().enumerate() {
            assert!(
                v == 0.0 || v == 1.0,
                "pupil must be binary, got {} at index {}",
                v,
                i
            );
        }
    }

    #[test]
    fn test_pupil_symmetry() {
        // P(fx, fy) == P(-fx, -fy)
        let n = 8;
        let p = pupil_kernel(n, n, 1.0, 0.3, 0.5);
        for j in 1..n {
            for i in 1..n {
                let idx1 = i + j * n;
                let idx2 = (n - i) + (n - j) * n;
                assert!(
                    (p[idx1] - p[idx2]).abs() < 1e-12,
                    "symmetry broken at ({},{}): {} vs {}",
                    i,
                    j,
                    p[idx1],
                    p[idx2]
                );
            }
        }
    }

    #[test]
    fn test_pupil_cutoff_excludes_high_freq() {
        // With a tiny NA only the DC bin survives
        let n = 8;
        let p = pupil_kernel(n, n, 1.0, 1e-3, 0.5);
        let count: f64 = p.iter().sum();
        assert!((count - 1.0).abs() < 1e-12, "tiny NA should keep only DC, kept {}", count);
    }
}
