//! 2D FFT wrapper built on rustfft
//!
//! Provides in-place 2D FFT/IFFT over row-major complex arrays, matching
//! NumPy's conventions: the forward transform is unnormalized and the inverse
//! carries the 1/N factor. Plans and scratch buffers are cached in a
//! workspace so the per-iteration transform loop allocates nothing.

use num_complex::Complex64;
use rustfft::{Fft, FftDirection, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

/// FFT workspace that caches plans and scratch buffers for reuse
pub struct Fft2dWorkspace {
    nx: usize,
    ny: usize,
    n_total: usize,
    fft_x: Arc<dyn Fft<f64>>,
    fft_y: Arc<dyn Fft<f64>>,
    ifft_x: Arc<dyn Fft<f64>>,
    ifft_y: Arc<dyn Fft<f64>>,
    scratch_x: Vec<Complex64>,
    scratch_y: Vec<Complex64>,
    buffer_y: Vec<Complex64>,
}

impl Fft2dWorkspace {
    /// Create a new FFT workspace for an `ny`-row by `nx`-column grid
    pub fn new(nx: usize, ny: usize) -> Self {
        let mut planner = FftPlanner::new();

        let fft_x = planner.plan_fft(nx, FftDirection::Forward);
        let fft_y = planner.plan_fft(ny, FftDirection::Forward);
        let ifft_x = planner.plan_fft(nx, FftDirection::Inverse);
        let ifft_y = planner.plan_fft(ny, FftDirection::Inverse);

        let scratch_x = vec![
            Complex64::new(0.0, 0.0);
            fft_x.get_inplace_scratch_len().max(ifft_x.get_inplace_scratch_len())
        ];
        let scratch_y = vec![
            Complex64::new(0.0, 0.0);
            fft_y.get_inplace_scratch_len().max(ifft_y.get_inplace_scratch_len())
        ];

        Self {
            nx,
            ny,
            n_total: nx * ny,
            fft_x,
            fft_y,
            ifft_x,
            ifft_y,
            scratch_x,
            scratch_y,
            buffer_y: vec![Complex64::new(0.0, 0.0); ny],
        }
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    /// In-place forward 2D FFT
    pub fn fft2d(&mut self, data: &mut [Complex64]) {
        let (nx, ny) = (self.nx, self.ny);

        // Transform along x (rows, stride 1)
        for j in 0..ny {
            let start = j * nx;
            self.fft_x
                .process_with_scratch(&mut data[start..start + nx], &mut self.scratch_x);
        }

        // Transform along y (columns, stride nx)
        for i in 0..nx {
            for j in 0..ny {
                self.buffer_y[j] = data[idx2d(i, j, nx)];
            }
            self.fft_y
                .process_with_scratch(&mut self.buffer_y, &mut self.scratch_y);
            for j in 0..ny {
                data[idx2d(i, j, nx)] = self.buffer_y[j];
            }
        }
    }

    /// In-place inverse 2D FFT (with 1/N normalization)
    pub fn ifft2d(&mut self, data: &mut [Complex64]) {
        let (nx, ny) = (self.nx, self.ny);
        let n_total = self.n_total as f64;

        for j in 0..ny {
            let start = j * nx;
            self.ifft_x
                .process_with_scratch(&mut data[start..start + nx], &mut self.scratch_x);
        }

        for i in 0..nx {
            for j in 0..ny {
                self.buffer_y[j] = data[idx2d(i, j, nx)];
            }
            self.ifft_y
                .process_with_scratch(&mut self.buffer_y, &mut self.scratch_y);
            for j in 0..ny {
                data[idx2d(i, j, nx)] = self.buffer_y[j];
            }
        }

        for val in data.iter_mut() {
            *val /= n_total;
        }
    }
}

/// Index into a 2D array stored row-major: index = i + j*nx
#[inline(always)]
pub fn idx2d(i: usize, j: usize, nx: usize) -> usize {
    i + j * nx
}

/// Generate FFT frequency values for a given dimension
/// Matches numpy.fft.fftfreq(n, d)
pub fn fftfreq(n: usize, d: f64) -> Vec<f64> {
    let mut freq = vec![0.0; n];
    let val = 1.0 / (n as f64 * d);

    if n % 2 == 0 {
        // Even: [0, 1, ..., n/2-1, -n/2, ..., -1]
        for i in 0..n / 2 {
            freq[i] = (i as f64) * val;
        }
        for i in n / 2..n {
            freq[i] = ((i as i64) - (n as i64)) as f64 * val;
        }
    } else {
        // Odd: [0, 1, ..., (n-1)/2, -(n-1)/2, ..., -1]
        for i in 0..=(n - 1) / 2 {
            freq[i] = (i as f64) * val;
        }
        for i in (n + 1) / 2..n {
            freq[i] = ((i as i64) - (n as i64)) as f64 * val;
        }
    }
    freq
}

/// Wrap angle to [-π, π]
#[inline]
pub fn wrap_angle(angle: f64) -> f64 {
    let mut a = angle % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a < -PI {
        a += 2.0 * PI;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fft_ifft_roundtrip() {
        let nx = 8;
        let ny = 4;

        let original: Vec<f64> = (0..nx * ny).map(|i| i as f64).collect();

        let mut data: Vec<Complex64> = original.iter().map(|&x| Complex64::new(x, 0.0)).collect();

        let mut ws = Fft2dWorkspace::new(nx, ny);
        ws.fft2d(&mut data);
        ws.ifft2d(&mut data);

        for (i, (&orig, result)) in original.iter().zip(data.iter()).enumerate() {
            assert!(
                (result.re - orig).abs() < 1e-10,
                "Mismatch at index {}: expected {}, got {}",
                i,
                orig,
                result.re
            );
            assert!(
                result.im.abs() < 1e-10,
                "Imaginary part not zero at index {}: {}",
                i,
                result.im
            );
        }
    }

    #[test]
    fn test_fft_dc_component() {
        // FFT of a constant image concentrates everything at DC
        let nx = 4;
        let ny = 4;
        let mut data = vec![Complex64::new(1.0, 0.0); nx * ny];

        let mut ws = Fft2dWorkspace::new(nx, ny);
        ws.fft2d(&mut data);

        assert!(
            (data[0].re - (nx * ny) as f64).abs() < 1e-10,
            "DC should be N, got {}",
            data[0].re
        );
        for (i, v) in data.iter().enumerate().skip(1) {
            assert!(v.norm() < 1e-10, "Non-DC bin {} should be zero, got {}", i, v);
        }
    }

    #[test]
    fn test_fftfreq() {
        // Even n=4
        let freq = fftfreq(4, 1.0);
        assert!((freq[0] - 0.0).abs() < 1e-10);
        assert!((freq[1] - 0.25).abs() < 1e-10);
        assert!((freq[2] - (-0.5)).abs() < 1e-10);
        assert!((freq[3] - (-0.25)).abs() < 1e-10);

        // Odd n=5
        let freq = fftfreq(5, 1.0);
        assert!((freq[0] - 0.0).abs() < 1e-10);
        assert!((freq[1] - 0.2).abs() < 1e-10);
        assert!((freq[2] - 0.4).abs() < 1e-10);
        assert!((freq[3] - (-0.4)).abs() < 1e-10);
        assert!((freq[4] - (-0.2)).abs() < 1e-10);
    }

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-10);
        assert!((wrap_angle(-3.0 * PI) + PI).abs() < 1e-10);
        assert!((wrap_angle(0.5) - 0.5).abs() < 1e-10);
    }
}
