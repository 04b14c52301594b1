//! Fixed optical metadata for an FPM experiment
//!
//! Immutable once constructed and shared read-only by every layer of the
//! unrolled network: wavelength, numerical aperture, pixel size, grid size,
//! and the LED illumination angles. The pupil aperture and per-LED tilt
//! ramps are derived from these constants.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{FpmError, Result};
use crate::kernels::{planewave, pupil};

/// One LED position expressed as illumination angles in radians
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LedAngle {
    pub x: f64,
    pub y: f64,
}

/// Fixed per-experiment optical constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Optics {
    /// Grid width in pixels
    pub nx: usize,
    /// Grid height in pixels
    pub ny: usize,
    /// Reconstruction pixel size (same units as wavelength, e.g. µm)
    pub pixel_size: f64,
    /// Illumination wavelength
    pub wavelength: f64,
    /// Objective numerical aperture
    pub na: f64,
    /// LED illumination angles, ordered by LED index
    pub leds: Vec<LedAngle>,
}

impl Optics {
    /// Validate the metadata; fails fast with `InvalidConfiguration`
    pub fn validate(&self) -> Result<()> {
        if self.nx == 0 || self.ny == 0 {
            return Err(FpmError::InvalidConfiguration(format!(
                "grid size must be nonzero, got {}x{}",
                self.nx, self.ny
            )));
        }
        if self.pixel_size <= 0.0 || self.wavelength <= 0.0 {
            return Err(FpmError::InvalidConfiguration(format!(
                "pixel size and wavelength must be positive, got {} and {}",
                self.pixel_size, self.wavelength
            )));
        }
        if self.na <= 0.0 || self.na > 1.0 {
            return Err(FpmError::InvalidConfiguration(format!(
                "numerical aperture must lie in (0, 1], got {}",
                self.na
            )));
        }
        if self.leds.is_empty() {
            return Err(FpmError::InvalidConfiguration(
                "at least one LED is required".into(),
            ));
        }
        Ok(())
    }

    /// Number of pixels in the field grid
    #[inline]
    pub fn n_pixels(&self) -> usize {
        self.nx * self.ny
    }

    /// Number of LEDs in the array
    #[inline]
    pub fn n_leds(&self) -> usize {
        self.leds.len()
    }

    /// Pupil aperture on the k-space grid (DC at index 0)
    pub fn pupil(&self) -> Vec<f64> {
        pupil::pupil_kernel(self.nx, self.ny, self.pixel_size, self.na, self.wavelength)
    }

    fn led(&self, led: usize) -> Result<&LedAngle> {
        self.leds.get(led).ok_or_else(|| {
            FpmError::InvalidConfiguration(format!(
                "LED index {led} out of range ({} LEDs configured)",
                self.leds.len()
            ))
        })
    }

    /// Real-space tilt ramp for one LED
    pub fn tilt(&self, led: usize) -> Result<Vec<Complex64>> {
        let a = self.led(led)?;
        Ok(planewave::tilt_ramp(
            self.nx,
            self.ny,
            self.pixel_size,
            a.x,
            a.y,
            self.wavelength,
        ))
    }

    /// True when the LED illuminates within the objective NA
    pub fn is_brightfield(&self, led: usize) -> Result<bool> {
        let a = self.led(led)?;
        Ok(planewave::is_brightfield(a.x, a.y, self.na))
    }

    /// Number of brightfield LEDs
    pub fn n_brightfield(&self) -> usize {
        self.leds
            .iter()
            .filter(|a| planewave::is_brightfield(a.x, a.y, self.na))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_optics() -> Optics {
        Optics {
            nx: 8,
            ny: 8,
            pixel_size: 0.5,
            wavelength: 0.5,
            na: 0.25,
            leds: vec![
                LedAngle { x: 0.0, y: 0.0 },
                LedAngle { x: 0.2, y: 0.0 },
                LedAngle { x: 0.6, y: 0.0 },
            ],
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(small_optics().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_na() {
        let mut o = small_optics();
        o.na = 1.5;
        assert!(matches!(
            o.validate(),
            Err(FpmError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_leds() {
        let mut o = small_optics();
        o.leds.clear();
        assert!(o.validate().is_err());
    }

    #[test]
    fn test_brightfield_count() {
        let o = small_optics();
        // LEDs at 0.0 and 0.2 rad are within NA 0.25; 0.6 rad is darkfield
        assert_eq!(o.n_brightfield(), 2);
    }

    #[test]
    fn test_led_index_out_of_range() {
        let o = small_optics();
        assert!(matches!(
            o.tilt(3),
            Err(FpmError::InvalidConfiguration(_))
        ));
        assert!(o.is_brightfield(3).is_err());
        assert!(!o.is_brightfield(2).unwrap());
    }
}
