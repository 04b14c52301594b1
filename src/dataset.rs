//! Dataset contract for training
//!
//! The core consumes data through a narrow contract: an indexable collection
//! of (measurement stack, target field) pairs plus the optical metadata the
//! forward model needs. File-format-specific loaders live outside the crate.

use num_complex::Complex64;
use rand::Rng;

use crate::error::{FpmError, Result};
use crate::forward::ForwardModel;
use crate::optics::Optics;

/// One training pair
#[derive(Debug, Clone)]
pub struct Sample {
    /// Measured intensity stack, one image per measurement index
    pub measurements: Vec<Vec<f64>>,
    /// Ground-truth complex field
    pub target: Vec<Complex64>,
}

/// Indexable collection of training pairs with shared optical metadata
pub trait Dataset {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sample(&self, index: usize) -> Result<Sample>;

    fn optics(&self) -> &Optics;
}

/// Dataset backed by owned vectors, validated on construction
pub struct InMemoryDataset {
    optics: Optics,
    samples: Vec<Sample>,
}

impl InMemoryDataset {
    pub fn new(optics: Optics, samples: Vec<Sample>, num_meas: usize) -> Result<Self> {
        optics.validate()?;
        let n = optics.n_pixels();
        for (i, s) in samples.iter().enumerate() {
            if s.measurements.len() != num_meas {
                return Err(FpmError::ShapeMismatch {
                    what: "sample measurement count".into(),
                    expected: num_meas,
                    got: s.measurements.len(),
                });
            }
            if s.target.len() != n {
                return Err(FpmError::ShapeMismatch {
                    what: "sample target field".into(),
                    expected: n,
                    got: s.target.len(),
                });
            }
            for meas in &s.measurements {
                if meas.len() != n {
                    return Err(FpmError::ShapeMismatch {
                        what: "sample measurement image".into(),
                        expected: n,
                        got: meas.len(),
                    });
                }
            }
            if s.measurements.iter().flatten().any(|v| !v.is_finite()) {
                return Err(FpmError::NumericalInstability {
                    context: format!("measurements of sample {i}"),
                });
            }
        }
        Ok(Self { optics, samples })
    }
}

impl Dataset for InMemoryDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn sample(&self, index: usize) -> Result<Sample> {
        self.samples
            .get(index)
            .cloned()
            .ok_or_else(|| FpmError::InvalidConfiguration(format!(
                "sample index {index} out of range (dataset has {})",
                self.samples.len()
            )))
    }

    fn optics(&self) -> &Optics {
        &self.optics
    }
}

/// Forward-simulate a synthetic dataset from random phantom fields
///
/// Each phantom is a weakly scattering field (amplitude near one, small
/// random phase); its measurements come from the forward model with unit
/// illumination coefficients.
pub fn synthetic<R: Rng>(
    optics: &Optics,
    groups: Vec<Vec<usize>>,
    n_samples: usize,
    rng: &mut R,
) -> Result<InMemoryDataset> {
    let mut fm = ForwardModel::new(optics, groups)?;
    let n = optics.n_pixels();
    let unit = vec![1.0; fm.n_meas()];

    let mut samples = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        let target: Vec<Complex64> = (0..n)
            .map(|_| {
                let amp = 0.8 + 0.4 * rng.gen::<f64>();
                let phase = 0.5 * (rng.gen::<f64>() - 0.5);
                Complex64::from_polar(amp, phase)
            })
            .collect();
        let measurements = fm.intensities(&target, &unit)?;
        samples.push(Sample {
            measurements,
            target,
        });
    }

    let num_meas = fm.n_meas();
    InMemoryDataset::new(optics.clone(), samples, num_meas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optics::LedAngle;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_optics() -> Optics {
        Optics {
            nx: 4,
            ny: 4,
            pixel_size: 0.5,
            wavelength: 0.5,
            na: 0.4,
            leds: vec![LedAngle { x: 0.0, y: 0.0 }, LedAngle { x: 0.2, y: 0.0 }],
        }
    }

    #[test]
    fn test_synthetic_shapes() {
        let optics = small_optics();
        let mut rng = StdRng::seed_from_u64(7);
        let ds = synthetic(&optics, ForwardModel::identity_groups(2), 3, &mut rng).unwrap();

        assert_eq!(ds.len(), 3);
        let s = ds.sample(0).unwrap();
        assert_eq!(s.measurements.len(), 2);
        assert_eq!(s.measurements[0].len(), 16);
        assert_eq!(s.target.len(), 16);
    }

    #[test]
    fn test_out_of_range_index() {
        let optics = small_optics();
        let ds = InMemoryDataset::new(optics, vec![], 2).unwrap();
        assert!(ds.is_empty());
        assert!(ds.sample(0).is_err());
    }

    #[test]
    fn test_rejects_wrong_measurement_count() {
        let optics = small_optics();
        let n = optics.n_pixels();
        let bad = Sample {
            measurements: vec![vec![0.0; n]; 3],
            target: vec![Complex64::new(1.0, 0.0); n],
        };
        assert!(InMemoryDataset::new(optics, vec![bad], 2).is_err());
    }
}
