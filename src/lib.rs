//! fpm-learn: physics-based unrolled reconstruction and learned illumination
//! design for Fourier Ptychographic Microscopy
//!
//! The crate trains a fixed-depth unrolled gradient-descent network that
//! jointly reconstructs a complex sample field from multiplexed
//! LED-illuminated intensity measurements and learns the illumination
//! pattern applied at each unrolled step.
//!
//! # Modules
//! - `fft`: 2D FFT workspace built on rustfft
//! - `kernels`: complex-arithmetic, pupil, and planewave tilt kernels
//! - `optics`: fixed per-experiment optical metadata
//! - `forward`: forward optical operator and its exact adjoint
//! - `gradient`: data-fidelity gradient (adjoint chain)
//! - `unroll`: unrolled update layers and the hand-derived reverse pass
//! - `design`: learnable illumination coefficients and their projection
//! - `loss`: full-complex / amplitude / phase training losses
//! - `optim`: Adam and SGD over the flat coefficient vector
//! - `model`: network container (initialize, evaluate, backward, projection)
//! - `dataset`: narrow data-access contract plus a synthetic generator
//! - `train`: configuration surface and the training loop
//! - `checkpoint`: JSON persistence for exact resumption

pub mod checkpoint;
pub mod dataset;
pub mod design;
pub mod error;
pub mod fft;
pub mod forward;
pub mod gradient;
pub mod kernels;
pub mod loss;
pub mod model;
pub mod optics;
pub mod optim;
pub mod train;
pub mod unroll;

pub use error::{FpmError, Result};
