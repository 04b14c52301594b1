//! Elementwise and optical kernels
//!
//! - `complex`: elementwise complex arithmetic over slices
//! - `pupil`: NA-limited k-space aperture of the imaging system
//! - `planewave`: per-LED illumination tilt ramps and bright/darkfield split

pub mod complex;
pub mod planewave;
pub mod pupil;
