//! Checkpoint persistence
//!
//! A checkpoint is everything needed for exact resumption or evaluation-only
//! loading: the design coefficients in their documented layout, the optimizer
//! state, the last train/test losses, and the hyperparameters that rebuild
//! the model container. JSON on disk; only completed iterations are written.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::design::Design;
use crate::error::Result;
use crate::loss::Loss;
use crate::optim::Optimizer;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Last completed training iteration
    pub iteration: usize,
    /// Learned design, including num_unrolls/num_meas/num_bf/num_df
    pub design: Design,
    /// Optimizer with its moment state
    pub optimizer: Optimizer,
    /// Unrolled step size
    pub alpha: f64,
    /// Configured loss tag
    pub loss: Loss,
    pub train_loss: f64,
    pub test_loss: Option<f64>,
}

impl Checkpoint {
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load and validate a checkpoint
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let ckpt: Checkpoint = serde_json::from_str(&json)?;
        ckpt.design.validate()?;
        Ok(ckpt)
    }
}
