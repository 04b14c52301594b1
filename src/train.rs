//! Training loop for the learned illumination design
//!
//! The loop alternates strictly: zero gradients → accumulate over the batch
//! (sequentially) → optimizer step → projection. No forward pass for a new
//! batch begins before projection completes, and a failed forward/backward
//! aborts the iteration without an optimizer step on partial gradients — a
//! design trained on corrupted gradient state is unusable, so the loop stops
//! rather than skipping.

use std::path::PathBuf;
use std::str::FromStr;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::checkpoint::Checkpoint;
use crate::dataset::Dataset;
use crate::design::Design;
use crate::error::{FpmError, Result};
use crate::loss::Loss;
use crate::model::FpmModel;
use crate::optim::Optimizer;

/// Configuration surface at the training-loop boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub iterations: usize,
    pub batch_size: usize,
    /// Optimizer tag: "adam" or "sgd"
    pub optimizer: String,
    /// Loss tag: "complex", "abs", or "phase"
    pub loss: String,
    pub learning_rate: f64,
    /// Unrolled gradient step size
    pub alpha: f64,
    pub num_unrolls: usize,
    pub num_meas: usize,
    pub num_bf: usize,
    pub num_df: usize,
    /// Optional per-layer group weight budgets
    pub bf_budget: Option<f64>,
    pub df_budget: Option<f64>,
    /// Evaluate the test set and checkpoint every this many iterations (0 = never)
    pub test_every: usize,
    pub checkpoint_path: Option<PathBuf>,
}

impl TrainConfig {
    /// Fail fast on every configuration error, before any computation
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(FpmError::InvalidConfiguration(
                "iterations must be nonzero".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(FpmError::InvalidConfiguration(
                "batch_size must be nonzero".into(),
            ));
        }
        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            return Err(FpmError::InvalidConfiguration(format!(
                "learning_rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }
        if self.num_bf + self.num_df != self.num_meas {
            return Err(FpmError::InvalidConfiguration(format!(
                "num_bf + num_df must equal num_meas: {} + {} != {}",
                self.num_bf, self.num_df, self.num_meas
            )));
        }
        crate::design::check_budget("bf_budget", self.bf_budget)?;
        crate::design::check_budget("df_budget", self.df_budget)?;
        Loss::from_str(&self.loss)?;
        Optimizer::from_tag(&self.optimizer, self.learning_rate, 0)?;
        Ok(())
    }
}

/// Outcome of a completed training run
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub iterations_run: usize,
    pub train_loss: f64,
    pub test_loss: Option<f64>,
}

/// Owns the model and optimizer for one training run
pub struct Trainer<'a, D: Dataset> {
    config: TrainConfig,
    model: FpmModel,
    optimizer: Optimizer,
    loss: Loss,
    train_data: &'a D,
    test_data: Option<&'a D>,
}

impl<'a, D: Dataset> Trainer<'a, D> {
    /// Build the trainer; every configuration error is fatal here
    pub fn new(
        config: TrainConfig,
        groups: Vec<Vec<usize>>,
        train_data: &'a D,
        test_data: Option<&'a D>,
    ) -> Result<Self> {
        config.validate()?;
        if train_data.is_empty() {
            return Err(FpmError::InvalidConfiguration(
                "training dataset is empty".into(),
            ));
        }

        let loss = Loss::from_str(&config.loss)?;
        let design = Design::new(
            config.num_unrolls,
            config.num_meas,
            config.num_bf,
            config.num_df,
        )?
        .with_budgets(config.bf_budget, config.df_budget)?;
        let n_params = design.as_flat().len();
        let optimizer = Optimizer::from_tag(&config.optimizer, config.learning_rate, n_params)?;

        let model = FpmModel::new(
            train_data.optics().clone(),
            groups,
            design,
            config.alpha,
        )?;

        Ok(Self {
            config,
            model,
            optimizer,
            loss,
            train_data,
            test_data,
        })
    }

    pub fn model(&self) -> &FpmModel {
        &self.model
    }

    /// Run the configured number of iterations
    pub fn run(&mut self) -> Result<TrainReport> {
        let n_params = self.model.design().as_flat().len();
        let mut last_train_loss = f64::NAN;
        let mut last_test_loss = None;

        for iter in 0..self.config.iterations {
            // Zero gradients, then accumulate sequentially over the batch
            let mut grads = vec![0.0; n_params];
            let mut batch_loss = 0.0;

            for b in 0..self.config.batch_size {
                let idx = (iter * self.config.batch_size + b) % self.train_data.len();
                let sample = self.train_data.sample(idx).map_err(|e| e.at_batch(b))?;

                let x0 = self
                    .model
                    .initialize(&sample.measurements)
                    .map_err(|e| e.at_batch(b))?;
                let trace = self
                    .model
                    .evaluate(&x0, &sample.measurements)
                    .map_err(|e| e.at_batch(b))?;
                batch_loss += self
                    .loss
                    .value(trace.output(), &sample.target)
                    .map_err(|e| e.at_batch(b))?;
                let cot = self
                    .loss
                    .cotangent(trace.output(), &sample.target)
                    .map_err(|e| e.at_batch(b))?;
                let g = self
                    .model
                    .backward(&trace, &sample.measurements, &cot)
                    .map_err(|e| e.at_batch(b))?;

                for (acc, gi) in grads.iter_mut().zip(g.iter()) {
                    *acc += gi;
                }
            }

            let inv_batch = 1.0 / self.config.batch_size as f64;
            for g in grads.iter_mut() {
                *g *= inv_batch;
            }
            last_train_loss = batch_loss * inv_batch;

            // Step, then immediately re-constrain before any new forward pass
            self.optimizer.step(self.model.params_mut(), &grads)?;
            self.model.projection();

            debug!("iteration {iter}: train loss {last_train_loss:.6e}");

            if self.config.test_every > 0 && (iter + 1) % self.config.test_every == 0 {
                if let Some(test) = self.test_data {
                    let test_loss = self.evaluate_dataset(test)?;
                    info!("iteration {iter}: test loss {test_loss:.6e}");
                    last_test_loss = Some(test_loss);
                }
                if let Some(path) = &self.config.checkpoint_path {
                    let ckpt = Checkpoint {
                        iteration: iter + 1,
                        design: self.model.design().clone(),
                        optimizer: self.optimizer.clone(),
                        alpha: self.model.alpha(),
                        loss: self.loss,
                        train_loss: last_train_loss,
                        test_loss: last_test_loss,
                    };
                    ckpt.save(path)?;
                    debug!("checkpoint written to {}", path.display());
                }
            }
        }

        Ok(TrainReport {
            iterations_run: self.config.iterations,
            train_loss: last_train_loss,
            test_loss: last_test_loss,
        })
    }

    /// Mean loss over a dataset, without touching the parameters
    pub fn evaluate_dataset(&mut self, data: &D) -> Result<f64> {
        if data.is_empty() {
            return Err(FpmError::InvalidConfiguration(
                "evaluation dataset is empty".into(),
            ));
        }
        let mut total = 0.0;
        for i in 0..data.len() {
            let sample = data.sample(i)?;
            let x0 = self.model.initialize(&sample.measurements)?;
            let trace = self.model.evaluate(&x0, &sample.measurements)?;
            total += self.loss.value(trace.output(), &sample.target)?;
        }
        Ok(total / data.len() as f64)
    }
}
