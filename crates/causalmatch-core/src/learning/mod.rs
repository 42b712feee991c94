//! Outcome models: trainable function approximators the matcher can consult
//! instead of raw observed outcomes.

pub mod perceptron;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::Result;

pub use perceptron::{Activation, Perceptron, PerceptronConfig};

/// Hyperparameters handed to [`OutcomeModel::fit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    /// Passes over the training data
    pub epoch_count: usize,
    /// Rows per gradient step
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Momentum coefficient in [0, 1)
    pub momentum: f64,
    /// Log the mean epoch loss every N epochs
    pub epoch_report_interval: usize,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            epoch_count: 1000,
            batch_size: 32,
            learning_rate: 1e-4,
            momentum: 0.0,
            epoch_report_interval: 100,
        }
    }
}

/// A model of `outcome ~ covariates` fitted on the reference population.
///
/// Inputs are covariate matrices with one row per unit, exactly as the
/// matcher holds them.
pub trait OutcomeModel: fmt::Debug + Send {
    fn fit(
        &mut self,
        inputs: &DMatrix<f64>,
        targets: &DVector<f64>,
        params: &TrainingParams,
    ) -> Result<()>;

    fn predict(&self, inputs: &DMatrix<f64>) -> Result<DVector<f64>>;
}

/// Builds a fresh, unfitted outcome model for a given covariate count.
pub type OutcomeModelFactory = Arc<dyn Fn(usize) -> Box<dyn OutcomeModel> + Send + Sync>;

/// Factory producing [`Perceptron`]s with the given architecture.
pub fn perceptron_factory(config: PerceptronConfig) -> OutcomeModelFactory {
    Arc::new(move |inputs: usize| -> Box<dyn OutcomeModel> {
        Box::new(Perceptron::new(inputs, &config))
    })
}
