//! Sensitivity checks that perturb the inputs and re-run the pipeline.

use nalgebra::DVector;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use std::fmt;
use std::str::FromStr;

use crate::dataset::Dataset;
use crate::error::{CausalError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefutationMethod {
    /// Add an independent standard-normal covariate and re-estimate
    #[default]
    RandomCommonCause,
}

impl RefutationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefutationMethod::RandomCommonCause => "random_common_cause",
        }
    }
}

impl fmt::Display for RefutationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefutationMethod {
    type Err = CausalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "random_common_cause" => Ok(RefutationMethod::RandomCommonCause),
            other => Err(CausalError::unsupported_refutation(other)),
        }
    }
}

/// Both estimates side by side; the original is never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct RefutationResult {
    pub original_estimate: DVector<f64>,
    pub estimate_with_random_common_cause: DVector<f64>,
}

impl RefutationResult {
    /// Mean effect after perturbation minus the original mean effect.
    pub fn mean_shift(&self) -> f64 {
        self.estimate_with_random_common_cause.mean() - self.original_estimate.mean()
    }
}

/// Copy of `data` with `column` set to i.i.d. standard-normal draws.
///
/// An existing column of the same name is overwritten in the copy.
pub fn with_random_common_cause<R: Rng + ?Sized>(
    data: &Dataset,
    column: &str,
    rng: &mut R,
) -> Result<Dataset> {
    let noise: Vec<f64> = (0..data.n_rows())
        .map(|_| -> f64 { StandardNormal.sample(&mut *rng) })
        .collect();
    data.with_column(column, noise)
}
