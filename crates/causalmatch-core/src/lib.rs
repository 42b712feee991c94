//! causalmatch core: causal effect estimation from observational data.
//!
//! The pipeline identifies a minimal backdoor adjustment set on a causal
//! graph, estimates per-unit treatment effects by Mahalanobis nearest-neighbor
//! matching (optionally through a learned outcome model), and refutes the
//! estimate by re-running on data perturbed with a random common cause.
//!
//! ```no_run
//! use causalmatch_core::{CausalEffectEstimator, CausalGraph, Dataset, RefutationMethod};
//!
//! # fn main() -> causalmatch_core::Result<()> {
//! let data = Dataset::new(vec![
//!     ("T", vec![0.0, 1.0, 0.0, 1.0]),
//!     ("Y", vec![1.0, 2.0, 1.1, 2.2]),
//!     ("X", vec![0.0, 0.1, 5.0, 5.1]),
//! ])?;
//! let graph = CausalGraph::from_edges([("X", "T"), ("X", "Y")]);
//!
//! let mut estimator = CausalEffectEstimator::new(data, "T", "Y", Some(graph))?;
//! estimator.refute_effect(RefutationMethod::RandomCommonCause)?;
//! println!("{}", estimator.summary()?);
//! # Ok(())
//! # }
//! ```

// - needless_range_loop: matrix loops index several buffers at once
// - new_ret_no_self: constructors validate and return Result<Self>
#![allow(clippy::needless_range_loop)]
#![allow(clippy::new_ret_no_self)]

pub mod causal;
pub mod config;
pub mod dataset;
pub mod error;
pub mod estimator;
pub mod estimators;
pub mod learning;
pub mod refutation;
pub mod summary;

#[cfg(test)]
pub mod tests_config;
#[cfg(test)]
pub mod tests_proptest;

// ============================================================================
// CURATED PUBLIC API EXPORTS
// ============================================================================

// Identification
pub use causal::{
    find_adjustment_set, satisfies_backdoor, AdjustmentSet, CausalGraph, GraphDocument,
};

// Data and errors
pub use dataset::Dataset;
pub use error::{CausalError, MethodKind, Result};

// Configuration
pub use config::{
    ConfigError, CovariateSelection, EstimatorConfig, MatcherConfig, RefutationConfig,
};

// Estimation
pub use estimator::{CausalEffectEstimator, EstimationMethod, Lifecycle};
pub use estimators::MahalanobisMatcher;
pub use learning::{
    perceptron_factory, Activation, OutcomeModel, OutcomeModelFactory, Perceptron,
    PerceptronConfig, TrainingParams,
};

// Refutation and reporting
pub use refutation::{RefutationMethod, RefutationResult};
pub use summary::EffectSummary;
