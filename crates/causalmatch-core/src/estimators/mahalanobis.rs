//! Covariance-normalized nearest-neighbor matching.
//!
//! Query and reference populations are each centered on their own mean and
//! right-multiplied by the inverse sample covariance of the reference
//! covariates. Neighbors are ranked by squared Euclidean distance in that
//! transformed space. A unit's effect is the signed difference between the
//! outcome mass of neighbors sharing its treatment value and of those that do
//! not, divided by the neighbor count.

use nalgebra::{DMatrix, DVector, RowDVector};
use tracing::{debug, info};

use crate::error::{CausalError, Result};
use crate::learning::{OutcomeModel, TrainingParams};

/// Denominator guard used when none is configured.
pub const DEFAULT_EPSILON: f64 = 1e-8;

#[derive(Debug, Clone)]
struct Reference {
    covariates: DMatrix<f64>,
    outcomes: DVector<f64>,
    treatment: DVector<f64>,
}

#[derive(Debug)]
pub struct MahalanobisMatcher {
    n_neighbors: usize,
    epsilon: f64,
    outcome_model: Option<Box<dyn OutcomeModel>>,
    reference: Option<Reference>,
}

impl MahalanobisMatcher {
    pub fn new(n_neighbors: usize) -> Result<Self> {
        if n_neighbors == 0 {
            return Err(CausalError::invalid_parameter(
                "n_neighbors",
                "must be at least 1",
            ));
        }
        Ok(Self {
            n_neighbors,
            epsilon: DEFAULT_EPSILON,
            outcome_model: None,
            reference: None,
        })
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Result<Self> {
        if !(epsilon.is_finite() && epsilon > 0.0) {
            return Err(CausalError::invalid_parameter(
                "epsilon",
                format!("must be positive and finite, got {}", epsilon),
            ));
        }
        self.epsilon = epsilon;
        Ok(self)
    }

    /// Use `model`'s predictions on the reference covariates in place of the
    /// observed outcomes.
    pub fn with_outcome_model(mut self, model: Box<dyn OutcomeModel>) -> Self {
        self.outcome_model = Some(model);
        self
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    pub fn uses_outcome_model(&self) -> bool {
        self.outcome_model.is_some()
    }

    pub fn is_fitted(&self) -> bool {
        self.reference.is_some()
    }

    /// Store the reference population and train the outcome model, if any.
    ///
    /// `covariates` is `N x p`; `outcomes` and `treatment` have length `N`.
    pub fn fit(
        &mut self,
        covariates: &DMatrix<f64>,
        outcomes: &DVector<f64>,
        treatment: &DVector<f64>,
        params: &TrainingParams,
    ) -> Result<()> {
        let n = covariates.nrows();
        if outcomes.len() != n {
            return Err(CausalError::shape("matcher outcomes", n, outcomes.len()));
        }
        if treatment.len() != n {
            return Err(CausalError::shape("matcher treatment", n, treatment.len()));
        }
        if n < 2 {
            return Err(CausalError::insufficient_data(format!(
                "matching needs at least 2 reference units, got {}",
                n
            )));
        }
        if covariates.ncols() == 0 {
            return Err(CausalError::insufficient_data(
                "matching needs at least one covariate",
            ));
        }

        if let Some(model) = self.outcome_model.as_mut() {
            model.fit(covariates, outcomes, params)?;
        }

        info!(
            units = n,
            covariates = covariates.ncols(),
            outcome_model = self.outcome_model.is_some(),
            "Matcher fitted"
        );
        self.reference = Some(Reference {
            covariates: covariates.clone(),
            outcomes: outcomes.clone(),
            treatment: treatment.clone(),
        });
        Ok(())
    }

    /// Per-unit effects for the query population.
    pub fn predict(
        &self,
        covariates: &DMatrix<f64>,
        treatment: &DVector<f64>,
    ) -> Result<DVector<f64>> {
        let reference = self
            .reference
            .as_ref()
            .ok_or_else(|| CausalError::precondition("matcher must be fitted before predict"))?;

        let p = reference.covariates.ncols();
        if covariates.ncols() != p {
            return Err(CausalError::shape("query covariates", p, covariates.ncols()));
        }
        if treatment.len() != covariates.nrows() {
            return Err(CausalError::shape(
                "query treatment",
                covariates.nrows(),
                treatment.len(),
            ));
        }

        let inverse = inverse_covariance(&reference.covariates)?;
        let query = center(covariates) * &inverse;
        let pool = center(&reference.covariates) * &inverse;

        let outcomes = match &self.outcome_model {
            Some(model) => {
                let predicted = model.predict(&reference.covariates)?;
                if predicted.len() != pool.nrows() {
                    return Err(CausalError::shape(
                        "outcome model predictions",
                        pool.nrows(),
                        predicted.len(),
                    ));
                }
                predicted
            }
            None => reference.outcomes.clone(),
        };

        let k = self.n_neighbors.min(pool.nrows());
        debug!(
            queries = query.nrows(),
            reference = pool.nrows(),
            k,
            "Matching query units"
        );

        let mut order: Vec<usize> = (0..pool.nrows()).collect();
        let mut distances = vec![0.0; pool.nrows()];
        let effects = DVector::from_fn(query.nrows(), |i, _| {
            for (j, d) in distances.iter_mut().enumerate() {
                *d = (0..pool.ncols())
                    .map(|c| {
                        let diff = query[(i, c)] - pool[(j, c)];
                        diff * diff
                    })
                    .sum();
            }
            order.iter_mut().enumerate().for_each(|(j, o)| *o = j);
            // Stable sort keeps reference order among equal distances
            order.sort_by(|&a, &b| distances[a].total_cmp(&distances[b]));

            let (mut same_sum, mut same_count) = (0.0, 0usize);
            let (mut other_sum, mut other_count) = (0.0, 0usize);
            for &j in &order[..k] {
                if reference.treatment[j] == treatment[i] {
                    same_sum += outcomes[j];
                    same_count += 1;
                } else {
                    other_sum += outcomes[j];
                    other_count += 1;
                }
            }
            (same_sum - other_sum) / ((same_count + other_count) as f64 + self.epsilon)
        });

        Ok(effects)
    }
}

fn column_means(data: &DMatrix<f64>) -> RowDVector<f64> {
    let n = data.nrows().max(1) as f64;
    RowDVector::from_fn(data.ncols(), |_, c| data.column(c).sum() / n)
}

fn center(data: &DMatrix<f64>) -> DMatrix<f64> {
    let means = column_means(data);
    let mut centered = data.clone();
    for mut row in centered.row_iter_mut() {
        row -= &means;
    }
    centered
}

/// Unbiased sample covariance (`N - 1` denominator) of the rows of `data`.
pub fn sample_covariance(data: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let n = data.nrows();
    if n < 2 {
        return Err(CausalError::insufficient_data(format!(
            "covariance needs at least 2 rows, got {}",
            n
        )));
    }
    let centered = center(data);
    Ok(centered.transpose() * &centered / (n - 1) as f64)
}

fn inverse_covariance(data: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let covariance = sample_covariance(data)?;
    let dimension = covariance.nrows();
    covariance
        .try_inverse()
        .filter(|inv| inv.iter().all(|v| v.is_finite()))
        .ok_or(CausalError::SingularCovariance { dimension })
}
