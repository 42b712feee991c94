//! Pipeline orchestrator: identification, estimation and refutation over one
//! dataset.
//!
//! The estimator is the only stateful object in the crate. Its state moves
//! through `Unidentified -> Identified -> Estimated -> Refuted`; each step
//! runs any missing predecessor first and either succeeds and advances, or
//! fails and leaves the previous state in place.

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::causal::{find_adjustment_set, AdjustmentSet, CausalGraph};
use crate::config::{CovariateSelection, EstimatorConfig};
use crate::dataset::Dataset;
use crate::error::{CausalError, Result};
use crate::estimators::MahalanobisMatcher;
use crate::learning::{perceptron_factory, OutcomeModelFactory};
use crate::refutation::{with_random_common_cause, RefutationMethod, RefutationResult};
use crate::summary::EffectSummary;

// ============================================================================
// Method tags
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EstimationMethod {
    /// Nearest-neighbor matching under the Mahalanobis metric
    #[default]
    MahalanobisDistanceMatching,
}

impl EstimationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimationMethod::MahalanobisDistanceMatching => "mdm",
        }
    }
}

impl fmt::Display for EstimationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EstimationMethod {
    type Err = CausalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mdm" => Ok(EstimationMethod::MahalanobisDistanceMatching),
            other => Err(CausalError::unsupported_estimation(other)),
        }
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Observable pipeline position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Lifecycle {
    Unidentified,
    Identified,
    Estimated,
    Refuted,
}

impl Lifecycle {
    pub fn name(&self) -> &'static str {
        match self {
            Lifecycle::Unidentified => "Unidentified",
            Lifecycle::Identified => "Identified",
            Lifecycle::Estimated => "Estimated",
            Lifecycle::Refuted => "Refuted",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Derived state, each variant carrying everything computed so far.
#[derive(Debug, Clone, Default)]
enum Stage {
    #[default]
    Unidentified,
    Identified {
        estimand: AdjustmentSet,
    },
    Estimated {
        estimand: AdjustmentSet,
        estimate: DVector<f64>,
    },
    Refuted {
        estimand: AdjustmentSet,
        estimate: DVector<f64>,
        refutation: DVector<f64>,
    },
}

impl Stage {
    fn lifecycle(&self) -> Lifecycle {
        match self {
            Stage::Unidentified => Lifecycle::Unidentified,
            Stage::Identified { .. } => Lifecycle::Identified,
            Stage::Estimated { .. } => Lifecycle::Estimated,
            Stage::Refuted { .. } => Lifecycle::Refuted,
        }
    }

    fn estimand(&self) -> Option<&AdjustmentSet> {
        match self {
            Stage::Unidentified => None,
            Stage::Identified { estimand }
            | Stage::Estimated { estimand, .. }
            | Stage::Refuted { estimand, .. } => Some(estimand),
        }
    }

    fn estimate(&self) -> Option<&DVector<f64>> {
        match self {
            Stage::Estimated { estimate, .. } | Stage::Refuted { estimate, .. } => Some(estimate),
            _ => None,
        }
    }

    fn refutation(&self) -> Option<&DVector<f64>> {
        match self {
            Stage::Refuted { refutation, .. } => Some(refutation),
            _ => None,
        }
    }
}

// ============================================================================
// Estimator
// ============================================================================

pub struct CausalEffectEstimator {
    data: Dataset,
    treatment: String,
    outcome: String,
    graph: Option<Arc<CausalGraph>>,
    config: EstimatorConfig,
    /// Overrides the perceptron built from `config.outcome_model`
    model_factory: Option<OutcomeModelFactory>,
    stage: Stage,
}

impl fmt::Debug for CausalEffectEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CausalEffectEstimator")
            .field("treatment", &self.treatment)
            .field("outcome", &self.outcome)
            .field("columns", &self.data.column_names())
            .field("graph", &self.graph)
            .field("lifecycle", &self.lifecycle())
            .finish_non_exhaustive()
    }
}

impl CausalEffectEstimator {
    pub fn new<T, O>(
        data: Dataset,
        treatment: T,
        outcome: O,
        graph: Option<CausalGraph>,
    ) -> Result<Self>
    where
        T: Into<String>,
        O: Into<String>,
    {
        Self::with_shared_graph(data, treatment, outcome, graph.map(Arc::new))
    }

    /// Like [`new`](Self::new), sharing an existing graph.
    pub fn with_shared_graph<T, O>(
        data: Dataset,
        treatment: T,
        outcome: O,
        graph: Option<Arc<CausalGraph>>,
    ) -> Result<Self>
    where
        T: Into<String>,
        O: Into<String>,
    {
        let treatment = treatment.into();
        let outcome = outcome.into();
        for name in [&treatment, &outcome] {
            if !data.contains(name) {
                return Err(CausalError::UnknownColumn { name: name.clone() });
            }
        }
        if treatment == outcome {
            return Err(CausalError::invalid_parameter(
                "outcome",
                "treatment and outcome must be different columns",
            ));
        }

        Ok(Self {
            data,
            treatment,
            outcome,
            graph,
            config: EstimatorConfig::default(),
            model_factory: None,
            stage: Stage::Unidentified,
        })
    }

    pub fn with_config(mut self, config: EstimatorConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| CausalError::invalid_parameter("config", e.to_string()))?;
        self.check_refutation_column(&config.refutation.column_name)?;
        self.config = config;
        Ok(self)
    }

    /// Supply outcome models from `factory` instead of the configured perceptron.
    pub fn with_outcome_model_factory(mut self, factory: OutcomeModelFactory) -> Self {
        self.model_factory = Some(factory);
        self
    }

    pub fn data(&self) -> &Dataset {
        &self.data
    }

    pub fn treatment(&self) -> &str {
        &self.treatment
    }

    pub fn outcome(&self) -> &str {
        &self.outcome
    }

    pub fn graph(&self) -> Option<&CausalGraph> {
        self.graph.as_deref()
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.stage.lifecycle()
    }

    pub fn estimand(&self) -> Option<&AdjustmentSet> {
        self.stage.estimand()
    }

    pub fn estimate(&self) -> Option<&DVector<f64>> {
        self.stage.estimate()
    }

    pub fn refutation_estimate(&self) -> Option<&DVector<f64>> {
        self.stage.refutation()
    }

    /// Find the minimal adjustment set and cache it as the estimand.
    ///
    /// Re-identifying discards any estimate or refutation derived from the
    /// previous estimand.
    pub fn identify_effect(&mut self) -> Result<AdjustmentSet> {
        let estimand = self.find_estimand()?;
        self.transition(Stage::Identified {
            estimand: estimand.clone(),
        });
        Ok(estimand)
    }

    /// Per-unit treatment effects, identifying first if needed.
    ///
    /// A previous refutation is discarded. On failure the estimator keeps its
    /// prior state, including when identification ran and matching failed.
    pub fn estimate_effect(&mut self, method: EstimationMethod) -> Result<DVector<f64>> {
        let (estimand, estimate) = self.compute_estimate(method)?;
        self.transition(Stage::Estimated {
            estimand,
            estimate: estimate.clone(),
        });
        Ok(estimate)
    }

    /// Refute with a generator seeded from `refutation.seed`, or from
    /// entropy when no seed is configured.
    pub fn refute_effect(&mut self, method: RefutationMethod) -> Result<RefutationResult> {
        let mut rng = match self.config.refutation.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.refute_effect_with_rng(method, &mut rng)
    }

    /// Re-run the whole pipeline on a perturbed copy of the data, estimating
    /// first if needed. The original data and estimate are left untouched.
    pub fn refute_effect_with_rng<R: Rng + ?Sized>(
        &mut self,
        method: RefutationMethod,
        rng: &mut R,
    ) -> Result<RefutationResult> {
        let column = &self.config.refutation.column_name;
        self.check_refutation_column(column)?;

        let (estimand, estimate) = match (self.stage.estimand(), self.stage.estimate()) {
            (Some(estimand), Some(estimate)) => (estimand.clone(), estimate.clone()),
            _ => self.compute_estimate(EstimationMethod::default())?,
        };

        let refutation = match method {
            RefutationMethod::RandomCommonCause => {
                let perturbed = with_random_common_cause(&self.data, column, rng)?;
                let rerun = CausalEffectEstimator {
                    data: perturbed,
                    treatment: self.treatment.clone(),
                    outcome: self.outcome.clone(),
                    graph: self.graph.clone(),
                    config: self.config.clone(),
                    model_factory: self.model_factory.clone(),
                    stage: Stage::Unidentified,
                };
                rerun.compute_estimate(EstimationMethod::default())?.1
            }
        };
        info!(
            method = %method,
            mean_estimate = estimate.mean(),
            mean_refutation = refutation.mean(),
            "Refutation complete"
        );

        self.transition(Stage::Refuted {
            estimand,
            estimate: estimate.clone(),
            refutation: refutation.clone(),
        });
        Ok(RefutationResult {
            original_estimate: estimate,
            estimate_with_random_common_cause: refutation,
        })
    }

    pub fn summary(&self) -> Result<EffectSummary> {
        match &self.stage {
            Stage::Unidentified | Stage::Identified { .. } => {
                Err(CausalError::precondition("Perform estimates first"))
            }
            Stage::Estimated { .. } => Err(CausalError::precondition("Perform refutation first")),
            Stage::Refuted {
                estimand,
                estimate,
                refutation,
            } => Ok(EffectSummary::new(
                &self.treatment,
                &self.outcome,
                estimand.as_slice(),
                estimate,
                refutation,
            )),
        }
    }

    /// The synthetic covariate must not overwrite treatment or outcome.
    fn check_refutation_column(&self, column: &str) -> Result<()> {
        if column == self.treatment || column == self.outcome {
            return Err(CausalError::invalid_parameter(
                "refutation.column_name",
                format!("'{}' must not name the treatment or outcome column", column),
            ));
        }
        Ok(())
    }

    fn find_estimand(&self) -> Result<AdjustmentSet> {
        let discovered;
        let graph: &CausalGraph = match &self.graph {
            Some(graph) => graph,
            None => {
                discovered = self.discover_graph().unwrap_or_default();
                &discovered
            }
        };

        let variables = self.covariate_names();
        find_adjustment_set(graph, &self.treatment, &self.outcome, &variables)
    }

    /// Estimand (cached or freshly identified) and effects, without
    /// touching the lifecycle.
    fn compute_estimate(&self, method: EstimationMethod) -> Result<(AdjustmentSet, DVector<f64>)> {
        let estimand = match self.stage.estimand() {
            Some(estimand) => estimand.clone(),
            None => self.find_estimand()?,
        };

        let estimate = match method {
            EstimationMethod::MahalanobisDistanceMatching => self.match_units(&estimand)?,
        };
        info!(
            method = %method,
            units = estimate.len(),
            mean = estimate.mean(),
            "Effect estimated"
        );
        Ok((estimand, estimate))
    }

    /// Structure-learning hook used when no graph was supplied.
    ///
    /// Not implemented: identification then runs against an empty graph.
    fn discover_graph(&self) -> Option<CausalGraph> {
        warn!(
            treatment = %self.treatment,
            outcome = %self.outcome,
            "No causal graph supplied and graph discovery is not available; \
             identifying against an empty graph"
        );
        None
    }

    /// Every column except treatment and outcome, in dataset order.
    fn covariate_names(&self) -> Vec<String> {
        self.data.names_except(&[&self.treatment, &self.outcome])
    }

    fn match_units(&self, estimand: &AdjustmentSet) -> Result<DVector<f64>> {
        let covariates = match self.config.matcher.covariates {
            CovariateSelection::AllColumns => self.covariate_names(),
            CovariateSelection::Estimand => estimand.as_slice().to_vec(),
        };
        let x = self.data.select(&covariates)?;
        let y = self.data.column(&self.outcome)?;
        let t = self.data.column(&self.treatment)?;

        let settings = &self.config.matcher;
        let mut matcher =
            MahalanobisMatcher::new(settings.n_neighbors)?.with_epsilon(settings.epsilon)?;
        if settings.use_outcome_model {
            let factory = self
                .model_factory
                .clone()
                .unwrap_or_else(|| perceptron_factory(self.config.outcome_model.clone()));
            matcher = matcher.with_outcome_model((*factory)(x.ncols()));
        }

        matcher.fit(&x, y, t, &self.config.training)?;
        matcher.predict(&x, t)
    }

    fn transition(&mut self, next: Stage) {
        debug!(
            from = self.stage.lifecycle().name(),
            to = next.lifecycle().name(),
            "Lifecycle transition"
        );
        self.stage = next;
    }
}
