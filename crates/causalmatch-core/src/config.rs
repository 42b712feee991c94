use serde::{Deserialize, Serialize};
use std::fs;
use std::env::{self, VarError};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::estimators::DEFAULT_EPSILON;
use crate::learning::{PerceptronConfig, TrainingParams};

/// Column name of the synthetic covariate added during refutation.
pub const DEFAULT_RANDOM_COLUMN: &str = "random_common_cause";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] VarError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub outcome_model: PerceptronConfig,
    #[serde(default)]
    pub training: TrainingParams,
    #[serde(default)]
    pub refutation: RefutationConfig,
}

/// Which columns the matcher measures distance over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovariateSelection {
    /// Every column except treatment and outcome
    #[default]
    AllColumns,
    /// Only the identified adjustment set
    Estimand,
}

impl FromStr for CovariateSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all_columns" => Ok(CovariateSelection::AllColumns),
            "estimand" => Ok(CovariateSelection::Estimand),
            other => Err(format!("unknown covariate selection '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Neighbors per query unit (clamped to the population size)
    pub n_neighbors: usize,
    /// Replace observed outcomes with outcome-model predictions
    pub use_outcome_model: bool,
    /// Added to the neighbor count in the effect denominator
    pub epsilon: f64,
    pub covariates: CovariateSelection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefutationConfig {
    /// Fixed seed for the synthetic covariate; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
    pub column_name: String,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 1,
            use_outcome_model: true,
            epsilon: DEFAULT_EPSILON,
            covariates: CovariateSelection::AllColumns,
        }
    }
}

impl Default for RefutationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            column_name: DEFAULT_RANDOM_COLUMN.to_string(),
        }
    }
}

impl EstimatorConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: EstimatorConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    /// Variables are prefixed with `CAUSALMATCH_`, e.g.
    /// `CAUSALMATCH_MATCHER_N_NEIGHBORS=3`.
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. User config file (if exists)
    /// 3. Default config file
    /// 4. Built-in defaults (lowest priority)
    pub fn load_layered(
        default_path: Option<&Path>,
        user_path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let mut config = EstimatorConfig::default();

        if let Some(path) = default_path {
            if path.exists() {
                config = Self::from_file(path)?;
            }
        }

        if let Some(path) = user_path {
            if path.exists() {
                let user_config = Self::from_file(path)?;
                config = config.merge(user_config);
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Whole-section replacement; `other` wins.
    fn merge(self, other: EstimatorConfig) -> Self {
        other
    }

    /// Apply environment variable overrides. Every scalar key has a
    /// `CAUSALMATCH_<SECTION>_<KEY>` variable; `hidden_layer_sizes` is
    /// file-only.
    pub(crate) fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // Matcher
        env_override("CAUSALMATCH_MATCHER_N_NEIGHBORS", &mut self.matcher.n_neighbors)?;
        env_override(
            "CAUSALMATCH_MATCHER_USE_OUTCOME_MODEL",
            &mut self.matcher.use_outcome_model,
        )?;
        env_override("CAUSALMATCH_MATCHER_EPSILON", &mut self.matcher.epsilon)?;
        env_override("CAUSALMATCH_MATCHER_COVARIATES", &mut self.matcher.covariates)?;

        // Training
        env_override("CAUSALMATCH_TRAINING_EPOCH_COUNT", &mut self.training.epoch_count)?;
        env_override("CAUSALMATCH_TRAINING_BATCH_SIZE", &mut self.training.batch_size)?;
        env_override(
            "CAUSALMATCH_TRAINING_LEARNING_RATE",
            &mut self.training.learning_rate,
        )?;
        env_override("CAUSALMATCH_TRAINING_MOMENTUM", &mut self.training.momentum)?;
        env_override(
            "CAUSALMATCH_TRAINING_EPOCH_REPORT_INTERVAL",
            &mut self.training.epoch_report_interval,
        )?;

        // Outcome model
        env_override(
            "CAUSALMATCH_OUTCOME_MODEL_ACTIVATION",
            &mut self.outcome_model.activation,
        )?;
        env_override(
            "CAUSALMATCH_OUTCOME_MODEL_WEIGHT_DECAY",
            &mut self.outcome_model.weight_decay,
        )?;
        env_override("CAUSALMATCH_OUTCOME_MODEL_ADD_BIAS", &mut self.outcome_model.add_bias)?;
        env_override("CAUSALMATCH_OUTCOME_MODEL_SEED", &mut self.outcome_model.seed)?;

        // Refutation
        if let Some(val) = env_value("CAUSALMATCH_REFUTATION_SEED")? {
            self.refutation.seed = Some(val.parse().map_err(|_| {
                ConfigError::Validation("Invalid CAUSALMATCH_REFUTATION_SEED".to_string())
            })?);
        }
        env_override(
            "CAUSALMATCH_REFUTATION_COLUMN_NAME",
            &mut self.refutation.column_name,
        )?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Matcher validation
        if self.matcher.n_neighbors == 0 {
            return Err(ConfigError::Validation(
                "matcher.n_neighbors must be >= 1".to_string(),
            ));
        }
        if !(self.matcher.epsilon.is_finite() && self.matcher.epsilon > 0.0) {
            return Err(ConfigError::Validation(
                "matcher.epsilon must be positive and finite".to_string(),
            ));
        }

        // Training validation
        let training = &self.training;
        if training.epoch_count == 0 {
            return Err(ConfigError::Validation(
                "training.epoch_count must be >= 1".to_string(),
            ));
        }
        if training.batch_size == 0 {
            return Err(ConfigError::Validation(
                "training.batch_size must be >= 1".to_string(),
            ));
        }
        if !(training.learning_rate.is_finite() && training.learning_rate > 0.0) {
            return Err(ConfigError::Validation(
                "training.learning_rate must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&training.momentum) {
            return Err(ConfigError::Validation(
                "training.momentum must be in [0, 1)".to_string(),
            ));
        }
        if training.epoch_report_interval == 0 {
            return Err(ConfigError::Validation(
                "training.epoch_report_interval must be >= 1".to_string(),
            ));
        }

        // Outcome model validation
        let decay = self.outcome_model.weight_decay;
        if decay.is_nan() || decay < 0.0 {
            return Err(ConfigError::Validation(
                "outcome_model.weight_decay must be >= 0".to_string(),
            ));
        }
        if self.outcome_model.hidden_layer_sizes.iter().any(|&h| h == 0) {
            return Err(ConfigError::Validation(
                "outcome_model.hidden_layer_sizes must all be >= 1".to_string(),
            ));
        }

        // Refutation validation
        if self.refutation.column_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "refutation.column_name must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Export configuration to TOML string
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = self
            .to_toml_string()
            .map_err(|e| ConfigError::Validation(format!("TOML serialization error: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// `None` when unset; non-UTF-8 values are an error rather than "unset".
fn env_value(key: &str) -> Result<Option<String>, ConfigError> {
    match env::var(key) {
        Ok(val) => Ok(Some(val)),
        Err(VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::EnvVar(e)),
    }
}

fn env_override<T: FromStr>(key: &str, target: &mut T) -> Result<(), ConfigError> {
    if let Some(val) = env_value(key)? {
        *target = val
            .parse()
            .map_err(|_| ConfigError::Validation(format!("Invalid {}", key)))?;
    }
    Ok(())
}
