#[cfg(test)]
mod tests {
    use crate::config::*;
    use crate::learning::Activation;
    use std::env;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Tests that read or write CAUSALMATCH_* variables hold this lock
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config_valid() {
        let config = EstimatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.matcher.n_neighbors, 1);
        assert!(config.matcher.use_outcome_model);
        assert_eq!(config.matcher.covariates, CovariateSelection::AllColumns);
        assert_eq!(config.training.epoch_count, 1000);
        assert_eq!(config.training.batch_size, 32);
        assert_eq!(config.outcome_model.hidden_layer_sizes, vec![10]);
        assert_eq!(config.refutation.column_name, "random_common_cause");
    }

    #[test]
    fn test_config_validation_matcher() {
        let mut config = EstimatorConfig::default();
        config.matcher.n_neighbors = 0;
        assert!(config.validate().is_err());

        config.matcher.n_neighbors = 3;
        config.matcher.epsilon = 0.0;
        assert!(config.validate().is_err());

        config.matcher.epsilon = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_training() {
        let mut config = EstimatorConfig::default();
        config.training.momentum = 1.0;
        assert!(config.validate().is_err());

        config.training.momentum = 0.9;
        config.training.batch_size = 0;
        assert!(config.validate().is_err());

        config.training.batch_size = 8;
        config.training.learning_rate = -0.1;
        assert!(config.validate().is_err());

        config.training.learning_rate = 0.01;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_outcome_model_and_refutation() {
        let mut config = EstimatorConfig::default();
        config.outcome_model.hidden_layer_sizes = vec![4, 0];
        assert!(config.validate().is_err());

        config.outcome_model.hidden_layer_sizes = vec![4];
        config.outcome_model.weight_decay = -1.0;
        assert!(config.validate().is_err());

        config.outcome_model.weight_decay = 0.0;
        config.refutation.column_name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_to_toml_string() {
        let toml_str = EstimatorConfig::default().to_toml_string().unwrap();

        assert!(toml_str.contains("[matcher]"));
        assert!(toml_str.contains("[outcome_model]"));
        assert!(toml_str.contains("[training]"));
        assert!(toml_str.contains("n_neighbors"));
        assert!(toml_str.contains("all_columns"));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let toml_str = r#"
            [matcher]
            n_neighbors = 5
            use_outcome_model = false
            epsilon = 1e-6
            covariates = "estimand"

            [outcome_model]
            hidden_layer_sizes = [8, 4]
            activation = "tanh"
            weight_decay = 0.001
            add_bias = true
            seed = 7

            [refutation]
            seed = 11
            column_name = "noise"
        "#;

        let config: EstimatorConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.matcher.n_neighbors, 5);
        assert_eq!(config.matcher.covariates, CovariateSelection::Estimand);
        assert_eq!(config.outcome_model.activation, Activation::Tanh);
        assert_eq!(config.refutation.seed, Some(11));
        // [training] omitted entirely
        assert_eq!(config.training.learning_rate, 1e-4);
    }

    #[test]
    fn test_incomplete_section_is_rejected() {
        let toml_str = r#"
            [matcher]
            n_neighbors = 5
        "#;
        let result: Result<EstimatorConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let mut config = EstimatorConfig::default();
        config.matcher.n_neighbors = 4;
        config.refutation.seed = Some(99);

        let temp_file = NamedTempFile::new().unwrap();
        config.save_to_file(temp_file.path()).unwrap();

        let loaded = EstimatorConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_config_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("CAUSALMATCH_MATCHER_N_NEIGHBORS", "7");
        env::set_var("CAUSALMATCH_MATCHER_USE_OUTCOME_MODEL", "false");
        env::set_var("CAUSALMATCH_OUTCOME_MODEL_ACTIVATION", "relu");
        env::set_var("CAUSALMATCH_REFUTATION_SEED", "123");
        env::set_var("CAUSALMATCH_MATCHER_COVARIATES", "estimand");
        env::set_var("CAUSALMATCH_TRAINING_EPOCH_REPORT_INTERVAL", "25");
        env::set_var("CAUSALMATCH_OUTCOME_MODEL_WEIGHT_DECAY", "0.01");
        env::set_var("CAUSALMATCH_REFUTATION_COLUMN_NAME", "noise");

        let mut config = EstimatorConfig::default();
        config.apply_env_overrides().unwrap();

        assert_eq!(config.matcher.n_neighbors, 7);
        assert!(!config.matcher.use_outcome_model);
        assert_eq!(config.matcher.covariates, CovariateSelection::Estimand);
        assert_eq!(config.training.epoch_report_interval, 25);
        assert_eq!(config.outcome_model.activation, Activation::Relu);
        assert_eq!(config.outcome_model.weight_decay, 0.01);
        assert_eq!(config.refutation.seed, Some(123));
        assert_eq!(config.refutation.column_name, "noise");
        for key in [
            "CAUSALMATCH_MATCHER_COVARIATES",
            "CAUSALMATCH_TRAINING_EPOCH_REPORT_INTERVAL",
            "CAUSALMATCH_OUTCOME_MODEL_WEIGHT_DECAY",
            "CAUSALMATCH_REFUTATION_COLUMN_NAME",
        ] {
            env::remove_var(key);
        }

        // Malformed values are reported, not ignored
        env::set_var("CAUSALMATCH_TRAINING_MOMENTUM", "invalid");
        let mut config = EstimatorConfig::default();
        assert!(config.apply_env_overrides().is_err());

        env::remove_var("CAUSALMATCH_MATCHER_N_NEIGHBORS");
        env::remove_var("CAUSALMATCH_MATCHER_USE_OUTCOME_MODEL");
        env::remove_var("CAUSALMATCH_OUTCOME_MODEL_ACTIVATION");
        env::remove_var("CAUSALMATCH_REFUTATION_SEED");
        env::remove_var("CAUSALMATCH_TRAINING_MOMENTUM");
    }

    #[test]
    fn test_config_layered_loading() {
        let _guard = ENV_LOCK.lock().unwrap();
        let default_file = NamedTempFile::new().unwrap();
        let user_file = NamedTempFile::new().unwrap();

        EstimatorConfig::default()
            .save_to_file(default_file.path())
            .unwrap();

        let mut user_config = EstimatorConfig::default();
        user_config.matcher.n_neighbors = 3;
        user_config.training.epoch_count = 50;
        user_config.save_to_file(user_file.path()).unwrap();

        let loaded =
            EstimatorConfig::load_layered(Some(default_file.path()), Some(user_file.path()))
                .unwrap();

        assert_eq!(loaded.matcher.n_neighbors, 3);
        assert_eq!(loaded.training.epoch_count, 50);
    }

    #[test]
    fn test_config_file_not_found() {
        let result = EstimatorConfig::from_file("nonexistent.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");

        // Optional layers skip absent files; an explicit path does not
        assert!(EstimatorConfig::load_layered(None, Some(&missing)).is_ok());
        let result = EstimatorConfig::from_file_with_env(&missing);
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_unicode_env_value() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var(
            "CAUSALMATCH_MATCHER_N_NEIGHBORS",
            OsStr::from_bytes(&[0x66, 0x6f, 0x80]),
        );
        let mut config = EstimatorConfig::default();
        let result = config.apply_env_overrides();
        env::remove_var("CAUSALMATCH_MATCHER_N_NEIGHBORS");

        assert!(matches!(result, Err(ConfigError::EnvVar(_))));
    }

    #[test]
    fn test_covariate_selection_from_str() {
        assert_eq!(
            "all_columns".parse::<CovariateSelection>().unwrap(),
            CovariateSelection::AllColumns
        );
        assert!("adjusted".parse::<CovariateSelection>().is_err());
    }

    #[test]
    fn test_invalid_toml_syntax() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "invalid toml: syntax").unwrap();

        let result = EstimatorConfig::from_file(temp_file.path());
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }
}
