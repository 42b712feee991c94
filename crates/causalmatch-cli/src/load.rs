//! File loaders: CSV datasets, TOML graphs and estimator configuration.

use causalmatch_core::{CausalGraph, ConfigError, Dataset, EstimatorConfig};
use std::error::Error;
use std::fs;
use std::io::Read;
use std::path::Path;

/// Read a headed CSV whose fields all parse as `f64`.
pub fn read_dataset<P: AsRef<Path>>(path: P) -> Result<Dataset, Box<dyn Error>> {
    let file = fs::File::open(path.as_ref())?;
    parse_dataset(file)
}

pub fn parse_dataset<R: Read>(input: R) -> Result<Dataset, Box<dyn Error>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        for (col, field) in record.iter().enumerate() {
            let value: f64 = field.parse().map_err(|_| {
                format!(
                    "row {}, column '{}': '{}' is not a number",
                    row + 1,
                    headers[col],
                    field
                )
            })?;
            columns[col].push(value);
        }
    }

    Ok(Dataset::new(headers.into_iter().zip(columns))?)
}

/// Read a graph written as `edges = [["cause", "effect"], ...]`.
pub fn read_graph<P: AsRef<Path>>(path: P) -> Result<CausalGraph, Box<dyn Error>> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// An explicit `--config` path must exist; without one, built-in defaults
/// plus `CAUSALMATCH_*` overrides apply.
pub fn read_config(path: Option<&Path>) -> Result<EstimatorConfig, ConfigError> {
    match path {
        Some(path) => EstimatorConfig::from_file_with_env(path),
        None => EstimatorConfig::load_layered(None, None),
    }
}
