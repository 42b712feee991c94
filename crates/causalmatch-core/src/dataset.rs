use nalgebra::{DMatrix, DVector};
use std::collections::HashSet;

use crate::error::{CausalError, Result};

/// Tabular observational data: named numeric columns of equal length.
///
/// Rows are independent units. The column order is significant: it fixes the
/// variable ordering used by adjustment-set search and the column order of
/// covariate matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    names: Vec<String>,
    columns: Vec<DVector<f64>>,
    n_rows: usize,
}

impl Dataset {
    /// Build a dataset from `(name, values)` pairs.
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let mut names = Vec::new();
        let mut values = Vec::new();
        let mut seen = HashSet::new();

        for (name, column) in columns {
            let name = name.into();
            if !seen.insert(name.clone()) {
                return Err(CausalError::DuplicateColumn { name });
            }
            names.push(name);
            values.push(DVector::from_vec(column));
        }

        let Some(first) = values.first() else {
            return Err(CausalError::insufficient_data("dataset has no columns"));
        };
        let n_rows = first.len();
        for column in &values {
            if column.len() != n_rows {
                return Err(CausalError::shape("dataset column length", n_rows, column.len()));
            }
        }

        Ok(Self {
            names,
            columns: values,
            n_rows,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.names.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn column(&self, name: &str) -> Result<&DVector<f64>> {
        self.position(name)
            .map(|i| &self.columns[i])
            .ok_or_else(|| CausalError::UnknownColumn {
                name: name.to_string(),
            })
    }

    /// Column names in dataset order, skipping `excluded`.
    pub fn names_except(&self, excluded: &[&str]) -> Vec<String> {
        self.names
            .iter()
            .filter(|n| !excluded.contains(&n.as_str()))
            .cloned()
            .collect()
    }

    /// Stack the named columns into an `n_rows x names.len()` matrix.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<DMatrix<f64>> {
        let columns = names
            .iter()
            .map(|n| self.column(n.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(DMatrix::from_fn(self.n_rows, columns.len(), |r, c| {
            columns[c][r]
        }))
    }

    /// Copy of this dataset with `name` set to `values`.
    ///
    /// The column is appended, or replaced in place if it already exists.
    pub fn with_column<S: Into<String>>(&self, name: S, values: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if values.len() != self.n_rows {
            return Err(CausalError::shape(
                format!("column '{}'", name),
                self.n_rows,
                values.len(),
            ));
        }

        let mut copy = self.clone();
        let column = DVector::from_vec(values);
        match copy.position(&name) {
            Some(i) => copy.columns[i] = column,
            None => {
                copy.names.push(name);
                copy.columns.push(column);
            }
        }
        Ok(copy)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}
