use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use super::backdoor::{satisfies_backdoor, CandidateSet};
use super::graph::CausalGraph;
use crate::error::{CausalError, Result};

/// Covariate set selected by identification (the estimand).
///
/// Members keep the order of the variable list they were drawn from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentSet {
    variables: Vec<String>,
}

impl AdjustmentSet {
    pub fn new<I, S>(variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            variables: variables.into_iter().map(Into::into).collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.variables
    }
}

impl CandidateSet for AdjustmentSet {
    fn contains_variable(&self, name: &str) -> bool {
        self.contains(name)
    }

    fn variables(&self) -> Vec<&str> {
        self.iter().collect()
    }
}

impl fmt::Display for AdjustmentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.variables.join(", "))
    }
}

/// Lexicographic k-combinations of `0..n`, yielded as index vectors.
///
/// `Combinations::new(4, 2)` yields `[0,1] [0,2] [0,3] [1,2] [1,3] [2,3]`.
/// `k == 0` yields a single empty combination; `k > n` yields nothing.
#[derive(Debug, Clone)]
pub struct Combinations {
    n: usize,
    indices: Vec<usize>,
    first: bool,
    done: bool,
}

impl Combinations {
    pub fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            indices: (0..k).collect(),
            first: true,
            done: k > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.first {
            self.first = false;
            return Some(self.indices.clone());
        }

        let k = self.indices.len();
        // Rightmost position that can still be advanced
        let mut i = k;
        while i > 0 {
            i -= 1;
            if self.indices[i] != i + self.n - k {
                self.indices[i] += 1;
                for j in i + 1..k {
                    self.indices[j] = self.indices[j - 1] + 1;
                }
                return Some(self.indices.clone());
            }
        }

        self.done = true;
        None
    }
}

/// Smallest covariate set satisfying the backdoor check.
///
/// Subsets of `variables` are tried by increasing cardinality, from the empty
/// set up to the full list, and within one cardinality in lexicographic order
/// of the input ordering. The first admissible subset wins. Cost is `2^k` in
/// the number of variables; callers bound `k`.
pub fn find_adjustment_set<S: AsRef<str>>(
    graph: &CausalGraph,
    treatment: &str,
    outcome: &str,
    variables: &[S],
) -> Result<AdjustmentSet> {
    let names: Vec<&str> = variables.iter().map(AsRef::as_ref).collect();

    for size in 0..=names.len() {
        let mut tried = 0usize;
        for combo in Combinations::new(names.len(), size) {
            tried += 1;
            let candidate: Vec<&str> = combo.iter().map(|&i| names[i]).collect();
            if satisfies_backdoor(graph, treatment, outcome, &candidate) {
                let set = AdjustmentSet::new(candidate);
                info!(
                    treatment,
                    outcome,
                    size,
                    "Adjustment set found: {}",
                    set
                );
                return Ok(set);
            }
        }
        debug!(size, tried, "No admissible covariate set of this size");
    }

    Err(CausalError::NoValidAdjustmentSet {
        treatment: treatment.to_string(),
        outcome: outcome.to_string(),
        candidates: names.len(),
    })
}
