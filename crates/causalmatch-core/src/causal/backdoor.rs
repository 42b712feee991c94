//! Backdoor admissibility check over direct successor lists.
//!
//! This is a local approximation of Pearl's backdoor criterion: it only looks
//! at the immediate successors of the treatment, the outcome and the members
//! of the candidate set. No ancestor/descendant closure and no d-separation
//! is computed; adjustment-set search depends on this exact behavior.

use super::graph::CausalGraph;

/// A candidate covariate set, kept in the order its members were enumerated.
pub trait CandidateSet {
    fn contains_variable(&self, name: &str) -> bool;
    fn variables(&self) -> Vec<&str>;
}

impl<S: AsRef<str>> CandidateSet for [S] {
    fn contains_variable(&self, name: &str) -> bool {
        self.iter().any(|v| v.as_ref() == name)
    }

    fn variables(&self) -> Vec<&str> {
        self.iter().map(AsRef::as_ref).collect()
    }
}

impl<S: AsRef<str>> CandidateSet for Vec<S> {
    fn contains_variable(&self, name: &str) -> bool {
        self.as_slice().contains_variable(name)
    }

    fn variables(&self) -> Vec<&str> {
        self.as_slice().variables()
    }
}

/// Whether conditioning on `candidate` closes the backdoor paths between
/// `treatment` and `outcome`, as judged from direct successors.
///
/// Fails when
/// 1. a successor of the treatment lies outside the set and is also a
///    successor of the outcome, or
/// 2. a successor of the treatment lies outside the set and is also a
///    successor of some member of the set.
pub fn satisfies_backdoor<Z>(
    graph: &CausalGraph,
    treatment: &str,
    outcome: &str,
    candidate: &Z,
) -> bool
where
    Z: CandidateSet + ?Sized,
{
    let treatment_effects = graph.edges_from(treatment);

    for node in &treatment_effects {
        if !candidate.contains_variable(node) && graph.has_edge(outcome, node) {
            return false;
        }
    }

    for z in candidate.variables() {
        for common in &treatment_effects {
            if !candidate.contains_variable(common) && graph.has_edge(z, common) {
                return false;
            }
        }
    }

    true
}
