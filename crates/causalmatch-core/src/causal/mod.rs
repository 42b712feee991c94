//! Causal identification: graph, backdoor check and adjustment-set search.

pub mod adjustment;
pub mod backdoor;
pub mod graph;

pub use adjustment::{find_adjustment_set, AdjustmentSet, Combinations};
pub use backdoor::{satisfies_backdoor, CandidateSet};
pub use graph::{CausalGraph, GraphDocument};
