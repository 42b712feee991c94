use proptest::prelude::*;

/// Property-based checks for identification and matching invariants.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::causal::{find_adjustment_set, satisfies_backdoor, CausalGraph, Combinations};
    use crate::estimators::{MahalanobisMatcher, DEFAULT_EPSILON};
    use crate::learning::TrainingParams;
    use crate::{
        CausalEffectEstimator, Dataset, EstimationMethod, EstimatorConfig, RefutationMethod,
    };
    use nalgebra::{DMatrix, DVector};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const NODES: [&str; 6] = ["T", "Y", "A", "B", "C", "D"];
    const CANDIDATES: [&str; 4] = ["A", "B", "C", "D"];

    fn graph_from(edges: &[(usize, usize)]) -> CausalGraph {
        let mut graph = CausalGraph::new();
        for &(from, to) in edges {
            graph.add_edge(NODES[from], NODES[to]);
        }
        graph
    }

    fn arb_edges() -> impl Strategy<Value = Vec<(usize, usize)>> {
        prop::collection::vec((0usize..6, 0usize..6), 0..14)
    }

    fn variance(xs: &[f64]) -> f64 {
        let mean = xs.iter().sum::<f64>() / xs.len() as f64;
        xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / xs.len() as f64
    }

    // =========================================================================
    // Adjustment search
    // =========================================================================
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn test_search_returns_a_smallest_valid_set(edges in arb_edges()) {
            let graph = graph_from(&edges);
            match find_adjustment_set(&graph, "T", "Y", &CANDIDATES) {
                Ok(set) => {
                    prop_assert!(satisfies_backdoor(&graph, "T", "Y", &set));
                    for size in 0..set.len() {
                        for combo in Combinations::new(CANDIDATES.len(), size) {
                            let smaller: Vec<&str> = combo.iter().map(|&i| CANDIDATES[i]).collect();
                            prop_assert!(!satisfies_backdoor(&graph, "T", "Y", &smaller));
                        }
                    }
                }
                Err(_) => {
                    // Failure means nothing at all satisfied the check
                    prop_assert!(!satisfies_backdoor(&graph, "T", "Y", &CANDIDATES[..]));
                }
            }
        }

        #[test]
        fn test_disjoint_successors_give_empty_set(edges in arb_edges()) {
            // Drop every edge out of Y so T and Y cannot share a successor
            let edges: Vec<_> = edges.into_iter().filter(|&(from, _)| from != 1).collect();
            let graph = graph_from(&edges);
            let set = find_adjustment_set(&graph, "T", "Y", &CANDIDATES).unwrap();
            prop_assert!(set.is_empty());
        }
    }

    // =========================================================================
    // Matcher
    // =========================================================================
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_full_population_effect_within_outcome_range(
            rows in prop::collection::vec((-10.0f64..10.0, -5.0f64..5.0, any::<bool>()), 3..12)
        ) {
            let xs: Vec<f64> = rows.iter().map(|r| r.0).collect();
            prop_assume!(variance(&xs) > 1e-6);

            let n = rows.len();
            let x = DMatrix::from_column_slice(n, 1, &xs);
            let y = DVector::from_iterator(n, rows.iter().map(|r| r.1));
            let t = DVector::from_iterator(n, rows.iter().map(|r| if r.2 { 1.0 } else { 0.0 }));

            let mut matcher = MahalanobisMatcher::new(n + 3).unwrap();
            matcher.fit(&x, &y, &t, &TrainingParams::default()).unwrap();
            let effects = matcher.predict(&x, &t).unwrap();

            let bound = y.iter().fold(0.0f64, |m, v| m.max(v.abs()));
            for i in 0..n {
                let (same, other): (Vec<usize>, Vec<usize>) = (0..n).partition(|&j| t[j] == t[i]);
                let expected = (same.iter().map(|&j| y[j]).sum::<f64>()
                    - other.iter().map(|&j| y[j]).sum::<f64>())
                    / (n as f64 + DEFAULT_EPSILON);
                prop_assert!((effects[i] - expected).abs() < 1e-9);
                prop_assert!(effects[i].abs() <= bound + 1e-9);
            }
        }
    }

    // =========================================================================
    // Orchestrator
    // =========================================================================
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn test_estimation_is_repeatable_and_refutation_has_same_length(seed in any::<u64>()) {
            use rand::Rng;
            let mut rng = StdRng::seed_from_u64(seed);
            let n = 12;
            let t: Vec<f64> = (0..n).map(|i| (i % 2) as f64).collect();
            let x: Vec<f64> = (0..n).map(|_| rng.gen_range(-3.0..3.0)).collect();
            let y: Vec<f64> = (0..n).map(|i| 2.0 * t[i] + x[i] + rng.gen_range(-0.1..0.1)).collect();
            prop_assume!(variance(&x) > 1e-6);

            let data = Dataset::new(vec![("T", t), ("Y", y), ("X", x)]).unwrap();
            let graph = CausalGraph::from_edges([("X", "T"), ("X", "Y"), ("T", "Y")]);

            let mut config = EstimatorConfig::default();
            config.matcher.n_neighbors = 3;
            config.training.epoch_count = 5;

            let mut est = CausalEffectEstimator::new(data, "T", "Y", Some(graph))
                .unwrap()
                .with_config(config)
                .unwrap();
            let first = est.estimate_effect(EstimationMethod::default()).unwrap();
            let second = est.estimate_effect(EstimationMethod::default()).unwrap();
            prop_assert_eq!(&first, &second);

            let result = est
                .refute_effect_with_rng(RefutationMethod::RandomCommonCause, &mut rng)
                .unwrap();
            prop_assert_eq!(result.estimate_with_random_common_cause.len(), first.len());
            prop_assert_eq!(result.original_estimate, first);
        }
    }
}
