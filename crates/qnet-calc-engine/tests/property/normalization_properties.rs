//! ---
//! qnet_section: "08-queueing-models"
//! qnet_subsection: "module"
//! qnet_type: "source"
//! qnet_scope: "code"
//! qnet_description: "Normalization constants and performance metrics for closed queueing networks."
//! qnet_version: "v0.0.0-prealpha"
//! qnet_owner: "tbd"
//! ---
use proptest::prelude::*;
use qnet_calc_engine::{
    compute_normalization, compute_table, expected_length, normalization::ScalingPolicy,
    prob_at_least, prob_exactly, CalcEngineError, NumericalError,
};

/// Sums `prod X_i^{k_i}` over every composition of `n` into `loads.len()` parts.
fn enumerate(loads: &[f64], n: usize) -> f64 {
    match loads.split_first() {
        None => {
            if n == 0 {
                1.0
            } else {
                0.0
            }
        }
        Some((&x, rest)) => (0..=n)
            .map(|k| x.powi(k as i32) * enumerate(rest, n - k))
            .sum(),
    }
}

fn loads_strategy(max_queues: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0f64..4.0, 1..=max_queues)
}

fn close(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance * a.abs().max(b.abs()).max(f64::MIN_POSITIVE)
}

proptest! {
    #[test]
    fn first_entry_is_always_one(loads in loads_strategy(8), n in 0usize..40) {
        let g = compute_normalization(&loads, n).unwrap();
        prop_assert_eq!(g.len(), n + 1);
        prop_assert_eq!(g[0], 1.0);
    }

    #[test]
    fn matches_brute_force_enumeration(loads in loads_strategy(4), n in 0usize..=12) {
        let g = compute_normalization(&loads, n).unwrap();
        let expected = enumerate(&loads, n);
        prop_assert!(close(g[n], expected, 1e-9), "recurrence {} vs enumeration {}", g[n], expected);
    }

    #[test]
    fn queue_order_does_not_matter(loads in loads_strategy(6), n in 0usize..30) {
        let forward = compute_normalization(&loads, n).unwrap();
        let mut reversed = loads.clone();
        reversed.reverse();
        let backward = compute_normalization(&reversed, n).unwrap();
        let mut sorted = loads.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let ascending = compute_normalization(&sorted, n).unwrap();
        prop_assert!(close(forward[n], backward[n], 1e-9));
        prop_assert!(close(forward[n], ascending[n], 1e-9));
    }

    #[test]
    fn every_queue_holds_at_least_zero_jobs(loads in loads_strategy(5), n in 0usize..20) {
        let table = compute_table(&loads, n, ScalingPolicy::Direct).unwrap();
        prop_assume!(table.g(n) > 0.0);
        for &x in &loads {
            prop_assert_eq!(prob_at_least(&table, x, 0).unwrap(), 1.0);
        }
    }

    #[test]
    fn point_masses_form_a_distribution(loads in prop::collection::vec(0.1f64..3.0, 1..5), n in 0usize..20) {
        for policy in [ScalingPolicy::Direct, ScalingPolicy::rescale(), ScalingPolicy::LogDomain] {
            let table = compute_table(&loads, n, policy).unwrap();
            for &x in &loads {
                let total: f64 = (0..=n).map(|k| prob_exactly(&table, x, k).unwrap()).sum();
                prop_assert!((total - 1.0).abs() < 1e-9, "{} sums to {}", policy, total);
            }
        }
    }

    #[test]
    fn scaled_policies_track_direct(loads in prop::collection::vec(0.1f64..5.0, 1..6), n in 1usize..30) {
        let direct = compute_normalization(&loads, n).unwrap();
        for policy in [ScalingPolicy::Rescale { threshold: 16.0 }, ScalingPolicy::LogDomain] {
            let table = compute_table(&loads, n, policy).unwrap();
            prop_assert!(close(table.g(n), direct[n], 1e-9));
            prop_assert!(close(table.g(n - 1), direct[n - 1], 1e-9));
        }
    }

    #[test]
    fn deep_rescaling_matches_log_domain_or_fails(
        queues in 50usize..400,
        base in 1.0f64..2.0,
        heavy in 10.0f64..200.0,
        n in 20usize..200,
    ) {
        let mut loads = vec![base; queues];
        loads.push(heavy);
        let log = compute_table(&loads, n, ScalingPolicy::LogDomain).unwrap();
        match compute_table(&loads, n, ScalingPolicy::Rescale { threshold: 1e10 }) {
            Ok(rescaled) => {
                prop_assert!(close(rescaled.ln_g(n), log.ln_g(n), 1e-9));
                prop_assert!(close(
                    expected_length(&rescaled, heavy).unwrap(),
                    expected_length(&log, heavy).unwrap(),
                    1e-7
                ));
                for k in [1, n - 1, n] {
                    let p = prob_at_least(&rescaled, heavy, k).unwrap();
                    prop_assert!((0.0..=1.0 + 1e-12).contains(&p), "P(>={}) = {}", k, p);
                    prop_assert!(close(p, prob_at_least(&log, heavy, k).unwrap(), 1e-7));
                }
            }
            Err(err) => prop_assert!(
                matches!(err, CalcEngineError::Numerical(NumericalError::ScaleUnderflow { .. })),
                "unexpected error {}", err
            ),
        }
    }
}
