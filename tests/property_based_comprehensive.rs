//! Property-based tests for the regression gate
//!
//! Core properties:
//! 1. Summary statistics are internally consistent for any valid sample set
//! 2. Baselines survive a save/load cycle exactly
//! 3. The threshold strategy is monotonic in the current mean
//! 4. Neither strategy flags a run that is not slower than its baseline
//! 5. Welch p-values stay in [0, 1]

use gpuperf::measurement::{MeasurementSet, Sample, WorkloadConfig};
use gpuperf::regression::{
    compare, compare_statistical, welch_one_tailed, RegressionConfig, Verdict,
};
use gpuperf::store::BaselineStore;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn build(durations: &[f64]) -> MeasurementSet {
    let samples = durations.iter().map(|d| Sample::new(*d)).collect();
    MeasurementSet::build(samples, "gpu0", WorkloadConfig::new("matmul")).unwrap()
}

fn arb_durations(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.001f64..1.0e6, 1..max_len)
}

fn arb_sample() -> impl Strategy<Value = Sample> {
    (
        0.0f64..1.0e4,
        prop::collection::btree_map("[a-z_]{1,12}", -1.0e3f64..1.0e3, 0..4),
    )
        .prop_map(|(duration_ms, metrics): (f64, BTreeMap<String, f64>)| Sample {
            duration_ms,
            metrics,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_summary_is_consistent(durations in arb_durations(100)) {
        let set = build(&durations);

        prop_assert_eq!(set.count(), durations.len());
        prop_assert!(set.min() <= set.mean() && set.mean() <= set.max());
        prop_assert!(set.min() <= set.max());
        prop_assert!(set.std_dev() >= 0.0);
        prop_assert!(set.std_dev().is_finite());
        if durations.len() == 1 {
            prop_assert_eq!(set.std_dev(), 0.0);
            prop_assert_eq!(set.mean(), durations[0]);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_store_roundtrip_is_exact(
        samples in prop::collection::vec(arb_sample(), 1..30),
        device in "[A-Za-z0-9 ]{1,24}",
        dims in prop::collection::vec(1u64..8192, 0..4),
    ) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = BaselineStore::new(dir.path());
        let workload = WorkloadConfig::new("conv2d").with_dimensions(dims);
        let set = MeasurementSet::build(samples, device, workload).unwrap();

        store.save(&set).unwrap();
        let loaded = store.load(&set.identity()).unwrap();
        prop_assert_eq!(loaded, set);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_threshold_is_monotonic(
        baseline_ms in 0.1f64..1000.0,
        threshold in 0.001f64..1.0,
        a in 0.1f64..2000.0,
        b in 0.1f64..2000.0,
    ) {
        let baseline = build(&[baseline_ms]);
        let (low, high) = if a <= b { (a, b) } else { (b, a) };

        let low_verdict = compare(&build(&[low]), &baseline, threshold).unwrap();
        let high_verdict = compare(&build(&[high]), &baseline, threshold).unwrap();

        if low_verdict.verdict == Verdict::Fail {
            prop_assert_eq!(high_verdict.verdict, Verdict::Fail);
        }
    }

    #[test]
    fn prop_not_slower_never_fails(
        baseline in prop::collection::vec(1.0f64..1000.0, 1..40),
        scale in 0.5f64..1.0,
    ) {
        let baseline = build(&baseline);
        let current: Vec<f64> = baseline.samples().iter().map(|s| s.duration_ms * scale).collect();
        let current = build(&current);

        let threshold = compare(&current, &baseline, 0.05).unwrap();
        prop_assert_eq!(threshold.verdict, Verdict::Pass);

        let statistical =
            compare_statistical(&current, &baseline, &RegressionConfig::default()).unwrap();
        prop_assert_eq!(statistical.verdict, Verdict::Pass);
    }

    #[test]
    fn prop_welch_handles_sub_f32_jitter(
        base in 1.0e4f64..1.0e6,
        jitter in prop::collection::vec(0.0f64..1.0e-3, 3..20),
        shift in 0.0f64..1.0e-3,
    ) {
        let baseline: Vec<f64> = jitter.iter().map(|j| base + j).collect();
        let current: Vec<f64> = jitter.iter().rev().map(|j| base + shift + j).collect();
        let (current, baseline) = (build(&current), build(&baseline));
        prop_assume!(current.variance() > 0.0 || baseline.variance() > 0.0);

        let verdict = compare_statistical(&current, &baseline, &RegressionConfig::default());
        prop_assert!(verdict.is_ok(), "valid input rejected: {:?}", verdict);
    }

    #[test]
    fn prop_welch_p_value_in_unit_interval(
        current in prop::collection::vec(1.0f64..100.0, 2..40),
        baseline in prop::collection::vec(1.0f64..100.0, 2..40),
    ) {
        let current = build(&current);
        let baseline = build(&baseline);
        prop_assume!(current.variance() > 0.0 || baseline.variance() > 0.0);

        let welch = welch_one_tailed(&current, &baseline);
        prop_assert!(welch.is_ok(), "valid input rejected: {:?}", welch);
        let welch = welch.unwrap();
        prop_assert!((0.0..=1.0).contains(&welch.p_value));
        prop_assert!(welch.degrees_of_freedom > 0.0);
    }
}
