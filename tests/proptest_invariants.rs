//! Property-based tests for the replication rules.

use std::sync::Arc;

use proptest::collection::vec as prop_vec;
use proptest::prelude::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use multiclass_reduce::data::{ColumnType, DataKind, InMemoryView, KeyRange, LabelValue, Scalar};
use multiclass_reduce::multiclass::{
    DerivedLabel, LabelHistogram, MultiplicationAlgorithm, ReplicationPolicy, MAX_REPLICA_LIMIT,
};
use multiclass_reduce::transforms::Conversion;

// =============================================================================
// Strategies
// =============================================================================

/// Class weights of a histogram with 1 to 12 classes.
fn arb_counts() -> impl Strategy<Value = Vec<f32>> {
    prop_vec(1u32..500, 1..12).prop_map(|v| v.into_iter().map(|c| c as f32).collect())
}

fn histogram(counts: &[f32]) -> LabelHistogram {
    LabelHistogram::from_counts(
        DataKind::F32,
        false,
        counts
            .iter()
            .enumerate()
            .map(|(i, &w)| (LabelValue::Float(i as f32), w)),
    )
    .unwrap()
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn reweight_count_stays_in_range(
        counts in arb_counts(),
        max_multi in 1.0f32..2000.0,
        freq in 0.0f32..1e6,
    ) {
        let max_multi = max_multi.min(MAX_REPLICA_LIMIT as f32);
        let policy = ReplicationPolicy::finalize(
            histogram(&counts),
            max_multi,
            MultiplicationAlgorithm::Reweight,
        )
        .unwrap();
        prop_assert!(policy.max_replica() >= 2);
        prop_assert!(policy.max_replica() <= MAX_REPLICA_LIMIT.max(2));
        prop_assert!(policy.reweight_count(freq) <= policy.max_replica());
    }

    #[test]
    fn full_enumeration_has_one_positive(counts in arb_counts(), truth in 0usize..12, seed: u64) {
        let truth = LabelValue::Float((truth % counts.len()) as f32);
        let policy = ReplicationPolicy::finalize(
            histogram(&counts),
            MAX_REPLICA_LIMIT as f32,
            MultiplicationAlgorithm::Default,
        )
        .unwrap();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut plan = Vec::new();
        policy.plan(truth, &mut rng, &mut plan).unwrap();

        prop_assert_eq!(plan.len(), counts.len());
        let positives = plan
            .iter()
            .filter(|r| r.derived == DerivedLabel::Match(true))
            .count();
        prop_assert_eq!(positives, 1);
        for r in &plan {
            prop_assert_eq!(r.derived == DerivedLabel::Match(true), r.label == truth);
        }
    }

    #[test]
    fn sampled_plans_have_max_replica_copies(counts in prop_vec(1u32..50, 5..12), seed: u64) {
        let counts: Vec<f32> = counts.into_iter().map(|c| c as f32).collect();
        let policy = ReplicationPolicy::finalize(
            histogram(&counts),
            3.0,
            MultiplicationAlgorithm::Ranking,
        )
        .unwrap();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut plan = Vec::new();
        policy.plan(LabelValue::Float(0.0), &mut rng, &mut plan).unwrap();
        prop_assert_eq!(plan.len(), 3);
        for r in &plan {
            let DerivedLabel::Rank(rank) = r.derived else {
                return Err(TestCaseError::fail("ranking plan without rank labels"));
            };
            prop_assert!(rank == 0 || rank == 4);
            prop_assert_eq!(rank == 4, r.label == LabelValue::Float(0.0));
        }
    }

    #[test]
    fn row_ids_do_not_collide(base in 0u64..1 << 40, max_multi in 2.0f32..64.0) {
        let counts = vec![1.0; 64];
        let policy = ReplicationPolicy::finalize(
            histogram(&counts),
            max_multi,
            MultiplicationAlgorithm::Default,
        )
        .unwrap();
        let base = u128::from(base);
        let last = policy.row_id(base, policy.max_replica());
        prop_assert!(last < policy.row_id(base + 1, 0));
        prop_assert_eq!(last >> policy.shift(), base);
    }

    #[test]
    fn key_float_round_trip(raw in 0u32..=100) {
        let key = ColumnType::key(DataKind::U32, KeyRange::new(100));
        let to_float = Conversion::resolve(key, ColumnType::f32()).unwrap();
        let to_key = Conversion::resolve(ColumnType::f32(), key).unwrap();

        let f = to_float.apply(Scalar::U32(raw)).unwrap();
        prop_assert_eq!(raw == 0, f.as_f32().is_nan());
        prop_assert_eq!(to_key.apply(f).unwrap(), Scalar::U32(raw));
    }

    #[test]
    fn parallel_histogram_matches_sequential(
        labels in prop_vec(1u32..=6, 1..200),
        n_threads in 2usize..6,
    ) {
        let view = InMemoryView::builder()
            .add_key_u32("Label", labels.clone(), KeyRange::new(6))
            .build()
            .unwrap();
        let view: Arc<dyn multiclass_reduce::DataView> = Arc::new(view);

        let seq = LabelHistogram::build(view.as_ref(), 0, None, Some(1)).unwrap();
        let par = LabelHistogram::build(view.as_ref(), 0, None, Some(n_threads)).unwrap();
        prop_assert_eq!(&seq, &par);
        prop_assert_eq!(seq.n_rows(), labels.len());
        let total: f32 = seq.iter().map(|(_, w)| w).sum();
        prop_assert_eq!(total, labels.len() as f32);
    }
}
