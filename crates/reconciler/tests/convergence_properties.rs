//! Property tests for convergence.
//!
//! Whatever owned and foreign tasks the store starts with, one apply brings
//! the owned tasks in line with the policy, and a second run is a no-op.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use proptest::prelude::*;
use serde_json::{Value, json};
use tiersync_core::naming::{naming_schema, tier_prefix};
use tiersync_core::{ExecutionMode, ResourceKind, RetentionMap, Tier};
use tiersync_reconciler::{InMemoryStore, SnapshotPolicyManager};

const DATASET: &str = "tank/data";

// ==========================================================================
// STRATEGIES
// ==========================================================================

/// Owned task as an outside writer might have left it: any tier, any count,
/// any unit and possibly no schedule.
fn seeded_task() -> impl Strategy<Value = Value> {
    (
        proptest::sample::select(Tier::ALL.to_vec()),
        1u32..500,
        proptest::sample::select(vec!["HOUR", "DAY", "WEEK", "MONTH", "YEAR"]),
        any::<bool>(),
    )
        .prop_map(|(tier, count, unit, with_schedule)| {
            let mut task = json!({
                "dataset": DATASET,
                "naming_schema": naming_schema(tier),
                "lifetime_value": count,
                "lifetime_unit": unit,
                "enabled": true,
            });
            if with_schedule {
                if let Some(fields) = task.as_object_mut() {
                    fields.insert("schedule".to_string(), json!(tier.schedule()));
                }
            }
            task
        })
}

fn foreign_task() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!({"dataset": DATASET, "naming_schema": "manual-%Y-%m-%d_%H:%M"})),
        Just(json!({"dataset": DATASET, "naming_schema": "auto-biweekly-%Y-%m-%d_%H:%M"})),
        Just(json!({"dataset": "tank/other", "naming_schema": "auto-daily-%Y-%m-%d_%H:%M"})),
    ]
}

fn retention_map() -> impl Strategy<Value = RetentionMap> {
    proptest::sample::subsequence(Tier::ALL.to_vec(), 1..=Tier::ALL.len())
        .prop_flat_map(|tiers| {
            let n = tiers.len();
            (Just(tiers), proptest::collection::vec(1u32..1000, n))
        })
        .prop_filter_map("valid retention map", |(tiers, counts)| {
            RetentionMap::from_tiers(tiers.into_iter().zip(counts)).ok()
        })
}

fn owned_schemas(store: &InMemoryStore) -> Vec<String> {
    store
        .records(ResourceKind::SnapshotTask)
        .iter()
        .filter(|r| r.get("dataset").and_then(Value::as_str) == Some(DATASET))
        .filter_map(|r| r.get("naming_schema").and_then(Value::as_str))
        .filter(|schema| Tier::ALL.iter().any(|t| schema.starts_with(&tier_prefix(*t))))
        .map(String::from)
        .collect()
}

// ==========================================================================
// PROPERTIES
// ==========================================================================

proptest! {
    #[test]
    fn prop_apply_converges_and_reapply_is_noop(
        owned in proptest::collection::vec(seeded_task(), 0..8),
        foreign in proptest::collection::vec(foreign_task(), 0..3),
        desired in retention_map(),
    ) {
        let store = InMemoryStore::new();
        for record in owned.into_iter().chain(foreign.iter().cloned()) {
            store.seed(ResourceKind::SnapshotTask, record)?;
        }
        let manager = SnapshotPolicyManager::new(&store);

        manager.sync(DATASET, &desired, true, ExecutionMode::Apply)?;

        let mut expected: Vec<String> = desired.tiers().map(naming_schema).collect();
        let mut actual = owned_schemas(&store);
        expected.sort();
        actual.sort();
        prop_assert_eq!(actual, expected);

        prop_assert!(manager.plan(DATASET, &desired, true)?.is_empty());

        store.clear_calls();
        let again = manager.sync(DATASET, &desired, true, ExecutionMode::Apply)?;
        prop_assert!(!again.changed);
        prop_assert_eq!(store.mutation_count(), 0);

        let remaining_foreign = store
            .records(ResourceKind::SnapshotTask)
            .len()
            .saturating_sub(desired.len());
        prop_assert_eq!(remaining_foreign, foreign.len());
    }

    #[test]
    fn prop_check_mode_never_mutates(
        owned in proptest::collection::vec(seeded_task(), 0..8),
        desired in retention_map(),
    ) {
        let store = InMemoryStore::new();
        for record in owned {
            store.seed(ResourceKind::SnapshotTask, record)?;
        }
        let before = store.records(ResourceKind::SnapshotTask);

        let outcome = SnapshotPolicyManager::new(&store)
            .sync(DATASET, &desired, true, ExecutionMode::Check)?;

        prop_assert!(outcome.check_mode_changes.is_some());
        prop_assert_eq!(store.mutation_count(), 0);
        prop_assert_eq!(store.records(ResourceKind::SnapshotTask), before);
    }
}
