//! Desired versus actual comparison for snapshot tasks.
//!
//! Actual state is the list of owned tasks for one dataset, each already
//! tagged with its tier. Desired state is one spec per tier. The comparator
//! partitions tiers into create, update and delete sets that never overlap.
//! Surplus claims on a desired tier are pruned separately, since their tier
//! stays desired.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::Serialize;
use tiersync_core::{ResourceId, Tier};
use tracing::warn;

use crate::resources::{ManagedSnapshot, SnapshotTask, SnapshotTaskSpec};

/// A tier with no owned task yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCreate {
    pub tier: Tier,
    pub spec: SnapshotTaskSpec,
}

/// An owned task whose settings drifted from the tier definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUpdate {
    pub id: ResourceId,
    pub tier: Tier,
    pub spec: SnapshotTaskSpec,
    /// Names of the drifted fields.
    pub fields: Vec<&'static str>,
}

/// An owned task that no desired tier accounts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedDelete {
    pub id: ResourceId,
    pub tier: Tier,
}

/// Changes needed to converge one dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDiff {
    pub to_create: Vec<PlannedCreate>,
    pub to_update: Vec<PlannedUpdate>,
    pub to_delete: Vec<PlannedDelete>,
    /// Extra owned tasks on a desired tier, left behind by an outside writer.
    pub to_prune: Vec<PlannedDelete>,
}

impl StateDiff {
    /// Whether the dataset is already converged.
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty()
            && self.to_update.is_empty()
            && self.to_delete.is_empty()
            && self.to_prune.is_empty()
    }

    /// Number of remote mutations needed to apply this diff.
    pub fn len(&self) -> usize {
        self.to_create
            .len()
            .saturating_add(self.to_update.len())
            .saturating_add(self.to_delete.len())
            .saturating_add(self.to_prune.len())
    }

    /// Check-mode preview of this diff.
    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            to_create: self.to_create.iter().map(|c| c.tier).collect(),
            to_update: self
                .to_update
                .iter()
                .map(|u| UpdatePreview {
                    id: u.id,
                    tier: u.tier,
                    fields: u.fields.clone(),
                })
                .collect(),
            to_delete: self.to_delete.iter().map(|d| d.id).collect(),
            to_prune: self.to_prune.iter().map(|d| d.id).collect(),
        }
    }
}

/// Serializable preview of a [`StateDiff`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub to_create: Vec<Tier>,
    pub to_update: Vec<UpdatePreview>,
    pub to_delete: Vec<ResourceId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub to_prune: Vec<ResourceId>,
}

impl DiffSummary {
    /// Ids deleted for any reason.
    pub fn deletions(&self) -> usize {
        self.to_delete.len().saturating_add(self.to_prune.len())
    }
}

/// One planned update in a [`DiffSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatePreview {
    pub id: ResourceId,
    pub tier: Tier,
    pub fields: Vec<&'static str>,
}

/// Computes a [`StateDiff`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StateComparator;

impl StateComparator {
    /// Compare owned tasks against desired specs.
    ///
    /// When several owned tasks claim a desired tier, one that already
    /// matches is kept, or the lowest id when none does. The rest go to
    /// `to_prune`.
    pub fn calculate(
        current: &[ManagedSnapshot],
        desired: &BTreeMap<Tier, SnapshotTaskSpec>,
    ) -> StateDiff {
        let mut by_tier: BTreeMap<Tier, Vec<&ManagedSnapshot>> = BTreeMap::new();
        for managed in current.iter().sorted_by_key(|m| m.id) {
            by_tier.entry(managed.tier).or_default().push(managed);
        }

        let mut diff = StateDiff::default();

        // 1. Create or update desired tiers
        for (tier, spec) in desired {
            let owned = by_tier.get(tier).map(Vec::as_slice).unwrap_or_default();
            let kept = owned
                .iter()
                .find(|m| mismatched_fields(&m.task, spec).is_empty())
                .or_else(|| owned.first());

            let Some(kept) = kept else {
                diff.to_create.push(PlannedCreate {
                    tier: *tier,
                    spec: spec.clone(),
                });
                continue;
            };

            let fields = mismatched_fields(&kept.task, spec);
            if !fields.is_empty() {
                diff.to_update.push(PlannedUpdate {
                    id: kept.id,
                    tier: *tier,
                    spec: spec.clone(),
                    fields,
                });
            }

            let extras: Vec<PlannedDelete> = owned
                .iter()
                .filter(|m| m.id != kept.id)
                .map(|m| PlannedDelete {
                    id: m.id,
                    tier: *tier,
                })
                .collect();
            if !extras.is_empty() {
                warn!(
                    tier = %tier,
                    kept = %kept.id,
                    extra = extras.len(),
                    "Multiple owned snapshot tasks for one tier, pruning extras"
                );
            }
            diff.to_prune.extend(extras);
        }

        // 2. Delete undesired tiers
        for (tier, owned) in by_tier.iter().filter(|(t, _)| !desired.contains_key(*t)) {
            diff.to_delete.extend(owned.iter().map(|m| PlannedDelete {
                id: m.id,
                tier: *tier,
            }));
        }

        diff
    }
}

/// Fields of `task` that differ from `spec`.
///
/// Only the fields a tier defines are compared. Anything else the remote
/// store tracks is ignored.
pub fn mismatched_fields(task: &SnapshotTask, spec: &SnapshotTaskSpec) -> Vec<&'static str> {
    let mut fields = Vec::new();

    if task.lifetime_value != Some(i64::from(spec.lifetime_value)) {
        fields.push("lifetime_value");
    }
    if task.lifetime_unit.as_deref() != Some(spec.lifetime_unit.as_str()) {
        fields.push("lifetime_unit");
    }
    if task.naming_schema != spec.naming_schema {
        fields.push("naming_schema");
    }
    fields.extend(
        spec.schedule
            .mismatched_fields(&task.schedule)
            .into_iter()
            .map(schedule_field),
    );

    fields
}

fn schedule_field(component: &'static str) -> &'static str {
    match component {
        "minute" => "schedule.minute",
        "hour" => "schedule.hour",
        "dom" => "schedule.dom",
        "month" => "schedule.month",
        _ => "schedule.dow",
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;
    use crate::definition::{DatasetContext, TierDefinition};
    use proptest::prelude::*;
    use tiersync_core::{RetentionMap, Schedule};

    fn desired(entries: &[(Tier, u32)]) -> BTreeMap<Tier, SnapshotTaskSpec> {
        let ctx = DatasetContext::new("tank/data", true);
        let map = RetentionMap::from_tiers(entries.iter().copied()).unwrap();
        TierDefinition::from_map(&map)
            .into_iter()
            .map(|def| (def.tier, def.to_spec(&ctx)))
            .collect()
    }

    fn owned(id: u64, tier: Tier, count: u32) -> ManagedSnapshot {
        let spec =
            TierDefinition::new(tier, count).to_spec(&DatasetContext::new("tank/data", true));
        ManagedSnapshot {
            id: ResourceId::new(id),
            tier,
            task: SnapshotTask {
                id: ResourceId::new(id),
                dataset: spec.dataset,
                recursive: spec.recursive,
                lifetime_value: Some(i64::from(spec.lifetime_value)),
                lifetime_unit: Some(spec.lifetime_unit.as_str().to_string()),
                naming_schema: spec.naming_schema,
                enabled: true,
                schedule: spec.schedule,
            },
        }
    }

    #[test]
    fn test_empty_state_creates_everything() {
        let diff =
            StateComparator::calculate(&[], &desired(&[(Tier::Hourly, 24), (Tier::Daily, 30)]));
        assert_eq!(diff.summary().to_create, vec![Tier::Hourly, Tier::Daily]);
        assert!(diff.to_update.is_empty());
        assert!(diff.to_delete.is_empty());
    }

    #[test]
    fn test_dropped_tier_is_deleted() {
        let current = [owned(1, Tier::Hourly, 24), owned(2, Tier::Daily, 30)];
        let diff = StateComparator::calculate(&current, &desired(&[(Tier::Daily, 30)]));
        assert!(diff.to_create.is_empty());
        assert!(diff.to_update.is_empty());
        assert_eq!(diff.summary().to_delete, vec![ResourceId::new(1)]);
    }

    #[test]
    fn test_converged_state_is_empty() {
        let current = [owned(1, Tier::Hourly, 24), owned(2, Tier::Daily, 30)];
        let diff = StateComparator::calculate(
            &current,
            &desired(&[(Tier::Hourly, 24), (Tier::Daily, 30)]),
        );
        assert!(diff.is_empty());
        assert_eq!(diff.len(), 0);
    }

    #[test]
    fn test_count_change_is_update() {
        let current = [owned(7, Tier::Daily, 30)];
        let diff = StateComparator::calculate(&current, &desired(&[(Tier::Daily, 14)]));
        assert_eq!(diff.to_update.len(), 1);
        assert_eq!(diff.to_update[0].id, ResourceId::new(7));
        assert_eq!(diff.to_update[0].fields, vec!["lifetime_value"]);
    }

    #[test]
    fn test_schedule_drift_is_update() {
        let mut task = owned(3, Tier::Hourly, 24);
        task.task.schedule = Schedule {
            minute: "30".to_string(),
            ..task.task.schedule
        };
        let diff = StateComparator::calculate(&[task], &desired(&[(Tier::Hourly, 24)]));
        assert_eq!(diff.to_update[0].fields, vec!["schedule.minute"]);
    }

    #[test]
    fn test_remote_only_fields_are_ignored() {
        let mut task = owned(3, Tier::Hourly, 24);
        task.task.enabled = false;
        task.task.recursive = false;
        let diff = StateComparator::calculate(&[task], &desired(&[(Tier::Hourly, 24)]));
        assert!(diff.is_empty());
    }

    #[test]
    fn test_duplicate_claims_keep_lowest_id() {
        let current = [owned(9, Tier::Daily, 30), owned(4, Tier::Daily, 30)];
        let diff = StateComparator::calculate(&current, &desired(&[(Tier::Daily, 30)]));
        assert!(diff.to_update.is_empty());
        assert!(diff.to_delete.is_empty());
        assert_eq!(diff.summary().to_prune, vec![ResourceId::new(9)]);
    }

    #[test]
    fn test_drifted_duplicates_update_one_and_prune_the_rest() {
        let current = [owned(1, Tier::Daily, 10), owned(2, Tier::Daily, 20)];
        let diff = StateComparator::calculate(&current, &desired(&[(Tier::Daily, 30)]));

        assert_eq!(diff.to_update.len(), 1);
        assert_eq!(diff.to_update[0].id, ResourceId::new(1));
        assert!(diff.to_delete.is_empty());
        assert_eq!(diff.summary().to_prune, vec![ResourceId::new(2)]);
        assert_eq!(diff.len(), 2);
    }

    #[test]
    fn test_matching_duplicate_is_kept_over_lower_id() {
        let current = [owned(1, Tier::Daily, 10), owned(2, Tier::Daily, 30)];
        let diff = StateComparator::calculate(&current, &desired(&[(Tier::Daily, 30)]));

        assert!(diff.to_update.is_empty());
        assert!(diff.to_delete.is_empty());
        assert_eq!(diff.summary().to_prune, vec![ResourceId::new(1)]);
        assert_eq!(diff.len(), 1);
    }

    #[test]
    fn test_duplicates_of_undesired_tier_are_all_deleted() {
        let current = [owned(1, Tier::Hourly, 24), owned(2, Tier::Hourly, 24)];
        let diff = StateComparator::calculate(&current, &desired(&[(Tier::Daily, 30)]));

        assert_eq!(
            diff.summary().to_delete,
            vec![ResourceId::new(1), ResourceId::new(2)]
        );
        assert!(diff.to_prune.is_empty());
    }

    fn tier_subset() -> impl Strategy<Value = Vec<(Tier, u32)>> {
        proptest::sample::subsequence(Tier::ALL.to_vec(), 0..=Tier::ALL.len())
            .prop_flat_map(|tiers| {
                let n = tiers.len();
                (Just(tiers), proptest::collection::vec(1u32..100, n))
            })
            .prop_map(|(tiers, counts)| tiers.into_iter().zip(counts).collect())
    }

    proptest! {
        #[test]
        fn prop_diff_sets_are_disjoint(
            want in tier_subset(),
            have in tier_subset(),
            dupes in tier_subset(),
        ) {
            let current: Vec<ManagedSnapshot> = have
                .iter()
                .chain(&dupes)
                .zip(1u64..)
                .map(|((tier, count), id)| owned(id, *tier, *count))
                .collect();
            let have: Vec<(Tier, u32)> = have.iter().chain(&dupes).copied().collect();
            let diff = StateComparator::calculate(&current, &desired(&want));

            let created: Vec<Tier> = diff.to_create.iter().map(|c| c.tier).collect();
            let updated: Vec<Tier> = diff.to_update.iter().map(|u| u.tier).collect();
            let deleted: Vec<Tier> = diff.to_delete.iter().map(|d| d.tier).collect();
            let pruned: Vec<Tier> = diff.to_prune.iter().map(|d| d.tier).collect();

            for tier in &created {
                prop_assert!(!updated.contains(tier));
                prop_assert!(!deleted.contains(tier));
            }
            for tier in &updated {
                prop_assert!(!deleted.contains(tier));
            }
            for (tier, _) in &want {
                prop_assert!(created.contains(tier) || have.iter().any(|(t, _)| t == tier));
            }
            for (tier, _) in &have {
                let wanted = want.iter().any(|(t, _)| t == tier);
                prop_assert_eq!(deleted.contains(tier), !wanted);
            }
            for tier in &pruned {
                prop_assert!(want.iter().any(|(t, _)| t == tier));
            }
            let kept = want
                .iter()
                .filter(|(t, _)| have.iter().any(|(h, _)| h == t))
                .count();
            prop_assert_eq!(
                diff.to_delete.len().saturating_add(diff.to_prune.len()),
                current.len().saturating_sub(kept)
            );
        }
    }
}
