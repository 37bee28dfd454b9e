//! Resolution of the snapshot tasks a push replication depends on.

use std::collections::BTreeMap;

use tiersync_core::{Error, ResourceId, Result, Tier};
use tracing::debug;

use crate::api::SnapshotTaskApi;
use crate::store::RemoteStore;

/// Snapshot task id bound to each required tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binding(BTreeMap<Tier, ResourceId>);

impl Binding {
    /// Bound ids in tier frequency order.
    pub fn task_ids(&self) -> Vec<ResourceId> {
        self.0.values().copied().collect()
    }

    pub fn get(&self, tier: Tier) -> Option<ResourceId> {
        self.0.get(&tier).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Finds existing snapshot tasks for a dataset, one per tier.
pub struct SnapshotTaskBinder<'a, S: RemoteStore + ?Sized> {
    api: SnapshotTaskApi<'a, S>,
}

impl<'a, S: RemoteStore + ?Sized> SnapshotTaskBinder<'a, S> {
    pub const fn new(store: &'a S) -> Self {
        Self {
            api: SnapshotTaskApi::new(store),
        }
    }

    /// Bind every tier in `tiers` to a snapshot task on `dataset`.
    ///
    /// All tiers are looked up before failing, so the error names every
    /// missing one, in the order given. When a tier has several tasks the
    /// lowest id is used.
    ///
    /// # Errors
    ///
    /// [`Error::MissingSnapshotTasks`] when any tier has no task, or a
    /// remote failure.
    pub fn bind(&self, dataset: &str, tiers: &[Tier]) -> Result<Binding> {
        let mut bound = BTreeMap::new();
        let mut missing = Vec::new();

        for &tier in tiers {
            let found = self
                .api
                .query_tier(dataset, tier)?
                .into_iter()
                .map(|task| task.id)
                .min();

            match found {
                Some(id) => {
                    debug!(dataset, tier = %tier, %id, "Bound snapshot task");
                    bound.insert(tier, id);
                }
                None => missing.push(tier),
            }
        }

        if missing.is_empty() {
            Ok(Binding(bound))
        } else {
            Err(Error::missing_snapshot_tasks(dataset, missing))
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::store::InMemoryStore;
    use serde_json::json;
    use tiersync_core::{ErrorKind, ResourceKind};

    fn seed(store: &InMemoryStore, dataset: &str, tier: Tier) -> ResourceId {
        store
            .seed(
                ResourceKind::SnapshotTask,
                json!({
                    "dataset": dataset,
                    "naming_schema": tiersync_core::naming::naming_schema(tier),
                }),
            )
            .unwrap()
    }

    #[test]
    fn test_bind_all_present() {
        let store = InMemoryStore::new();
        let hourly = seed(&store, "tank/data", Tier::Hourly);
        let weekly = seed(&store, "tank/data", Tier::Weekly);

        let binding = SnapshotTaskBinder::new(&store)
            .bind("tank/data", &[Tier::Weekly, Tier::Hourly])
            .unwrap();
        assert_eq!(binding.task_ids(), vec![hourly, weekly]);
        assert_eq!(binding.get(Tier::Weekly), Some(weekly));
    }

    #[test]
    fn test_bind_reports_every_missing_tier() {
        let store = InMemoryStore::new();
        seed(&store, "tank/data", Tier::Hourly);
        seed(&store, "tank/other", Tier::Weekly);

        let err = SnapshotTaskBinder::new(&store)
            .bind("tank/data", &[Tier::Hourly, Tier::Weekly, Tier::Monthly])
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Binding);
        assert!(matches!(
            err,
            Error::MissingSnapshotTasks { ref missing, .. } if missing == &[Tier::Weekly, Tier::Monthly]
        ));
        assert_eq!(store.mutation_count(), 0);
    }

    #[test]
    fn test_missing_tiers_keep_requested_order() {
        let store = InMemoryStore::new();

        let err = SnapshotTaskBinder::new(&store)
            .bind("tank/data", &[Tier::Monthly, Tier::Hourly])
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::MissingSnapshotTasks { ref missing, .. } if missing == &[Tier::Monthly, Tier::Hourly]
        ));
    }
}
