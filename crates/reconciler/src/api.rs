//! Typed wrappers over [`RemoteStore`].
//!
//! Each wrapper serializes specs, decodes records and turns raw store
//! failures into [`Error::RemoteCall`] carrying the operation, resource
//! kind and key.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tiersync_core::naming::{MANAGED_PREFIX, tier_prefix};
use tiersync_core::{Error, Ownership, RemoteOp, ResourceId, ResourceKind, Result, Tier};
use tracing::debug;

use crate::resources::{
    ManagedSnapshot, ReplicationTask, ReplicationTaskSpec, SnapshotTask, SnapshotTaskSpec,
};
use crate::store::{Filter, RemoteStore};

fn encode<T: Serialize>(kind: ResourceKind, spec: &T) -> Result<Value> {
    serde_json::to_value(spec).map_err(|e| Error::malformed_resource(kind, e))
}

fn decode<T: DeserializeOwned>(kind: ResourceKind, record: Value) -> Result<T> {
    serde_json::from_value(record).map_err(|e| Error::malformed_resource(kind, e))
}

/// Error key for a task that has no id yet: `dataset (tier)`.
fn spec_key(spec: &SnapshotTaskSpec) -> String {
    match Ownership::of(&spec.naming_schema) {
        Ownership::Managed(tier) => format!("{} ({tier})", spec.dataset),
        Ownership::Unmanaged => format!("{} ({})", spec.dataset, spec.naming_schema),
    }
}

/// Snapshot task operations.
pub struct SnapshotTaskApi<'a, S: RemoteStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RemoteStore + ?Sized> SnapshotTaskApi<'a, S> {
    const KIND: ResourceKind = ResourceKind::SnapshotTask;

    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    fn query(&self, dataset: &str, filter: &Filter) -> Result<Vec<SnapshotTask>> {
        debug!(dataset, ?filter, "Querying snapshot tasks");
        self.store
            .query(Self::KIND, filter)
            .map_err(|e| Error::remote_call(RemoteOp::Query, Self::KIND, dataset, e))?
            .into_iter()
            .map(|record| decode(Self::KIND, record))
            .collect()
    }

    /// Owned tasks for `dataset`, each tagged with its tier.
    ///
    /// Tasks whose naming schema carries the managed prefix but names no
    /// known tier are left alone.
    ///
    /// # Errors
    ///
    /// Remote or decode failure.
    pub fn query_managed(&self, dataset: &str) -> Result<Vec<ManagedSnapshot>> {
        let filter = Filter::new()
            .eq("dataset", dataset)
            .starts_with("naming_schema", MANAGED_PREFIX);

        let tasks = self.query(dataset, &filter)?;
        Ok(tasks
            .into_iter()
            .filter_map(|task| match Ownership::of(&task.naming_schema) {
                Ownership::Managed(tier) => Some(ManagedSnapshot {
                    id: task.id,
                    tier,
                    task,
                }),
                Ownership::Unmanaged => {
                    debug!(
                        id = %task.id,
                        naming_schema = %task.naming_schema,
                        "Skipping snapshot task with unknown tier"
                    );
                    None
                }
            })
            .collect())
    }

    /// Tasks for `dataset` whose naming schema belongs to `tier`.
    ///
    /// # Errors
    ///
    /// Remote or decode failure.
    pub fn query_tier(&self, dataset: &str, tier: Tier) -> Result<Vec<SnapshotTask>> {
        let filter = Filter::new()
            .eq("dataset", dataset)
            .starts_with("naming_schema", tier_prefix(tier));
        self.query(dataset, &filter)
    }

    /// # Errors
    ///
    /// Remote or decode failure.
    pub fn create(&self, spec: &SnapshotTaskSpec) -> Result<SnapshotTask> {
        debug!(dataset = %spec.dataset, naming_schema = %spec.naming_schema, "Creating snapshot task");
        let body = encode(Self::KIND, spec)?;
        let record = self
            .store
            .create(Self::KIND, &body)
            .map_err(|e| Error::remote_call(RemoteOp::Create, Self::KIND, spec_key(spec), e))?;
        decode(Self::KIND, record)
    }

    /// # Errors
    ///
    /// Remote or decode failure.
    pub fn update(&self, id: ResourceId, spec: &SnapshotTaskSpec) -> Result<SnapshotTask> {
        debug!(%id, naming_schema = %spec.naming_schema, "Updating snapshot task");
        let body = encode(Self::KIND, spec)?;
        let record = self
            .store
            .update(Self::KIND, id, &body)
            .map_err(|e| Error::remote_call_for_id(RemoteOp::Update, Self::KIND, id, e))?;
        decode(Self::KIND, record)
    }

    /// # Errors
    ///
    /// Remote failure.
    pub fn delete(&self, id: ResourceId) -> Result<()> {
        debug!(%id, "Deleting snapshot task");
        self.store
            .delete(Self::KIND, id)
            .map_err(|e| Error::remote_call_for_id(RemoteOp::Delete, Self::KIND, id, e))
    }
}

/// Replication task operations. Tasks are looked up and created by name,
/// then updated and deleted by id.
pub struct ReplicationTaskApi<'a, S: RemoteStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RemoteStore + ?Sized> ReplicationTaskApi<'a, S> {
    const KIND: ResourceKind = ResourceKind::ReplicationTask;

    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// The task named `name`, if any. Extra matches are ignored.
    ///
    /// # Errors
    ///
    /// Remote or decode failure.
    pub fn query_by_name(&self, name: &str) -> Result<Option<ReplicationTask>> {
        debug!(name, "Querying replication task");
        let filter = Filter::new().eq("name", name);
        let records = self
            .store
            .query(Self::KIND, &filter)
            .map_err(|e| Error::remote_call(RemoteOp::Query, Self::KIND, name, e))?;

        records
            .into_iter()
            .next()
            .map(|record| decode(Self::KIND, record))
            .transpose()
    }

    /// # Errors
    ///
    /// Remote or decode failure.
    pub fn create(&self, spec: &ReplicationTaskSpec) -> Result<ReplicationTask> {
        debug!(name = %spec.name, "Creating replication task");
        let body = encode(Self::KIND, spec)?;
        let record = self
            .store
            .create(Self::KIND, &body)
            .map_err(|e| Error::remote_call(RemoteOp::Create, Self::KIND, &spec.name, e))?;
        decode(Self::KIND, record)
    }

    /// # Errors
    ///
    /// Remote or decode failure.
    pub fn update(&self, id: ResourceId, spec: &ReplicationTaskSpec) -> Result<ReplicationTask> {
        debug!(%id, name = %spec.name, "Updating replication task");
        let body = encode(Self::KIND, spec)?;
        let record = self
            .store
            .update(Self::KIND, id, &body)
            .map_err(|e| Error::remote_call_for_id(RemoteOp::Update, Self::KIND, id, e))?;
        decode(Self::KIND, record)
    }

    /// # Errors
    ///
    /// Remote failure.
    pub fn delete(&self, task: &ReplicationTask) -> Result<()> {
        debug!(id = %task.id, name = %task.name, "Deleting replication task");
        self.store
            .delete(Self::KIND, task.id)
            .map_err(|e| Error::remote_call_for_id(RemoteOp::Delete, Self::KIND, task.id, e))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;
    use crate::definition::{DatasetContext, TierDefinition};
    use crate::store::InMemoryStore;
    use serde_json::json;
    use tiersync_core::ErrorKind;

    #[test]
    fn test_query_managed_classifies_ownership() {
        let store = InMemoryStore::new();
        for schema in [
            "auto-hourly-%Y-%m-%d_%H:%M",
            "auto-minutely-%Y-%m-%d_%H:%M",
            "manual-%Y-%m-%d",
        ] {
            store
                .seed(
                    ResourceKind::SnapshotTask,
                    json!({"dataset": "tank/data", "naming_schema": schema}),
                )
                .unwrap();
        }
        store
            .seed(
                ResourceKind::SnapshotTask,
                json!({"dataset": "tank/other", "naming_schema": "auto-daily-%Y-%m-%d_%H:%M"}),
            )
            .unwrap();

        let managed = SnapshotTaskApi::new(&store).query_managed("tank/data").unwrap();
        assert_eq!(managed.len(), 1);
        assert_eq!(managed[0].tier, Tier::Hourly);
    }

    #[test]
    fn test_create_round_trips_through_store() {
        let store = InMemoryStore::new();
        let spec = TierDefinition::new(Tier::Daily, 30).to_spec(&DatasetContext::new("tank", true));
        let task = SnapshotTaskApi::new(&store).create(&spec).unwrap();
        assert_eq!(task.id, ResourceId::new(1));
        assert_eq!(task.lifetime_unit.as_deref(), Some("DAY"));
        assert_eq!(task.schedule, spec.schedule);
    }

    #[test]
    fn test_remote_failure_is_wrapped() {
        let store = InMemoryStore::new();
        let err = SnapshotTaskApi::new(&store)
            .delete(ResourceId::new(42))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::RemoteCall);
        assert!(err.to_string().contains("delete snapshot task for id 42"));
    }

    #[test]
    fn test_failed_create_names_dataset_and_tier() {
        let store = InMemoryStore::new();
        store.fail_on(RemoteOp::Create, ResourceKind::SnapshotTask, 1);
        let spec =
            TierDefinition::new(Tier::Daily, 30).to_spec(&DatasetContext::new("tank/data", true));

        let err = SnapshotTaskApi::new(&store).create(&spec).err().unwrap();
        assert!(matches!(
            err,
            Error::RemoteCall { op: RemoteOp::Create, ref key, .. } if key == "tank/data (daily)"
        ));
    }

    #[test]
    fn test_replication_update_and_delete_are_keyed_by_id() {
        let store = InMemoryStore::new();
        store
            .seed(
                ResourceKind::ReplicationTask,
                json!({"name": "auto-repl-tank", "direction": "PUSH"}),
            )
            .unwrap();
        let api = ReplicationTaskApi::new(&store);
        let task = api.query_by_name("auto-repl-tank").unwrap().unwrap();

        store.fail_on(RemoteOp::Delete, ResourceKind::ReplicationTask, 1);
        let err = api.delete(&task).err().unwrap();
        assert!(matches!(
            err,
            Error::RemoteCall { op: RemoteOp::Delete, ref key, .. } if key == "id 1"
        ));
    }

    #[test]
    fn test_undecodable_record_is_malformed() {
        let store = InMemoryStore::new();
        store
            .seed(
                ResourceKind::SnapshotTask,
                json!({
                    "dataset": "tank/data",
                    "naming_schema": "auto-daily-%Y-%m-%d_%H:%M",
                    "lifetime_value": "thirty"
                }),
            )
            .unwrap();

        let err = SnapshotTaskApi::new(&store)
            .query_managed("tank/data")
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_query_by_name() {
        let store = InMemoryStore::new();
        store
            .seed(
                ResourceKind::ReplicationTask,
                json!({"name": "auto-repl-tank", "direction": "PUSH"}),
            )
            .unwrap();

        let api = ReplicationTaskApi::new(&store);
        let task = api.query_by_name("auto-repl-tank").unwrap().unwrap();
        assert_eq!(task.id, ResourceId::new(1));
        assert!(api.query_by_name("missing").unwrap().is_none());
    }
}
