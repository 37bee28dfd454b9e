//! Typed resource specifications and records.
//!
//! Specs are what tiersync sends; records are what the remote store returns.
//! Records decode leniently: fields tiersync does not manage are kept aside
//! or ignored, never rejected.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tiersync_core::{ResourceId, RetentionUnit, Schedule, Tier};

use crate::encryption::{EncryptionSettings, REDACTED};

/// Target configuration of one periodic snapshot task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotTaskSpec {
    pub dataset: String,
    pub recursive: bool,
    pub lifetime_value: u32,
    pub lifetime_unit: RetentionUnit,
    pub naming_schema: String,
    pub enabled: bool,
    pub allow_empty: bool,
    pub schedule: Schedule,
}

/// Periodic snapshot task as stored remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotTask {
    pub id: ResourceId,
    #[serde(default)]
    pub dataset: String,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub lifetime_value: Option<i64>,
    #[serde(default)]
    pub lifetime_unit: Option<String>,
    #[serde(default)]
    pub naming_schema: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub schedule: Schedule,
}

/// Snapshot task owned by a policy, tagged with its tier at fetch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedSnapshot {
    pub id: ResourceId,
    pub tier: Tier,
    pub task: SnapshotTask,
}

/// Replication direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Push,
    Pull,
}

/// Replication transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Transport {
    Local,
    Ssh,
}

/// How the target prunes replicated snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RetentionPolicyMode {
    /// Mirror the source snapshot tasks' retention.
    Source,
    /// Explicit per-schedule lifetimes.
    Custom,
}

/// Read-only handling of the target dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReadonlyPolicy {
    Set,
    Require,
    Ignore,
}

/// Retention rule for snapshots matching one schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lifetime {
    pub schedule: Schedule,
    pub lifetime_value: u32,
    pub lifetime_unit: RetentionUnit,
}

impl Lifetime {
    /// Lifetime entry for a tier and retention count.
    pub fn for_tier(tier: Tier, count: u32) -> Self {
        Self {
            schedule: tier.schedule(),
            lifetime_value: count,
            lifetime_unit: tier.unit(),
        }
    }
}

/// Target configuration of one replication task.
///
/// Built through [`ReplicationTaskSpec::local_push`] or
/// [`ReplicationTaskSpec::remote_pull`], which fill every field the
/// respective variant requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicationTaskSpec {
    pub name: String,
    pub direction: Direction,
    pub transport: Transport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_credentials: Option<u64>,
    pub source_datasets: Vec<String>,
    pub target_dataset: String,
    pub recursive: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub periodic_snapshot_tasks: Vec<ResourceId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub also_include_naming_schema: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub naming_schema: Vec<String>,
    pub auto: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
    pub retention_policy: RetentionPolicyMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifetime_value: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifetime_unit: Option<RetentionUnit>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lifetimes: Vec<Lifetime>,
    pub readonly: ReadonlyPolicy,
    pub enabled: bool,
    #[serde(flatten)]
    pub encryption: EncryptionSettings,
}

/// Fields shared by both replication variants.
#[derive(Debug, Clone)]
pub struct ReplicationTarget {
    pub name: String,
    pub source_dataset: String,
    pub target_dataset: String,
    pub recursive: bool,
    pub encryption: EncryptionSettings,
}

/// Trigger and retention settings of a pull task.
#[derive(Debug, Clone)]
pub struct PullRetention {
    pub schedule: Schedule,
    pub simple_lifetime: (u32, RetentionUnit),
    pub lifetimes: Vec<Lifetime>,
}

impl ReplicationTaskSpec {
    /// Push over the local transport, bound to source snapshot tasks.
    pub fn local_push(
        target: ReplicationTarget,
        snapshot_tasks: Vec<ResourceId>,
        naming_schemas: Vec<String>,
    ) -> Self {
        Self {
            name: target.name,
            direction: Direction::Push,
            transport: Transport::Local,
            ssh_credentials: None,
            source_datasets: vec![target.source_dataset],
            target_dataset: target.target_dataset,
            recursive: target.recursive,
            periodic_snapshot_tasks: snapshot_tasks,
            also_include_naming_schema: naming_schemas,
            naming_schema: Vec::new(),
            auto: true,
            schedule: None,
            retention_policy: RetentionPolicyMode::Source,
            lifetime_value: None,
            lifetime_unit: None,
            lifetimes: Vec::new(),
            readonly: ReadonlyPolicy::Set,
            enabled: true,
            encryption: target.encryption,
        }
    }

    /// Pull over SSH from a remote machine, with custom per-tier retention.
    pub fn remote_pull(
        target: ReplicationTarget,
        ssh_credentials: u64,
        naming_schemas: Vec<String>,
        retention: PullRetention,
    ) -> Self {
        let (lifetime_value, lifetime_unit) = retention.simple_lifetime;
        Self {
            name: target.name,
            direction: Direction::Pull,
            transport: Transport::Ssh,
            ssh_credentials: Some(ssh_credentials),
            source_datasets: vec![target.source_dataset],
            target_dataset: target.target_dataset,
            recursive: target.recursive,
            periodic_snapshot_tasks: Vec::new(),
            also_include_naming_schema: Vec::new(),
            naming_schema: naming_schemas,
            auto: true,
            schedule: Some(retention.schedule),
            retention_policy: RetentionPolicyMode::Custom,
            lifetime_value: Some(lifetime_value),
            lifetime_unit: Some(lifetime_unit),
            lifetimes: retention.lifetimes,
            readonly: ReadonlyPolicy::Set,
            enabled: true,
            encryption: target.encryption,
        }
    }

    /// Copy of the spec safe to print: the encryption key is masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            encryption: self.encryption.redacted(),
            ..self.clone()
        }
    }
}

/// Replication task as stored remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationTask {
    pub id: ResourceId,
    pub name: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl ReplicationTask {
    /// Copy safe to print: any stored encryption key is masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut attributes = self.attributes.clone();
        if let Some(key) = attributes.get_mut("encryption_key").filter(|k| !k.is_null()) {
            *key = Value::from(REDACTED);
        }
        Self {
            id: self.id,
            name: self.name.clone(),
            attributes,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    fn target() -> ReplicationTarget {
        ReplicationTarget {
            name: "auto-repl-tank_data".to_string(),
            source_dataset: "tank/data".to_string(),
            target_dataset: "backup/data".to_string(),
            recursive: true,
            encryption: EncryptionSettings::disabled(),
        }
    }

    #[test]
    fn test_snapshot_task_decodes_leniently() {
        let task: SnapshotTask = serde_json::from_value(json!({
            "id": 3,
            "dataset": "tank/data",
            "naming_schema": "auto-daily-%Y-%m-%d_%H:%M",
            "lifetime_value": 30,
            "lifetime_unit": "DAY",
            "state": {"state": "FINISHED"},
            "vmware_sync": false
        }))
        .unwrap();
        assert_eq!(task.id, ResourceId::new(3));
        assert_eq!(task.lifetime_value, Some(30));
        assert_eq!(task.schedule, Schedule::default());
    }

    #[test]
    fn test_local_push_wire_shape() {
        let spec = ReplicationTaskSpec::local_push(
            target(),
            vec![ResourceId::new(4), ResourceId::new(9)],
            vec!["auto-daily-%Y-%m-%d_%H:%M".to_string()],
        );
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["direction"], "PUSH");
        assert_eq!(value["transport"], "LOCAL");
        assert_eq!(value["periodic_snapshot_tasks"], json!([4, 9]));
        assert_eq!(value["retention_policy"], "SOURCE");
        assert_eq!(value["readonly"], "SET");
        assert_eq!(value["encryption"], false);
        assert!(value.get("ssh_credentials").is_none());
        assert!(value.get("lifetimes").is_none());
        assert!(value.get("schedule").is_none());
    }

    #[test]
    fn test_remote_pull_wire_shape() {
        let spec = ReplicationTaskSpec::remote_pull(
            target(),
            2,
            vec!["auto-daily-%Y-%m-%d_%H:%M".to_string()],
            PullRetention {
                schedule: Tier::Daily.schedule(),
                simple_lifetime: (14, RetentionUnit::Day),
                lifetimes: vec![Lifetime::for_tier(Tier::Daily, 14)],
            },
        );
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["direction"], "PULL");
        assert_eq!(value["transport"], "SSH");
        assert_eq!(value["ssh_credentials"], 2);
        assert_eq!(value["retention_policy"], "CUSTOM");
        assert_eq!(value["lifetime_unit"], "DAY");
        assert_eq!(value["lifetimes"][0]["lifetime_value"], 14);
        assert_eq!(value["schedule"]["hour"], "0");
    }

    #[test]
    fn test_replication_task_keeps_attributes() {
        let task: ReplicationTask = serde_json::from_value(json!({
            "id": 1,
            "name": "auto-repl-tank",
            "direction": "PUSH"
        }))
        .unwrap();
        assert_eq!(task.attributes.get("direction"), Some(&json!("PUSH")));
        assert!(!task.attributes.contains_key("id"));
    }
}
