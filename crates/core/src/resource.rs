//! Identity of remote resources.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of resource held by the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Periodic snapshot task.
    SnapshotTask,
    /// Replication task.
    ReplicationTask,
}

impl ResourceKind {
    /// Human-readable name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SnapshotTask => "snapshot task",
            Self::ReplicationTask => "replication task",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier the remote store assigns to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Wrap a raw remote id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw remote id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ResourceId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
