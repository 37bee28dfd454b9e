//! Expansion of a tier and retention count into a snapshot task spec.

use tiersync_core::naming::naming_schema;
use tiersync_core::{RetentionMap, RetentionUnit, Schedule, Tier};

use crate::resources::SnapshotTaskSpec;

/// Dataset-level settings shared by every tier of a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetContext {
    pub dataset: String,
    pub recursive: bool,
}

impl DatasetContext {
    pub fn new(dataset: impl Into<String>, recursive: bool) -> Self {
        Self {
            dataset: dataset.into(),
            recursive,
        }
    }
}

/// One tier of a policy with its retention count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierDefinition {
    pub tier: Tier,
    pub count: u32,
}

impl TierDefinition {
    pub const fn new(tier: Tier, count: u32) -> Self {
        Self { tier, count }
    }

    /// One definition per entry of `map`, in frequency order.
    pub fn from_map(map: &RetentionMap) -> Vec<Self> {
        map.iter()
            .map(|(tier, count)| Self::new(tier, count))
            .collect()
    }

    pub fn naming_schema(&self) -> String {
        naming_schema(self.tier)
    }

    pub fn schedule(&self) -> Schedule {
        self.tier.schedule()
    }

    pub const fn unit(&self) -> RetentionUnit {
        self.tier.unit()
    }

    /// Full snapshot task spec for this tier on `ctx.dataset`.
    pub fn to_spec(&self, ctx: &DatasetContext) -> SnapshotTaskSpec {
        SnapshotTaskSpec {
            dataset: ctx.dataset.clone(),
            recursive: ctx.recursive,
            lifetime_value: self.count,
            lifetime_unit: self.unit(),
            naming_schema: self.naming_schema(),
            enabled: true,
            allow_empty: true,
            schedule: self.schedule(),
        }
    }
}
