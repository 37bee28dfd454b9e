//! Ownership naming convention.
//!
//! Snapshot tasks created by tiersync carry a naming schema of the form
//! `auto-<tier>-%Y-%m-%d_%H:%M`. The remote scheduler uses it to name the
//! snapshots it takes; tiersync uses the same string to recognise the tasks
//! it owns and the tier each one implements.
//!
//! Ownership is classified once, when a record is fetched, into an
//! [`Ownership`] value. Nothing downstream re-parses the tag.

use crate::tier::Tier;

/// Prefix shared by every policy-managed naming schema.
pub const MANAGED_PREFIX: &str = "auto-";

/// Timestamp template appended to every naming schema.
pub const TIMESTAMP_TEMPLATE: &str = "%Y-%m-%d_%H:%M";

/// Prefix of generated replication task names.
pub const REPLICATION_NAME_PREFIX: &str = "auto-repl-";

/// Full naming schema for `tier`.
pub fn naming_schema(tier: Tier) -> String {
    format!("{MANAGED_PREFIX}{tier}-{TIMESTAMP_TEMPLATE}")
}

/// Prefix matching every naming schema of `tier`.
pub fn tier_prefix(tier: Tier) -> String {
    format!("{MANAGED_PREFIX}{tier}-")
}

/// Naming schemas for a list of tiers, in the given order.
pub fn naming_schemas<I>(tiers: I) -> Vec<String>
where
    I: IntoIterator<Item = Tier>,
{
    tiers.into_iter().map(naming_schema).collect()
}

/// Whether `tag` carries the managed prefix at all.
pub fn has_managed_prefix(tag: &str) -> bool {
    tag.starts_with(MANAGED_PREFIX)
}

/// Ownership of a remote resource, derived from its naming tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// Created by a tiersync policy for the given tier.
    Managed(Tier),
    /// Anything else, including `auto-` tags naming an unknown tier.
    Unmanaged,
}

impl Ownership {
    /// Classify a naming tag.
    pub fn of(tag: &str) -> Self {
        tag.strip_prefix(MANAGED_PREFIX)
            .and_then(|rest| rest.split_once('-'))
            .and_then(|(name, _)| name.parse::<Tier>().ok())
            .map_or(Self::Unmanaged, Self::Managed)
    }

    /// Owning tier, if managed.
    pub const fn tier(self) -> Option<Tier> {
        match self {
            Self::Managed(tier) => Some(tier),
            Self::Unmanaged => None,
        }
    }

    /// Whether the resource is policy-managed.
    pub const fn is_managed(self) -> bool {
        matches!(self, Self::Managed(_))
    }
}

/// Default replication task name for a source dataset.
///
/// `tank/data/home` becomes `auto-repl-tank_data_home`.
pub fn replication_task_name(source_dataset: &str) -> String {
    format!("{REPLICATION_NAME_PREFIX}{}", source_dataset.replace('/', "_"))
}

/// Whether a replication task name was generated by tiersync.
pub fn is_managed_replication_name(name: &str) -> bool {
    name.starts_with(REPLICATION_NAME_PREFIX)
}
