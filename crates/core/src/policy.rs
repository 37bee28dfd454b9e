//! Validated policy input.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tier::{Tier, TierCatalog};

/// Whether a policy should exist or be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyState {
    #[default]
    Present,
    Absent,
}

/// Whether a reconciliation mutates the remote store or only previews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Apply,
    /// Dry run: compute and report, never mutate.
    Check,
}

impl ExecutionMode {
    /// Whether this is a dry run.
    pub const fn is_check(self) -> bool {
        matches!(self, Self::Check)
    }
}

/// Mapping of tier to a positive retention count.
///
/// Iteration follows tier frequency order (frequent first).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RetentionMap(BTreeMap<Tier, u32>);

impl RetentionMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from already-typed entries.
    ///
    /// # Errors
    ///
    /// Fails on a zero count or a tier listed twice.
    pub fn from_tiers<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Tier, u32)>,
    {
        entries
            .into_iter()
            .try_fold(Self::new(), |mut map, (tier, count)| {
                map.insert(tier, i64::from(count))?;
                Ok(map)
            })
    }

    /// Build from raw caller input: tier names and signed counts.
    ///
    /// Unknown names are all reported together before counts are checked.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownTiers`], [`Error::InvalidRetention`] or
    /// [`Error::DuplicateTier`].
    pub fn from_raw<I, K>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, i64)>,
        K: AsRef<str>,
    {
        let entries: Vec<(K, i64)> = entries.into_iter().collect();
        let tiers = TierCatalog::validate(entries.iter().map(|(name, _)| name.as_ref()))?;

        tiers
            .into_iter()
            .zip(entries.iter().map(|(_, count)| *count))
            .try_fold(Self::new(), |mut map, (tier, count)| {
                map.insert(tier, count)?;
                Ok(map)
            })
    }

    fn insert(&mut self, tier: Tier, count: i64) -> Result<()> {
        let count = u32::try_from(count)
            .ok()
            .filter(|c| *c > 0)
            .ok_or(Error::invalid_retention(tier, count))?;

        match self.0.entry(tier) {
            Entry::Occupied(_) => Err(Error::DuplicateTier { tier }),
            Entry::Vacant(slot) => {
                slot.insert(count);
                Ok(())
            }
        }
    }

    /// Reject an empty map.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyPolicy`] when no tier is present.
    pub fn require_non_empty(self) -> Result<Self> {
        if self.0.is_empty() {
            Err(Error::EmptyPolicy)
        } else {
            Ok(self)
        }
    }

    /// Retention count for `tier`.
    pub fn get(&self, tier: Tier) -> Option<u32> {
        self.0.get(&tier).copied()
    }

    /// Whether `tier` is desired.
    pub fn contains(&self, tier: Tier) -> bool {
        self.0.contains_key(&tier)
    }

    /// Entries in frequency order.
    pub fn iter(&self) -> impl Iterator<Item = (Tier, u32)> + '_ {
        self.0.iter().map(|(tier, count)| (*tier, *count))
    }

    /// Desired tiers in frequency order.
    pub fn tiers(&self) -> impl Iterator<Item = Tier> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for RetentionMap {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = BTreeMap::<String, i64>::deserialize(deserializer)?;
        Self::from_raw(raw).map_err(serde::de::Error::custom)
    }
}
