//! Tier selection for replication trigger and retention settings.

use tiersync_core::{RetentionMap, Tier};

/// Most frequent tier present in `map`.
///
/// Pull replication is triggered on this tier's schedule so the most
/// frequent snapshots are picked up as they appear.
pub fn most_frequent_tier(map: &RetentionMap) -> Option<Tier> {
    map.tiers().next()
}

/// Tier whose retention spans the longest time, with its count.
///
/// Span is `count × hours(unit)`, saturating. On equal spans the coarser
/// tier wins.
pub fn longest_retention_tier(map: &RetentionMap) -> Option<(Tier, u32)> {
    map.iter()
        .map(|(tier, count)| (tier, count, span_hours(tier, count)))
        .fold(None, |best, candidate| match best {
            Some((_, _, best_span)) if best_span > candidate.2 => best,
            _ => Some(candidate),
        })
        .map(|(tier, count, _)| (tier, count))
}

fn span_hours(tier: Tier, count: u32) -> u64 {
    u64::from(count).saturating_mul(tier.unit().hours())
}
