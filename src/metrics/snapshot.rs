// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use crate::identity::InstrumentKey;

/// Immutable snapshot of one [`InstrumentSet`](crate::InstrumentSet).
///
/// This is what an exporter scrapes. Gauges are signed because the trackers
/// never clamp them: a negative value means termination or stop events
/// outnumbered their matching creations.
///
/// # Example
///
/// ```rust,ignore
/// for set in metrics.snapshot() {
///     println!(
///         "{}: {} shards, {} entities, {} messages",
///         set.key, set.hosted_shards, set.hosted_entities, set.processed_messages
///     );
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct InstrumentSnapshot {
    /// The (system, entity type) pair this set belongs to.
    pub key: InstrumentKey,

    /// Shards that signalled initialization and have not stopped.
    pub hosted_shards: i64,

    /// Entities hosted across all shards of the set.
    pub hosted_entities: i64,

    /// Messages delivered through the region and its shards.
    ///
    /// Control messages and buffered-then-flushed messages are included, so
    /// this overcounts user traffic slightly.
    pub processed_messages: u64,

    /// Per-shard breakdown, sorted by shard id.
    pub shards: Vec<ShardSnapshot>,
}

/// Immutable snapshot of one shard's [`PerShardCounters`](crate::PerShardCounters).
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ShardSnapshot {
    pub shard_id: String,
    pub hosted_entities: i64,
    pub processed_messages: u64,
}

impl InstrumentSnapshot {
    /// Looks up the breakdown of one shard.
    pub fn shard(&self, shard_id: &str) -> Option<&ShardSnapshot> {
        self.shards
            .binary_search_by(|s| s.shard_id.as_str().cmp(shard_id))
            .ok()
            .map(|idx| &self.shards[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shard(id: &str, entities: i64) -> ShardSnapshot {
        ShardSnapshot {
            shard_id: id.to_string(),
            hosted_entities: entities,
            processed_messages: 0,
        }
    }

    #[test]
    fn test_shard_lookup() {
        let snapshot = InstrumentSnapshot {
            key: InstrumentKey::new("sysA", "Order"),
            hosted_shards: 2,
            hosted_entities: 3,
            processed_messages: 0,
            shards: vec![shard("1", 1), shard("7", 2)],
        };

        assert_eq!(snapshot.shard("7").map(|s| s.hosted_entities), Some(2));
        assert!(snapshot.shard("4").is_none());
    }

    #[test]
    fn test_snapshot_debug() {
        let snapshot = InstrumentSnapshot {
            key: InstrumentKey::new("sysA", "Order"),
            hosted_shards: 0,
            hosted_entities: 0,
            processed_messages: 0,
            shards: Vec::new(),
        };
        let debug_str = format!("{:?}", snapshot);

        assert!(debug_str.contains("InstrumentSnapshot"));
        assert!(debug_str.contains("hosted_entities"));
    }
}
