// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use super::{Counter, Gauge, InstrumentSnapshot, ShardSnapshot};
use crate::identity::InstrumentKey;

/// The metrics of one (system, entity type) pair.
///
/// A region and all of its shards share a single `InstrumentSet`, obtained
/// through [`InstrumentRegistry::obtain_or_create`](crate::InstrumentRegistry::obtain_or_create).
/// It carries three aggregate instruments:
///
/// - `hosted_shards`: shards that finished initialization and have not stopped
/// - `hosted_entities`: entities currently hosted by those shards
/// - `processed_messages`: messages delivered through the region and its shards
///
/// plus a lazily populated per-shard breakdown ([`PerShardCounters`]).
///
/// Once the owning region stops, the set is removed from the registry and
/// becomes *detached*: it still accepts updates from stragglers but nothing
/// reads it any more.
pub struct InstrumentSet {
    key: InstrumentKey,
    hosted_shards: Gauge,
    hosted_entities: Gauge,
    processed_messages: Counter,
    per_shard: papaya::HashMap<Arc<str>, Arc<PerShardCounters>>,
    detached: AtomicBool,
}

impl InstrumentSet {
    pub(crate) fn new(key: InstrumentKey) -> Self {
        Self {
            key,
            hosted_shards: Gauge::new(),
            hosted_entities: Gauge::new(),
            processed_messages: Counter::new(),
            per_shard: papaya::HashMap::new(),
            detached: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &InstrumentKey {
        &self.key
    }

    pub fn hosted_shards(&self) -> &Gauge {
        &self.hosted_shards
    }

    pub fn hosted_entities(&self) -> &Gauge {
        &self.hosted_entities
    }

    pub fn processed_messages(&self) -> &Counter {
        &self.processed_messages
    }

    /// Returns `true` once the set has been removed from its registry.
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    pub(crate) fn mark_detached(&self) {
        self.detached.store(true, Ordering::Release);
    }

    /// Returns the counters currently registered for `shard_id`, if any.
    pub fn shard(&self, shard_id: &str) -> Option<Arc<PerShardCounters>> {
        self.per_shard.pin().get(shard_id).cloned()
    }

    /// Registers a fresh [`PerShardCounters`] for `shard_id`.
    ///
    /// A shard that is restarted under the same id replaces the counters of
    /// its previous incarnation.
    pub(crate) fn attach_shard(&self, shard_id: &str) -> Arc<PerShardCounters> {
        let counters = Arc::new(PerShardCounters::new(shard_id));
        self.per_shard
            .pin()
            .insert(Arc::clone(&counters.shard_id), Arc::clone(&counters));
        counters
    }

    /// Drops `counters` from the breakdown unless a newer incarnation already
    /// took its place.
    pub(crate) fn detach_shard(&self, counters: &Arc<PerShardCounters>) {
        let _ = self
            .per_shard
            .pin()
            .remove_if(counters.shard_id(), |_, current| Arc::ptr_eq(current, counters));
    }

    /// Creates an immutable snapshot of the aggregates and the per-shard
    /// breakdown, sorted by shard id.
    ///
    /// Each field is read atomically, but the snapshot as a whole may mix
    /// values from slightly different points in time.
    pub fn snapshot(&self) -> InstrumentSnapshot {
        let mut shards: Vec<ShardSnapshot> = self
            .per_shard
            .pin()
            .iter()
            .map(|(_, counters)| counters.snapshot())
            .collect();
        shards.sort_by(|a, b| a.shard_id.cmp(&b.shard_id));

        InstrumentSnapshot {
            key: self.key.clone(),
            hosted_shards: self.hosted_shards.get(),
            hosted_entities: self.hosted_entities.get(),
            processed_messages: self.processed_messages.get(),
            shards,
        }
    }
}

impl fmt::Debug for InstrumentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentSet")
            .field("key", &self.key)
            .field("hosted_shards", &self.hosted_shards.get())
            .field("hosted_entities", &self.hosted_entities.get())
            .field("processed_messages", &self.processed_messages.get())
            .field("shards", &self.per_shard.len())
            .field("detached", &self.is_detached())
            .finish()
    }
}

/// Per-shard decomposition of the aggregate entity and message instruments.
///
/// Counters are updated only through [`ShardBinding`], which pairs every
/// local update with the same update on the parent [`InstrumentSet`].
#[derive(Debug)]
pub struct PerShardCounters {
    shard_id: Arc<str>,
    hosted_entities: AtomicI64,
    processed_messages: AtomicU64,
}

impl PerShardCounters {
    fn new(shard_id: &str) -> Self {
        Self {
            shard_id: Arc::from(shard_id),
            hosted_entities: AtomicI64::new(0),
            processed_messages: AtomicU64::new(0),
        }
    }

    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }

    #[inline]
    pub fn hosted_entities(&self) -> i64 {
        self.hosted_entities.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn processed_messages(&self) -> u64 {
        self.processed_messages.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ShardSnapshot {
        ShardSnapshot {
            shard_id: self.shard_id.to_string(),
            hosted_entities: self.hosted_entities(),
            processed_messages: self.processed_messages(),
        }
    }
}

/// What a shard instance holds: the shared set plus its own counters.
#[derive(Debug, Clone)]
pub struct ShardBinding {
    set: Arc<InstrumentSet>,
    counters: Arc<PerShardCounters>,
}

impl ShardBinding {
    /// Attaches fresh counters for `shard_id` to `set`.
    pub(crate) fn attach(set: Arc<InstrumentSet>, shard_id: &str) -> Self {
        let counters = set.attach_shard(shard_id);
        Self { set, counters }
    }

    pub(crate) fn detach(&self) {
        self.set.detach_shard(&self.counters);
    }

    pub fn set(&self) -> &Arc<InstrumentSet> {
        &self.set
    }

    pub fn counters(&self) -> &Arc<PerShardCounters> {
        &self.counters
    }

    #[inline]
    pub(crate) fn entity_created(&self) {
        self.set.hosted_entities.increment();
        self.counters.hosted_entities.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the new (aggregate, local) entity values, either of which may be
    /// negative after an unmatched termination.
    #[inline]
    pub(crate) fn entity_terminated(&self) -> (i64, i64) {
        let aggregate = self.set.hosted_entities.decrement();
        let local = self.counters.hosted_entities.fetch_sub(1, Ordering::Relaxed) - 1;
        (aggregate, local)
    }

    #[inline]
    pub(crate) fn message_processed(&self) {
        self.set.processed_messages.increment();
        self.counters.processed_messages.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_set() -> Arc<InstrumentSet> {
        Arc::new(InstrumentSet::new(InstrumentKey::new("sysA", "Order")))
    }

    #[test]
    fn test_binding_pairs_local_and_aggregate() {
        let set = order_set();
        let binding = ShardBinding::attach(Arc::clone(&set), "7");

        binding.entity_created();
        binding.entity_created();
        binding.message_processed();

        assert_eq!(set.hosted_entities().get(), 2);
        assert_eq!(binding.counters().hosted_entities(), 2);
        assert_eq!(set.processed_messages().get(), 1);
        assert_eq!(binding.counters().processed_messages(), 1);

        assert_eq!(binding.entity_terminated(), (1, 1));
    }

    #[test]
    fn test_two_shards_decompose_aggregate() {
        let set = order_set();
        let first = ShardBinding::attach(Arc::clone(&set), "1");
        let second = ShardBinding::attach(Arc::clone(&set), "2");

        first.entity_created();
        second.entity_created();
        second.entity_created();

        assert_eq!(set.hosted_entities().get(), 3);
        assert_eq!(first.counters().hosted_entities(), 1);
        assert_eq!(second.counters().hosted_entities(), 2);
    }

    #[test]
    fn test_reattach_replaces_previous_incarnation() {
        let set = order_set();
        let old = ShardBinding::attach(Arc::clone(&set), "3");
        old.message_processed();

        let new = ShardBinding::attach(Arc::clone(&set), "3");
        assert_eq!(set.shard("3").unwrap().processed_messages(), 0);

        // The stale incarnation must not evict its successor.
        old.detach();
        assert!(Arc::ptr_eq(&set.shard("3").unwrap(), new.counters()));

        new.detach();
        assert!(set.shard("3").is_none());
    }

    #[test]
    fn test_snapshot_sorted_by_shard_id() {
        let set = order_set();
        let b = ShardBinding::attach(Arc::clone(&set), "b");
        let _a = ShardBinding::attach(Arc::clone(&set), "a");
        b.message_processed();
        set.hosted_shards().increment();

        let snapshot = set.snapshot();

        assert_eq!(snapshot.hosted_shards, 1);
        assert_eq!(snapshot.processed_messages, 1);
        let ids: Vec<_> = snapshot.shards.iter().map(|s| s.shard_id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(snapshot.shards[1].processed_messages, 1);
    }

    #[test]
    fn test_detached_flag() {
        let set = order_set();
        assert!(!set.is_detached());
        set.mark_detached();
        assert!(set.is_detached());
        assert!(format!("{:?}", set).contains("detached: true"));
    }
}
