// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::sync::Arc;

use log::{debug, trace};

use super::state::{ShardState, StateCell};
use crate::anomaly::{self, Anomaly, Site};
use crate::identity::{Instance, InstanceId, InstrumentKey};
use crate::listener::{LiveChildren, ShardLifecycleListener};
use crate::metrics::ShardBinding;
use crate::registry::InstrumentRegistry;

struct ShardEntry {
    binding: ShardBinding,
    state: StateCell<ShardState>,
}

impl ShardEntry {
    fn site(&self, id: InstanceId) -> Site<'_> {
        Site::instance(id)
            .with_key(self.binding.set().key())
            .with_shard(self.binding.counters().shard_id())
    }
}

/// Tracks shard instances: `Constructed -> Initialized -> Stopped`.
///
/// Each shard shares its region's [`InstrumentSet`](crate::InstrumentSet) and
/// owns a [`PerShardCounters`](crate::PerShardCounters); every entity and
/// message update is applied to both.
///
/// # Accepted imprecision
///
/// These behaviours are kept on purpose, since dashboards built on top of the
/// counters are calibrated to them:
///
/// - every initialization signal increments `hosted_shards`, including repeated
///   ones after a lease is re-acquired;
/// - `hosted_shards` is decremented on stop even if the shard never initialized;
/// - messages buffered for a starting entity are counted when buffered and
///   again when flushed;
/// - unmatched entity terminations drive `hosted_entities` below zero.
pub struct ShardTracker {
    registry: Arc<InstrumentRegistry>,
    shards: papaya::HashMap<InstanceId, ShardEntry>,
}

impl ShardTracker {
    pub fn new(registry: Arc<InstrumentRegistry>) -> Self {
        Self {
            registry,
            shards: papaya::HashMap::new(),
        }
    }

    /// Attaches the shared instrument set and fresh counters for `shard_id`.
    ///
    /// If the region has not created the set yet, the shard creates it; the
    /// region will later obtain the same instance.
    pub fn on_constructed(&self, shard: &Instance, entity_type: &str, shard_id: &str) {
        let shards = self.shards.pin();
        if shards.contains_key(&shard.id()) {
            anomaly::record(
                Anomaly::DuplicateInitialization,
                Site::instance(shard.id()).with_shard(shard_id),
                "shard_constructed",
            );
            return;
        }

        let key = InstrumentKey::new(shard.system_name(), entity_type);
        let (set, created) = self.registry.obtain(key);
        if created {
            anomaly::record(
                Anomaly::MissingInstrumentSet,
                Site::instance(shard.id())
                    .with_key(set.key())
                    .with_shard(shard_id),
                "shard_constructed",
            );
        }

        let entry = ShardEntry {
            binding: ShardBinding::attach(set, shard_id),
            state: StateCell::new(ShardState::Constructed),
        };
        debug!(
            "Shard {} ({}) constructed for {}",
            shard_id,
            shard,
            entry.binding.set().key()
        );
        let _ = shards.try_insert(shard.id(), entry);
    }

    /// Counts the shard as hosted.
    ///
    /// A repeated signal without an intervening stop is recorded as an
    /// anomaly but still increments.
    pub fn on_initialized(&self, shard: &Instance) {
        let shards = self.shards.pin();
        let Some(entry) = shards.get(&shard.id()) else {
            return orphan(shard, "shard_initialized");
        };
        if entry.state.replace(ShardState::Initialized) == ShardState::Initialized {
            anomaly::record(
                Anomaly::DuplicateInitialization,
                entry.site(shard.id()),
                "shard_initialized",
            );
        }
        let hosted = entry.binding.set().hosted_shards().increment();
        debug!(
            "Shard {} initialized, {} hosting {} shard(s)",
            entry.binding.counters().shard_id(),
            entry.binding.set().key(),
            hosted
        );
    }

    /// Uncounts the shard and discards its counters. The instrument set stays
    /// with the region.
    pub fn on_stopped(&self, shard: &Instance) {
        let shards = self.shards.pin();
        let Some(entry) = shards.remove(&shard.id()) else {
            return orphan(shard, "shard_stopped");
        };
        entry.state.set(ShardState::Stopped);
        let hosted = entry.binding.set().hosted_shards().decrement();
        if hosted < 0 {
            anomaly::record(
                Anomaly::CounterUnderflow,
                entry.site(shard.id()),
                "shard_stopped",
            );
        }
        entry.binding.detach();
        debug!(
            "Shard {} stopped, {} hosting {} shard(s)",
            entry.binding.counters().shard_id(),
            entry.binding.set().key(),
            hosted
        );
    }

    /// Infers entity creation from the absence of a live child.
    ///
    /// Must run before the runtime creates the child: if no child named
    /// `entity_id` exists, one is about to be created and is counted now.
    /// Otherwise this is a lookup of an existing entity and nothing changes.
    #[inline]
    pub fn on_get_or_create_entity(
        &self,
        shard: &Instance,
        entity_id: &str,
        children: &dyn LiveChildren,
    ) {
        let shards = self.shards.pin();
        let Some(entry) = shards.get(&shard.id()) else {
            return orphan(shard, "shard_get_or_create_entity");
        };
        if !children.contains_child(entity_id) {
            entry.binding.entity_created();
            trace!(
                "Entity {} created in shard {}",
                entity_id,
                entry.binding.counters().shard_id()
            );
        }
    }

    /// Uncounts one entity. No reconciliation is attempted.
    #[inline]
    pub fn on_entity_terminated(&self, shard: &Instance) {
        let shards = self.shards.pin();
        let Some(entry) = shards.get(&shard.id()) else {
            return orphan(shard, "shard_entity_terminated");
        };
        let (aggregate, local) = entry.binding.entity_terminated();
        if aggregate < 0 || local < 0 {
            anomaly::record(
                Anomaly::CounterUnderflow,
                entry.site(shard.id()),
                "shard_entity_terminated",
            );
        }
    }

    /// Counts one delivery attempt through the shard.
    #[inline]
    pub fn on_deliver_message(&self, shard: &Instance) {
        let shards = self.shards.pin();
        match shards.get(&shard.id()) {
            Some(entry) => entry.binding.message_processed(),
            None => orphan(shard, "shard_deliver_message"),
        }
    }

    /// Returns the binding of a tracked shard.
    pub fn binding(&self, shard: &Instance) -> Option<ShardBinding> {
        self.shards
            .pin()
            .get(&shard.id())
            .map(|entry| entry.binding.clone())
    }

    /// Returns the state of a tracked shard, or `None` once it has stopped.
    pub fn state(&self, shard: &Instance) -> Option<ShardState> {
        self.shards.pin().get(&shard.id()).map(|entry| entry.state.get())
    }

    /// Number of shards constructed and not yet stopped.
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}

fn orphan(shard: &Instance, operation: &'static str) {
    anomaly::record(Anomaly::OrphanEvent, Site::instance(shard.id()), operation);
}

impl ShardLifecycleListener for ShardTracker {
    fn shard_constructed(&self, shard: &Instance, entity_type: &str, shard_id: &str) {
        self.on_constructed(shard, entity_type, shard_id);
    }

    fn shard_initialized(&self, shard: &Instance) {
        self.on_initialized(shard);
    }

    fn shard_stopped(&self, shard: &Instance) {
        self.on_stopped(shard);
    }

    fn shard_get_or_create_entity(
        &self,
        shard: &Instance,
        entity_id: &str,
        children: &dyn LiveChildren,
    ) {
        self.on_get_or_create_entity(shard, entity_id, children);
    }

    fn shard_entity_terminated(&self, shard: &Instance) {
        self.on_entity_terminated(shard);
    }

    fn shard_deliver_message(&self, shard: &Instance) {
        self.on_deliver_message(shard);
    }
}

impl fmt::Debug for ShardTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardTracker")
            .field("shards", &self.shards.len())
            .finish()
    }
}
