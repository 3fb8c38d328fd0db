// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle listener traits the hosting runtime calls into.
//!
//! The sharding runtime (or an adapter over it) invokes these hooks inline,
//! on whichever thread processes the corresponding event. Every hook is a
//! fire-and-forget notification: it returns nothing, never blocks and never
//! fails.
//!
//! Regions and shards are identified by an [`Instance`] handle whose
//! [`InstanceId`](crate::InstanceId) must stay stable from construction to
//! stop.
//!
//! # Usage Example
//!
//! ```rust,ignore
//! use shard_metrics::{Instance, RegionLifecycleListener, ShardLifecycleListener};
//!
//! let region = Instance::new("sysA");
//! metrics.region_constructed(&region, "Order");
//!
//! let shard = Instance::new("sysA");
//! metrics.shard_constructed(&shard, "Order", "7");
//! metrics.shard_initialized(&shard);
//! metrics.shard_get_or_create_entity(&shard, "order-42", &live_children);
//! ```

use std::collections::{BTreeSet, HashSet};
use std::hash::BuildHasher;

use crate::identity::Instance;

/// Region lifecycle hooks.
pub trait RegionLifecycleListener: Send + Sync {
    /// The region was constructed for `entity_type`.
    fn region_constructed(&self, region: &Instance, entity_type: &str);

    /// A message was routed through the region.
    ///
    /// Called for every message, including internal control messages.
    /// `message_type` is only used for trace logging.
    fn region_deliver_message(&self, region: &Instance, message_type: &'static str);

    /// The region stopped. No further events are expected for it.
    fn region_stopped(&self, region: &Instance);
}

/// Shard lifecycle hooks.
pub trait ShardLifecycleListener: Send + Sync {
    /// The shard object was constructed. It is not yet hosting anything.
    fn shard_constructed(&self, shard: &Instance, entity_type: &str, shard_id: &str);

    /// The shard acquired its lease (or otherwise finished initialization).
    ///
    /// May be signalled more than once; each signal counts.
    fn shard_initialized(&self, shard: &Instance);

    /// The shard stopped. No further events are expected for it.
    fn shard_stopped(&self, shard: &Instance);

    /// The shard is about to look up or create the entity `entity_id`.
    ///
    /// Must be called *before* the runtime creates the child, with the
    /// shard's current live children.
    fn shard_get_or_create_entity(
        &self,
        shard: &Instance,
        entity_id: &str,
        children: &dyn LiveChildren,
    );

    /// One of the shard's entities terminated.
    fn shard_entity_terminated(&self, shard: &Instance);

    /// A message delivery was attempted through the shard.
    ///
    /// Messages buffered for entities that have not started yet are reported
    /// once when buffered and again when flushed.
    fn shard_deliver_message(&self, shard: &Instance);
}

/// Query over the entity actors a shard currently hosts.
pub trait LiveChildren {
    /// Returns `true` if a live child actor is named `entity_id`.
    fn contains_child(&self, entity_id: &str) -> bool;
}

impl<S: BuildHasher> LiveChildren for HashSet<String, S> {
    fn contains_child(&self, entity_id: &str) -> bool {
        self.contains(entity_id)
    }
}

impl LiveChildren for BTreeSet<String> {
    fn contains_child(&self, entity_id: &str) -> bool {
        self.contains(entity_id)
    }
}
