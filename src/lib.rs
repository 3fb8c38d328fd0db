// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! # shard-metrics: Lifecycle-driven metrics for sharded actors
//!
//! `shard-metrics` observes a sharded actor runtime through lifecycle hooks
//! and maintains live operational metrics for it: how many shards and
//! entities each region hosts and how many messages flow through them.
//!
//! It is a monitoring layer, not sharding logic. Message routing, rebalancing,
//! persistence and membership stay in the hosting runtime; this crate only
//! accounts for their effects.
//!
//! ## Features
//!
//! - **Per entity type instruments**: one [`InstrumentSet`] per
//!   (system, entity type), shared by the region and all of its shards.
//! - **Per shard breakdown**: [`PerShardCounters`] decompose the entity and
//!   message aggregates by shard id.
//! - **Leak-free lifecycle**: an instrument set is removed when its region
//!   stops; shards never remove it.
//! - **Hot-path safe**: hooks are synchronous, lock-free on the common path and
//!   never fail. Unexpected conditions are absorbed as [`Anomaly`] records.
//!
//! ## Core Concepts
//!
//! - **[`InstrumentRegistry`]**: process-wide cache with obtain-or-create and
//!   remove semantics; at most one set per key.
//! - **[`RegionTracker`]** / **[`ShardTracker`]**: state machines driven by
//!   the runtime's lifecycle events.
//! - **[`RegionLifecycleListener`]** / **[`ShardLifecycleListener`]**: the
//!   hook interfaces an adapter over the runtime calls.
//! - **[`GroupDefinition`]**: the entity address space a region publishes to
//!   the addressing subsystem through a [`GroupRegistrar`].
//! - **[`ShardingMetrics`]**: facade wiring everything together.
//!
//! ## Getting Started
//!
//! ```rust
//! use std::collections::HashSet;
//! use std::sync::Arc;
//! use shard_metrics::{
//!     Config, Instance, NoopGroupRegistrar, RegionLifecycleListener, ShardLifecycleListener,
//!     ShardingMetrics,
//! };
//!
//! let metrics = ShardingMetrics::new(Config::default(), Arc::new(NoopGroupRegistrar))
//!     .expect("default config is valid");
//!
//! // The runtime adapter reports lifecycle events as they happen.
//! let region = Instance::new("sysA");
//! metrics.region_constructed(&region, "Order");
//!
//! let shard = Instance::new("sysA");
//! metrics.shard_constructed(&shard, "Order", "7");
//! metrics.shard_initialized(&shard);
//!
//! let mut children: HashSet<String> = HashSet::new();
//! for entity_id in ["a", "b", "a"] {
//!     metrics.shard_get_or_create_entity(&shard, entity_id, &children);
//!     children.insert(entity_id.to_string());
//!     metrics.shard_deliver_message(&shard);
//! }
//!
//! let order = &metrics.snapshot()[0];
//! assert_eq!(order.hosted_shards, 1);
//! assert_eq!(order.hosted_entities, 2);
//! assert_eq!(order.processed_messages, 3);
//! assert_eq!(order.shard("7").map(|s| s.hosted_entities), Some(2));
//!
//! metrics.shard_stopped(&shard);
//! metrics.region_stopped(&region);
//! assert!(metrics.snapshot().is_empty());
//! ```
//!
//! ## Known imprecision
//!
//! Counters follow the runtime's events as delivered. Repeated initialization
//! signals are all counted, buffered messages are counted when buffered and
//! again when flushed, and unmatched terminations drive gauges negative.
//! See [`ShardTracker`] for details.

mod anomaly;
mod config;
mod error;
mod group;
mod identity;
mod listener;
pub mod metrics;
mod registry;
mod system;
mod tracker;

pub use anomaly::Anomaly;
#[cfg(any(test, feature = "test-utils"))]
pub use anomaly::{anomaly_count, reset_anomaly_count};
pub use config::{Config, DEFAULT_GROUP_LABEL_PREFIX, DEFAULT_GUARDIAN_NAME};
pub use error::{Error, Result};
pub use group::{GroupCatalog, GroupDefinition, GroupRegistrar, NoopGroupRegistrar};
pub use identity::{Instance, InstanceId, InstrumentKey};
pub use listener::{LiveChildren, RegionLifecycleListener, ShardLifecycleListener};
pub use metrics::{
    Counter, Gauge, InstrumentSet, InstrumentSnapshot, PerShardCounters, ShardBinding,
    ShardSnapshot,
};
pub use registry::InstrumentRegistry;
pub use system::{Inner, ShardingMetrics};
pub use tracker::{RegionState, RegionTracker, ShardState, ShardTracker};
