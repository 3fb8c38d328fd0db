// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use log::info;

use crate::config::Config;
use crate::error::Result;
use crate::group::GroupRegistrar;
use crate::identity::Instance;
use crate::listener::{LiveChildren, RegionLifecycleListener, ShardLifecycleListener};
use crate::metrics::InstrumentSnapshot;
use crate::registry::InstrumentRegistry;
use crate::tracker::{RegionTracker, ShardTracker};

pub struct Inner {
    config: Config,
    registry: Arc<InstrumentRegistry>,
    region: RegionTracker,
    shard: ShardTracker,
}

impl Inner {
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<InstrumentRegistry> {
        &self.registry
    }

    pub fn region(&self) -> &RegionTracker {
        &self.region
    }

    pub fn shard(&self) -> &ShardTracker {
        &self.shard
    }

    /// Snapshots every live instrument set, sorted by key.
    pub fn snapshot(&self) -> Vec<InstrumentSnapshot> {
        self.registry.snapshot()
    }
}

/// Entry point wiring one [`InstrumentRegistry`] to a region and a shard
/// tracker.
///
/// Construct it once per process and hand clones to the runtime adapter; all
/// clones share the same registry. It implements both listener traits by
/// delegating to the trackers.
///
/// ```rust
/// use std::collections::HashSet;
/// use std::sync::Arc;
/// use shard_metrics::{
///     Config, GroupCatalog, Instance, RegionLifecycleListener, ShardLifecycleListener,
///     ShardingMetrics,
/// };
///
/// let catalog = Arc::new(GroupCatalog::new());
/// let metrics = ShardingMetrics::new(Config::default(), catalog.clone()).unwrap();
///
/// let region = Instance::new("sysA");
/// metrics.region_constructed(&region, "Order");
///
/// let shard = Instance::new("sysA");
/// metrics.shard_constructed(&shard, "Order", "7");
/// metrics.shard_initialized(&shard);
/// metrics.shard_get_or_create_entity(&shard, "order-1", &HashSet::<String>::new());
///
/// let snapshot = &metrics.snapshot()[0];
/// assert_eq!(snapshot.hosted_shards, 1);
/// assert_eq!(snapshot.hosted_entities, 1);
/// assert_eq!(catalog.len(), 1);
/// ```
#[derive(Clone)]
pub struct ShardingMetrics {
    inner: Arc<Inner>,
}

impl Deref for ShardingMetrics {
    type Target = Inner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl ShardingMetrics {
    /// Validates `config` and builds a fresh registry and trackers.
    pub fn new(config: Config, registrar: Arc<dyn GroupRegistrar>) -> Result<Self> {
        Self::with_registry(config, registrar, Arc::new(InstrumentRegistry::new()))
    }

    /// Like [`new`](Self::new), sharing an existing registry.
    pub fn with_registry(
        config: Config,
        registrar: Arc<dyn GroupRegistrar>,
        registry: Arc<InstrumentRegistry>,
    ) -> Result<Self> {
        config.validate()?;
        let region = RegionTracker::new(Arc::clone(&registry), registrar, config.clone());
        let shard = ShardTracker::new(Arc::clone(&registry));
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                registry,
                region,
                shard,
            }),
        })
    }

    /// Removes every instrument set. Trackers keep running, so instances that
    /// are still alive update detached sets until they stop.
    pub fn shutdown(&self) {
        info!(
            "Shutting down sharding metrics: {} region(s), {} shard(s) still tracked",
            self.region.len(),
            self.shard.len()
        );
        self.registry.shutdown();
    }
}

impl fmt::Debug for ShardingMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardingMetrics")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("region", &self.region)
            .field("shard", &self.shard)
            .finish()
    }
}

impl RegionLifecycleListener for ShardingMetrics {
    fn region_constructed(&self, region: &Instance, entity_type: &str) {
        self.region.on_constructed(region, entity_type);
    }

    fn region_deliver_message(&self, region: &Instance, message_type: &'static str) {
        self.region.on_deliver_message(region, message_type);
    }

    fn region_stopped(&self, region: &Instance) {
        self.region.on_stopped(region);
    }
}

impl ShardLifecycleListener for ShardingMetrics {
    fn shard_constructed(&self, shard: &Instance, entity_type: &str, shard_id: &str) {
        self.shard.on_constructed(shard, entity_type, shard_id);
    }

    fn shard_initialized(&self, shard: &Instance) {
        self.shard.on_initialized(shard);
    }

    fn shard_stopped(&self, shard: &Instance) {
        self.shard.on_stopped(shard);
    }

    fn shard_get_or_create_entity(
        &self,
        shard: &Instance,
        entity_id: &str,
        children: &dyn LiveChildren,
    ) {
        self.shard.on_get_or_create_entity(shard, entity_id, children);
    }

    fn shard_entity_terminated(&self, shard: &Instance) {
        self.shard.on_entity_terminated(shard);
    }

    fn shard_deliver_message(&self, shard: &Instance) {
        self.shard.on_deliver_message(shard);
    }
}
