// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::sync::Arc;

use log::{debug, info, trace, warn};

use super::state::{RegionState, StateCell};
use crate::anomaly::{self, Anomaly, Site};
use crate::config::Config;
use crate::group::{GroupDefinition, GroupRegistrar};
use crate::identity::{Instance, InstanceId, InstrumentKey};
use crate::listener::RegionLifecycleListener;
use crate::metrics::InstrumentSet;
use crate::registry::InstrumentRegistry;

struct RegionEntry {
    set: Arc<InstrumentSet>,
    state: StateCell<RegionState>,
}

/// Tracks region instances: `Uninitialized -> Active -> Stopped`.
///
/// A region owns the lifetime of its [`InstrumentSet`]: the set is obtained
/// (or created) when the region is constructed and removed from the registry
/// when the region stops. Shards of the region share the same set.
pub struct RegionTracker {
    registry: Arc<InstrumentRegistry>,
    registrar: Arc<dyn GroupRegistrar>,
    config: Config,
    regions: papaya::HashMap<InstanceId, RegionEntry>,
}

impl RegionTracker {
    pub fn new(
        registry: Arc<InstrumentRegistry>,
        registrar: Arc<dyn GroupRegistrar>,
        config: Config,
    ) -> Self {
        Self {
            registry,
            registrar,
            config,
            regions: papaya::HashMap::new(),
        }
    }

    /// Attaches the instrument set for `(region.system_name, entity_type)` and
    /// publishes the region's group definition.
    ///
    /// A second construction event for the same instance is ignored, so the
    /// group is published exactly once per region instance.
    pub fn on_constructed(&self, region: &Instance, entity_type: &str) {
        let regions = self.regions.pin();
        if regions.contains_key(&region.id()) {
            anomaly::record(
                Anomaly::DuplicateInitialization,
                Site::instance(region.id()),
                "region_constructed",
            );
            return;
        }

        let key = InstrumentKey::new(region.system_name(), entity_type);
        let (set, _) = self.registry.obtain(key);
        let entry = RegionEntry {
            set,
            state: StateCell::new(RegionState::Uninitialized),
        };
        let entry = match regions.try_insert(region.id(), entry) {
            Ok(entry) => entry,
            Err(_) => {
                anomaly::record(
                    Anomaly::DuplicateInitialization,
                    Site::instance(region.id()),
                    "region_constructed",
                );
                return;
            }
        };
        entry.state.set(RegionState::Active);
        debug!("Region {} constructed for {}", region, entry.set.key());

        if self.config.publish_groups() {
            self.publish_group(region.system_name(), entity_type);
        }
    }

    /// Counts one message routed through the region.
    #[inline]
    pub fn on_deliver_message(&self, region: &Instance, message_type: &'static str) {
        let regions = self.regions.pin();
        match regions.get(&region.id()) {
            Some(entry) if entry.state.get() == RegionState::Active => {
                entry.set.processed_messages().increment();
                trace!("Region {} delivered {}", region, message_type);
            }
            _ => anomaly::record(
                Anomaly::OrphanEvent,
                Site::instance(region.id()),
                "region_deliver_message",
            ),
        }
    }

    /// Moves the region to `Stopped` and removes its instrument set.
    pub fn on_stopped(&self, region: &Instance) {
        let regions = self.regions.pin();
        let Some(entry) = regions.remove(&region.id()) else {
            anomaly::record(
                Anomaly::OrphanEvent,
                Site::instance(region.id()),
                "region_stopped",
            );
            return;
        };
        entry.state.set(RegionState::Stopped);
        self.registry.remove_key(entry.set.key());
        debug!("Region {} stopped, {} removed", region, entry.set.key());
    }

    /// Returns the instrument set attached to an active region.
    pub fn instrument_set(&self, region: &Instance) -> Option<Arc<InstrumentSet>> {
        self.regions
            .pin()
            .get(&region.id())
            .map(|entry| Arc::clone(&entry.set))
    }

    /// Returns the state of a tracked region, or `None` once it has stopped.
    pub fn state(&self, region: &Instance) -> Option<RegionState> {
        self.regions.pin().get(&region.id()).map(|entry| entry.state.get())
    }

    /// Number of regions currently active.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    fn publish_group(&self, system_name: &str, entity_type: &str) {
        let definition = GroupDefinition::for_region(&self.config, system_name, entity_type);
        match self.registrar.define_group(&definition) {
            Ok(()) => info!("Published actor group {}", definition),
            Err(e) => warn!("Could not publish actor group {}: {}", definition, e),
        }
    }
}

impl RegionLifecycleListener for RegionTracker {
    fn region_constructed(&self, region: &Instance, entity_type: &str) {
        self.on_constructed(region, entity_type);
    }

    fn region_deliver_message(&self, region: &Instance, message_type: &'static str) {
        self.on_deliver_message(region, message_type);
    }

    fn region_stopped(&self, region: &Instance) {
        self.on_stopped(region);
    }
}

impl fmt::Debug for RegionTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionTracker")
            .field("config", &self.config)
            .field("regions", &self.regions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::GroupCatalog;

    fn tracker() -> (RegionTracker, Arc<InstrumentRegistry>, Arc<GroupCatalog>) {
        let registry = Arc::new(InstrumentRegistry::new());
        let catalog = Arc::new(GroupCatalog::new());
        let tracker = RegionTracker::new(
            Arc::clone(&registry),
            Arc::clone(&catalog) as Arc<dyn GroupRegistrar>,
            Config::default(),
        );
        (tracker, registry, catalog)
    }

    #[test]
    fn test_constructed_attaches_registry_set() {
        let (tracker, registry, _) = tracker();
        let region = Instance::new("sysA");

        tracker.on_constructed(&region, "Order");

        let attached = tracker.instrument_set(&region).unwrap();
        let shared = registry.obtain_or_create("sysA", "Order");
        assert!(Arc::ptr_eq(&attached, &shared));
        assert_eq!(tracker.state(&region), Some(RegionState::Active));
    }

    #[test]
    fn test_deliver_counts_every_message() {
        let (tracker, registry, _) = tracker();
        let region = Instance::new("sysA");
        tracker.on_constructed(&region, "Order");

        tracker.on_deliver_message(&region, "PlaceOrder");
        tracker.on_deliver_message(&region, "ShardRestart");

        let set = registry.get("sysA", "Order").unwrap();
        assert_eq!(set.processed_messages().get(), 2);
    }

    #[test]
    fn test_stopped_removes_set() {
        let (tracker, registry, _) = tracker();
        let region = Instance::new("sysA");
        tracker.on_constructed(&region, "Order");
        let set = tracker.instrument_set(&region).unwrap();

        tracker.on_stopped(&region);

        assert!(set.is_detached());
        assert!(!registry.contains("sysA", "Order"));
        assert!(tracker.state(&region).is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_orphan_delivery_is_absorbed() {
        let (tracker, _, _) = tracker();
        let region = Instance::new("sysA");
        tracker.on_constructed(&region, "Order");
        let set = tracker.instrument_set(&region).unwrap();
        tracker.on_stopped(&region);

        let before = anomaly::anomaly_count(Anomaly::OrphanEvent);
        tracker.on_deliver_message(&region, "Late");
        tracker.on_stopped(&region);

        assert_eq!(set.processed_messages().get(), 0);
        assert!(anomaly::anomaly_count(Anomaly::OrphanEvent) >= before + 2);
    }

    #[test]
    fn test_group_published_once_per_instance() {
        let (tracker, _, catalog) = tracker();
        let region = Instance::new("sysA");

        tracker.on_constructed(&region, "Order");
        tracker.on_constructed(&region, "Order");

        let defs = catalog.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].label(), "shardRegion/Order");
        assert_eq!(defs[0].pattern(), "sysA/system/sharding/Order/*/*");
    }

    #[test]
    fn test_publication_can_be_disabled() {
        let registry = Arc::new(InstrumentRegistry::new());
        let catalog = Arc::new(GroupCatalog::new());
        let tracker = RegionTracker::new(
            registry,
            Arc::clone(&catalog) as Arc<dyn GroupRegistrar>,
            Config::default().with_publish_groups(false),
        );

        tracker.on_constructed(&Instance::new("sysA"), "Order");

        assert!(catalog.is_empty());
    }
}
