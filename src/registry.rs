// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::identity::InstrumentKey;
use crate::metrics::{InstrumentSet, InstrumentSnapshot};

/// Process-wide cache of [`InstrumentSet`]s keyed by (system, entity type).
///
/// At most one set is live per key. Regions and shards race to obtain the set
/// for their key from different threads; whichever arrives first creates it
/// and every other caller receives the same `Arc`.
///
/// The map holds one entry per entity type that is actively running, so it is
/// small and changes only when regions start or stop. Lookups are lock-free.
pub struct InstrumentRegistry {
    sets: papaya::HashMap<InstrumentKey, Arc<InstrumentSet>>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self {
            sets: papaya::HashMap::new(),
        }
    }

    /// Returns the set for `(system_name, entity_type)`, creating it if absent.
    ///
    /// Idempotent and linearizable: concurrent callers for the same key all
    /// observe the same instance.
    pub fn obtain_or_create(&self, system_name: &str, entity_type: &str) -> Arc<InstrumentSet> {
        self.obtain(InstrumentKey::new(system_name, entity_type)).0
    }

    /// Like [`obtain_or_create`](Self::obtain_or_create), also reporting
    /// whether this call created the set.
    pub(crate) fn obtain(&self, key: InstrumentKey) -> (Arc<InstrumentSet>, bool) {
        let sets = self.sets.pin();
        if let Some(set) = sets.get(&key) {
            return (Arc::clone(set), false);
        }

        let candidate = Arc::new(InstrumentSet::new(key.clone()));
        match sets.try_insert(key, candidate) {
            Ok(set) => {
                debug!("Created instrument set {}", set.key());
                (Arc::clone(set), true)
            }
            Err(occupied) => (Arc::clone(occupied.current), false),
        }
    }

    /// Returns the live set for a key without creating it.
    pub fn get(&self, system_name: &str, entity_type: &str) -> Option<Arc<InstrumentSet>> {
        self.sets
            .pin()
            .get(&InstrumentKey::new(system_name, entity_type))
            .cloned()
    }

    pub fn contains(&self, system_name: &str, entity_type: &str) -> bool {
        self.get(system_name, entity_type).is_some()
    }

    /// Removes and detaches the set for a key.
    ///
    /// Removing a key that was never created is a no-op. Holders of the
    /// removed set may keep updating it, but it is no longer reported and the
    /// next [`obtain_or_create`](Self::obtain_or_create) starts from zero.
    pub fn remove(&self, system_name: &str, entity_type: &str) -> Option<Arc<InstrumentSet>> {
        self.remove_key(&InstrumentKey::new(system_name, entity_type))
    }

    pub(crate) fn remove_key(&self, key: &InstrumentKey) -> Option<Arc<InstrumentSet>> {
        let removed = self.sets.pin().remove(key).cloned();
        match &removed {
            Some(set) => {
                set.mark_detached();
                debug!("Removed instrument set {}", key);
            }
            None => debug!("Instrument set {} already removed", key),
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Snapshots every live set, sorted by key.
    pub fn snapshot(&self) -> Vec<InstrumentSnapshot> {
        let mut snapshots: Vec<InstrumentSnapshot> = self
            .sets
            .pin()
            .iter()
            .map(|(_, set)| set.snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.key.cmp(&b.key));
        snapshots
    }

    /// Removes and detaches every set.
    pub fn shutdown(&self) {
        let keys: Vec<InstrumentKey> = self.sets.pin().iter().map(|(key, _)| key.clone()).collect();
        for key in &keys {
            self.remove_key(key);
        }
        debug!("Instrument registry shut down, {} set(s) removed", keys.len());
    }
}

impl Default for InstrumentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InstrumentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentRegistry")
            .field("sets", &self.sets.len())
            .finish()
    }
}
