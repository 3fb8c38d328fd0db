// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// Counter for generating unique instance IDs.
static INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one region or shard instance.
///
/// The trackers key their side tables by this id, so the hosting runtime never
/// has to carry metric fields inside its own region or shard objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Allocates a fresh id. Ids are never reused within a process.
    pub fn next() -> Self {
        InstanceId(INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Wraps an id assigned by the hosting runtime.
    pub const fn from_raw(id: u64) -> Self {
        InstanceId(id)
    }

    /// Returns the raw numeric id.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to a running region or shard, as seen by the lifecycle hooks.
///
/// Cloning is cheap: the system name is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instance {
    id: InstanceId,
    system_name: Arc<str>,
}

impl Instance {
    /// Creates a handle with a freshly allocated [`InstanceId`].
    pub fn new(system_name: impl Into<Arc<str>>) -> Self {
        Self::with_id(InstanceId::next(), system_name)
    }

    /// Creates a handle for an id the hosting runtime already owns.
    pub fn with_id(id: InstanceId, system_name: impl Into<Arc<str>>) -> Self {
        Instance {
            id,
            system_name: system_name.into(),
        }
    }

    pub const fn id(&self) -> InstanceId {
        self.id
    }

    /// Name of the actor system hosting this instance.
    pub fn system_name(&self) -> &str {
        &self.system_name
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.system_name, self.id)
    }
}

/// Key of an [`InstrumentSet`](crate::InstrumentSet): one per (system, entity type).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrumentKey {
    system_name: Arc<str>,
    entity_type: Arc<str>,
}

impl InstrumentKey {
    pub fn new(system_name: impl Into<Arc<str>>, entity_type: impl Into<Arc<str>>) -> Self {
        InstrumentKey {
            system_name: system_name.into(),
            entity_type: entity_type.into(),
        }
    }

    pub fn system_name(&self) -> &str {
        &self.system_name
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.system_name, self.entity_type)
    }
}
