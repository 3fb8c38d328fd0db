// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Actor group definitions published to the addressing subsystem.
//!
//! When a region is constructed it declares the address space of its
//! entities, so that topology views can group every entity of a type under a
//! single label:
//!
//! ```text
//! label:   shardRegion/Order
//! pattern: sysA/system/sharding/Order/*/*
//!                                     ^ ^
//!                               shard id entity id
//! ```

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::Config;
use crate::error::Result;

/// A labelled glob pattern over actor addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupDefinition {
    label: String,
    pattern: String,
}

impl GroupDefinition {
    pub fn new(label: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            pattern: pattern.into(),
        }
    }

    /// Builds the definition covering every entity of `entity_type` in `system_name`.
    pub fn for_region(config: &Config, system_name: &str, entity_type: &str) -> Self {
        Self {
            label: format!("{}/{}", config.group_label_prefix(), entity_type),
            pattern: format!(
                "{}/system/{}/{}/*/*",
                system_name,
                config.guardian_name(),
                entity_type
            ),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Tests an address against the pattern.
    ///
    /// Matching is per `/`-separated segment; `*` matches exactly one
    /// non-empty segment.
    pub fn matches(&self, address: &str) -> bool {
        let mut pattern = self.pattern.split('/');
        let mut address = address.split('/');
        loop {
            match (pattern.next(), address.next()) {
                (None, None) => return true,
                (Some("*"), Some(segment)) if !segment.is_empty() => {}
                (Some(expected), Some(segment)) if expected == segment => {}
                _ => return false,
            }
        }
    }
}

impl fmt::Display for GroupDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.label, self.pattern)
    }
}

/// The addressing/topology subsystem that receives group definitions.
pub trait GroupRegistrar: Send + Sync {
    /// Registers `definition`. Redefining a label replaces its pattern.
    fn define_group(&self, definition: &GroupDefinition) -> Result<()>;
}

/// Registrar that discards every definition.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopGroupRegistrar;

impl GroupRegistrar for NoopGroupRegistrar {
    fn define_group(&self, _definition: &GroupDefinition) -> Result<()> {
        Ok(())
    }
}

/// In-memory registrar keeping definitions in publication order.
#[derive(Debug, Default)]
pub struct GroupCatalog {
    definitions: Mutex<Vec<GroupDefinition>>,
}

impl GroupCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every definition, oldest first.
    pub fn definitions(&self) -> Vec<GroupDefinition> {
        self.lock().clone()
    }

    /// Returns the labels of every group whose pattern matches `address`.
    pub fn groups_for(&self, address: &str) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|def| def.matches(address))
            .map(|def| def.label.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // The catalog stays usable after a panic in another thread.
    fn lock(&self) -> MutexGuard<'_, Vec<GroupDefinition>> {
        self.definitions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl GroupRegistrar for GroupCatalog {
    fn define_group(&self, definition: &GroupDefinition) -> Result<()> {
        let mut defs = self.lock();
        match defs.iter_mut().find(|def| def.label == definition.label) {
            Some(existing) => existing.pattern = definition.pattern.clone(),
            None => defs.push(definition.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_region_uses_config() {
        let def = GroupDefinition::for_region(&Config::default(), "sysA", "Order");

        assert_eq!(def.label(), "shardRegion/Order");
        assert_eq!(def.pattern(), "sysA/system/sharding/Order/*/*");

        let custom = Config::default()
            .with_guardian_name("cluster-sharding")
            .with_group_label_prefix("region");
        let def = GroupDefinition::for_region(&custom, "sysA", "Order");
        assert_eq!(def.label(), "region/Order");
        assert_eq!(def.pattern(), "sysA/system/cluster-sharding/Order/*/*");
    }

    #[test]
    fn test_matches_entity_addresses() {
        let def = GroupDefinition::for_region(&Config::default(), "sysA", "Order");

        assert!(def.matches("sysA/system/sharding/Order/7/order-42"));
        assert!(!def.matches("sysA/system/sharding/Order/7"));
        assert!(!def.matches("sysA/system/sharding/Order/7/order-42/child"));
        assert!(!def.matches("sysA/system/sharding/Cart/7/cart-1"));
        assert!(!def.matches("sysA/system/sharding/Order//order-42"));
    }

    #[test]
    fn test_catalog_replaces_by_label() {
        let catalog = GroupCatalog::new();
        catalog
            .define_group(&GroupDefinition::new("shardRegion/Order", "a/*"))
            .unwrap();
        catalog
            .define_group(&GroupDefinition::new("shardRegion/Cart", "b/*"))
            .unwrap();
        catalog
            .define_group(&GroupDefinition::new("shardRegion/Order", "c/*"))
            .unwrap();

        let defs = catalog.definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].pattern(), "c/*");
        assert_eq!(catalog.groups_for("b/x"), ["shardRegion/Cart"]);
    }

    #[test]
    fn test_noop_registrar() {
        let def = GroupDefinition::new("l", "p");
        assert!(NoopGroupRegistrar.define_group(&def).is_ok());
    }
}
