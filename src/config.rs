// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};

/// Default name of the sharding guardian actor under `/system`.
pub const DEFAULT_GUARDIAN_NAME: &str = "sharding";

/// Default prefix of the label regions publish their group under.
pub const DEFAULT_GROUP_LABEL_PREFIX: &str = "shardRegion";

/// Settings for [`ShardingMetrics`](crate::ShardingMetrics).
///
/// ```rust
/// use shard_metrics::Config;
///
/// let config = Config::default().with_guardian_name("cluster-sharding");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    guardian_name: String,
    group_label_prefix: String,
    publish_groups: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            guardian_name: DEFAULT_GUARDIAN_NAME.to_string(),
            group_label_prefix: DEFAULT_GROUP_LABEL_PREFIX.to_string(),
            publish_groups: true,
        }
    }
}

impl Config {
    /// Sets the guardian name used in published address patterns.
    pub fn with_guardian_name(mut self, name: impl Into<String>) -> Self {
        self.guardian_name = name.into();
        self
    }

    pub fn with_group_label_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.group_label_prefix = prefix.into();
        self
    }

    /// Enables or disables group publication on region construction.
    pub fn with_publish_groups(mut self, publish: bool) -> Self {
        self.publish_groups = publish;
        self
    }

    pub fn guardian_name(&self) -> &str {
        &self.guardian_name
    }

    pub fn group_label_prefix(&self) -> &str {
        &self.group_label_prefix
    }

    pub fn publish_groups(&self) -> bool {
        self.publish_groups
    }

    /// Checks that every value can be embedded as a single path segment.
    pub fn validate(&self) -> Result<()> {
        validate_segment("guardian_name", &self.guardian_name)?;
        validate_segment("group_label_prefix", &self.group_label_prefix)
    }
}

fn validate_segment(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidConfig {
            field,
            details: "must not be empty".to_string(),
        });
    }
    if value.contains('/') {
        return Err(Error::InvalidConfig {
            field,
            details: format!("'{value}' must not contain '/'"),
        });
    }
    Ok(())
}
