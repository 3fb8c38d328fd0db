// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

#[derive(Debug)]
/// Represents errors that can occur while setting up sharding metrics.
///
/// The lifecycle hooks themselves never fail: conditions such as orphan events
/// or counter underflow are absorbed and reported as
/// [`Anomaly`](crate::Anomaly) records instead. Errors are limited to
/// construction and to the outbound call into the addressing subsystem.
pub enum Error {
    /// Error when a configuration value is rejected
    InvalidConfig {
        /// Name of the offending field
        field: &'static str,
        /// Additional context about the error
        details: String,
    },
    /// Error when the addressing subsystem refuses a group definition
    GroupDefinition {
        /// Label of the group that could not be defined
        label: String,
        /// Additional context about the error
        details: String,
    },
}

impl Error {
    /// Returns `true` if retrying the failed operation may succeed.
    ///
    /// Configuration errors are permanent. A refused group definition may be
    /// a transient condition of the addressing subsystem.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::GroupDefinition { .. })
    }
}

/// Implementation of the Display trait for Error enum.
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidConfig { field, details } => {
                write!(f, "Invalid configuration for '{field}': {details}")
            }
            Error::GroupDefinition { label, details } => {
                write!(f, "Failed to define actor group '{label}': {details}")
            }
        }
    }
}

impl std::error::Error for Error {}

/// A Result type specialized for shard-metrics operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::InvalidConfig {
            field: "guardian_name",
            details: "must not be empty".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid configuration for 'guardian_name': must not be empty"
        );

        let err = Error::GroupDefinition {
            label: "shardRegion/Order".into(),
            details: "topology offline".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to define actor group 'shardRegion/Order': topology offline"
        );
    }

    #[test]
    fn test_is_retryable() {
        let config = Error::InvalidConfig {
            field: "group_label_prefix",
            details: "test".into(),
        };
        let group = Error::GroupDefinition {
            label: "g".into(),
            details: "test".into(),
        };

        assert!(!config.is_retryable());
        assert!(group.is_retryable());
    }
}
