// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Anomaly Tracking Module
//!
//! The lifecycle hooks run inline on the hosting runtime's message-processing
//! threads, so they must never fail. Conditions that would be errors elsewhere
//! are absorbed and recorded here instead.
//!
//! # Taxonomy
//!
//! | Anomaly | Cause | Policy |
//! |---------|-------|--------|
//! | `DuplicateInitialization` | a shard re-signals initialization without stopping | still increments `hosted_shards` |
//! | `OrphanEvent` | an event for a region/shard that is stopped or unknown | no-op |
//! | `MissingInstrumentSet` | a shard is constructed before its region | the shard creates the set |
//! | `CounterUnderflow` | a decrement drives a gauge below zero | not clamped |
//!
//! # Observability
//!
//! Anomalies are logged with structured fields via `tracing`:
//!
//! ```text
//! WARN shard_metrics::anomaly: Sharding metrics anomaly absorbed
//!   anomaly.kind="orphan event"
//!   anomaly.operation="shard_deliver_message"
//!   instance.id=42
//!   instrument.key="sysA/Order"
//!   shard.id="7"
//! ```
//!
//! Orphan events and underflows are logged at `WARN`. Duplicate initialization
//! and missing instrument sets are expected in normal operation and are logged
//! at `DEBUG`.
//!
//! # Testing Support
//!
//! When the `test-utils` feature is enabled (or in unit tests), per-kind
//! counters track how many anomalies were recorded. Use `anomaly_count()` and
//! `reset_anomaly_count()` to inspect and reset them.
//!
//! ```toml
//! [dev-dependencies]
//! shard-metrics = { version = "...", features = ["test-utils"] }
//! ```

use crate::identity::{InstanceId, InstrumentKey};

#[cfg(any(test, feature = "test-utils"))]
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(any(test, feature = "test-utils"))]
static ANOMALY_COUNTS: [AtomicU64; Anomaly::COUNT] = [
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
];

/// A condition absorbed by the trackers instead of being raised.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking existing code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Anomaly {
    /// A shard signalled initialization again without an intervening stop.
    ///
    /// Every signal is applied, so `hosted_shards` drifts upward by one per
    /// repeated signal.
    DuplicateInitialization,

    /// An event arrived for a region or shard that has stopped or was never
    /// constructed. The event is ignored.
    OrphanEvent,

    /// A shard was constructed before its region created the instrument set.
    ///
    /// Resolved by letting the shard create the set.
    MissingInstrumentSet,

    /// A decrement drove a gauge below zero.
    CounterUnderflow,
}

impl Anomaly {
    #[cfg(any(test, feature = "test-utils"))]
    const COUNT: usize = 4;

    #[cfg(any(test, feature = "test-utils"))]
    const fn index(self) -> usize {
        match self {
            Anomaly::DuplicateInitialization => 0,
            Anomaly::OrphanEvent => 1,
            Anomaly::MissingInstrumentSet => 2,
            Anomaly::CounterUnderflow => 3,
        }
    }

    /// Whether this anomaly signals lost fidelity rather than expected drift.
    pub const fn is_warning(self) -> bool {
        matches!(self, Anomaly::OrphanEvent | Anomaly::CounterUnderflow)
    }
}

impl std::fmt::Display for Anomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Anomaly::DuplicateInitialization => write!(f, "duplicate initialization"),
            Anomaly::OrphanEvent => write!(f, "orphan event"),
            Anomaly::MissingInstrumentSet => write!(f, "missing instrument set"),
            Anomaly::CounterUnderflow => write!(f, "counter underflow"),
        }
    }
}

/// Where an anomaly was observed.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Site<'a> {
    pub instance: InstanceId,
    pub key: Option<&'a InstrumentKey>,
    pub shard_id: Option<&'a str>,
}

impl<'a> Site<'a> {
    pub(crate) fn instance(instance: InstanceId) -> Self {
        Site {
            instance,
            key: None,
            shard_id: None,
        }
    }

    pub(crate) fn with_key(mut self, key: &'a InstrumentKey) -> Self {
        self.key = Some(key);
        self
    }

    pub(crate) fn with_shard(mut self, shard_id: &'a str) -> Self {
        self.shard_id = Some(shard_id);
        self
    }
}

/// Records an absorbed anomaly with structured logging.
///
/// `#[cold]` keeps this off the optimized hot path: anomalies are rare, while
/// the hooks that may report them run on every message.
#[cold]
pub(crate) fn record(anomaly: Anomaly, site: Site<'_>, operation: &'static str) {
    #[cfg(any(test, feature = "test-utils"))]
    ANOMALY_COUNTS[anomaly.index()].fetch_add(1, Ordering::Relaxed);

    let key = site.key.map(ToString::to_string).unwrap_or_default();
    let shard_id = site.shard_id.unwrap_or_default();

    if anomaly.is_warning() {
        tracing::warn!(
            anomaly.kind = %anomaly,
            anomaly.operation = operation,
            instance.id = site.instance.as_u64(),
            instrument.key = %key,
            shard.id = shard_id,
            "Sharding metrics anomaly absorbed"
        );
    } else {
        tracing::debug!(
            anomaly.kind = %anomaly,
            anomaly.operation = operation,
            instance.id = site.instance.as_u64(),
            instrument.key = %key,
            shard.id = shard_id,
            "Sharding metrics anomaly absorbed"
        );
    }
}

/// Returns the number of anomalies of `kind` recorded so far.
///
/// This function is only available when the `test-utils` feature is enabled.
#[cfg(any(test, feature = "test-utils"))]
pub fn anomaly_count(kind: Anomaly) -> u64 {
    ANOMALY_COUNTS[kind.index()].load(Ordering::Relaxed)
}

/// Resets every anomaly counter.
///
/// This function is only available when the `test-utils` feature is enabled.
#[cfg(any(test, feature = "test-utils"))]
pub fn reset_anomaly_count() {
    for count in &ANOMALY_COUNTS {
        count.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Anomaly::OrphanEvent.to_string(), "orphan event");
        assert_eq!(Anomaly::CounterUnderflow.to_string(), "counter underflow");
        assert_eq!(
            Anomaly::DuplicateInitialization.to_string(),
            "duplicate initialization"
        );
        assert_eq!(
            Anomaly::MissingInstrumentSet.to_string(),
            "missing instrument set"
        );
    }

    #[test]
    fn test_warning_levels() {
        assert!(Anomaly::OrphanEvent.is_warning());
        assert!(Anomaly::CounterUnderflow.is_warning());
        assert!(!Anomaly::DuplicateInitialization.is_warning());
        assert!(!Anomaly::MissingInstrumentSet.is_warning());
    }

    #[test]
    fn test_record_increments_kind() {
        let key = InstrumentKey::new("sysA", "Order");
        let before = anomaly_count(Anomaly::MissingInstrumentSet);

        record(
            Anomaly::MissingInstrumentSet,
            Site::instance(InstanceId::next()).with_key(&key).with_shard("1"),
            "shard_constructed",
        );

        assert!(anomaly_count(Anomaly::MissingInstrumentSet) >= before + 1);
    }
}
