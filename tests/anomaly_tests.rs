// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Tests for absorbed conditions: orphan events, duplicate initialization,
//! missing instrument sets and counter underflow.
//!
//! These tests use delta comparison pattern (comparing before/after counts) for parallel test safety.
//! Run with: `cargo test --features test-utils`
#![cfg(feature = "test-utils")]

use std::collections::HashSet;
use std::sync::Arc;

use shard_metrics::{
    anomaly_count, Anomaly, Config, Instance, NoopGroupRegistrar, RegionLifecycleListener,
    ShardLifecycleListener, ShardingMetrics,
};

fn metrics() -> ShardingMetrics {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
    ShardingMetrics::new(Config::default(), Arc::new(NoopGroupRegistrar))
        .expect("default config is valid")
}

#[test]
fn test_events_for_unknown_instances_are_orphans() {
    let metrics = metrics();
    let unknown = Instance::new("sysA");
    let before = anomaly_count(Anomaly::OrphanEvent);

    metrics.region_deliver_message(&unknown, "Ping");
    metrics.region_stopped(&unknown);
    metrics.shard_initialized(&unknown);
    metrics.shard_stopped(&unknown);
    metrics.shard_get_or_create_entity(&unknown, "a", &HashSet::<String>::new());
    metrics.shard_entity_terminated(&unknown);
    metrics.shard_deliver_message(&unknown);

    assert!(anomaly_count(Anomaly::OrphanEvent) >= before + 7);
    assert!(metrics.snapshot().is_empty());
}

#[test]
fn test_stopped_region_ignores_late_messages() {
    let metrics = metrics();
    let region = Instance::new("sysA");
    metrics.region_constructed(&region, "Late");
    let set = metrics.region().instrument_set(&region).unwrap();
    metrics.region_stopped(&region);
    let before = anomaly_count(Anomaly::OrphanEvent);

    metrics.region_deliver_message(&region, "ShardRestart");

    assert_eq!(set.processed_messages().get(), 0);
    assert!(anomaly_count(Anomaly::OrphanEvent) > before);
}

#[test]
fn test_shards_outliving_region_feed_detached_set() {
    let metrics = metrics();
    let region = Instance::new("sysA");
    let shard = Instance::new("sysA");
    metrics.region_constructed(&region, "Detached");
    metrics.shard_constructed(&shard, "Detached", "1");
    metrics.region_stopped(&region);

    metrics.shard_deliver_message(&shard);

    let binding = metrics.shard().binding(&shard).unwrap();
    assert!(binding.set().is_detached());
    assert_eq!(binding.set().processed_messages().get(), 1);
    assert!(metrics.registry().get("sysA", "Detached").is_none());
}

#[test]
fn test_duplicate_initialization_is_counted_and_recorded() {
    let metrics = metrics();
    let shard = Instance::new("sysA");
    metrics.shard_constructed(&shard, "Lease", "1");
    let before = anomaly_count(Anomaly::DuplicateInitialization);

    metrics.shard_initialized(&shard);
    metrics.shard_initialized(&shard);
    metrics.shard_initialized(&shard);

    let set = metrics.shard().binding(&shard).unwrap().set().clone();
    assert_eq!(set.hosted_shards().get(), 3);
    assert!(anomaly_count(Anomaly::DuplicateInitialization) >= before + 2);

    // A complete stop only reverses one of them.
    metrics.shard_stopped(&shard);
    assert_eq!(set.hosted_shards().get(), 2);
}

#[test]
fn test_shard_before_region_records_missing_set() {
    let metrics = metrics();
    let shard = Instance::new("sysA");
    let region = Instance::new("sysA");
    let before = anomaly_count(Anomaly::MissingInstrumentSet);

    metrics.shard_constructed(&shard, "Early", "1");
    metrics.region_constructed(&region, "Early");

    assert!(anomaly_count(Anomaly::MissingInstrumentSet) > before);
    let region_set = metrics.region().instrument_set(&region).unwrap();
    assert!(Arc::ptr_eq(
        &region_set,
        metrics.shard().binding(&shard).unwrap().set()
    ));
}

#[test]
fn test_underflow_is_not_clamped() {
    let metrics = metrics();
    let shard = Instance::new("sysA");
    metrics.shard_constructed(&shard, "Underflow", "1");
    let before = anomaly_count(Anomaly::CounterUnderflow);

    metrics.shard_entity_terminated(&shard);
    metrics.shard_stopped(&shard);

    let snapshot = &metrics.snapshot()[0];
    assert_eq!(snapshot.hosted_entities, -1);
    assert_eq!(snapshot.hosted_shards, -1);
    assert!(anomaly_count(Anomaly::CounterUnderflow) >= before + 2);
}
