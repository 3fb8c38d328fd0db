// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Instruments for sharded entity types
//!
//! This module holds the storage side of the crate: the lock-free gauges and
//! counters, the [`InstrumentSet`] that bundles them per (system, entity type),
//! and the snapshots an exporter reads.
//!
//! # Instruments
//!
//! - **Hosted shards**: gauge of initialized, not yet stopped shards
//! - **Hosted entities**: gauge of live entities, with a per-shard breakdown
//! - **Processed messages**: counter of deliveries, with a per-shard breakdown
//!
//! # Design Principles
//!
//! - **Lock-free**: every update is a single atomic fetch-and-add
//! - **Unclamped**: gauges are signed and may go negative on unmatched decrements
//! - **Scrape, don't push**: exporters call `snapshot()`; nothing is pushed
//!   from the message path

mod instrument;
mod instrument_set;
mod snapshot;

pub use instrument::{Counter, Gauge};
pub use instrument_set::{InstrumentSet, PerShardCounters, ShardBinding};
pub use snapshot::{InstrumentSnapshot, ShardSnapshot};
