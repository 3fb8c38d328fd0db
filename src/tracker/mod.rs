// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Region and shard lifecycle trackers.
//!
//! Trackers keep an explicit side table from [`InstanceId`](crate::InstanceId)
//! to the instruments attached to that instance, so the hosting runtime's own
//! region and shard objects carry no metric state. An instance enters the
//! table on construction and leaves it on stop; any later event for it is an
//! orphan and is ignored.

mod region;
mod shard;
mod state;

pub use region::RegionTracker;
pub use shard::ShardTracker;
pub use state::{RegionState, ShardState};
