// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU8, Ordering};

/// A lifecycle state that fits in a byte.
pub(crate) trait LifecycleState: Copy {
    fn to_u8(self) -> u8;
    fn from_u8(value: u8) -> Self;
}

/// Lifecycle of a region instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionState {
    Uninitialized,
    Active,
    /// Terminal.
    Stopped,
}

impl LifecycleState for RegionState {
    fn to_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0u8 => RegionState::Uninitialized,
            1u8 => RegionState::Active,
            _ => RegionState::Stopped,
        }
    }
}

/// Lifecycle of a shard instance.
///
/// `Constructed` and `Initialized` differ because a shard may be built but
/// never acquire its lease; only initialized shards count as hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardState {
    Constructed,
    Initialized,
    /// Terminal.
    Stopped,
}

impl LifecycleState for ShardState {
    fn to_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0u8 => ShardState::Constructed,
            1u8 => ShardState::Initialized,
            _ => ShardState::Stopped,
        }
    }
}

/// Atomic cell holding a [`LifecycleState`].
#[derive(Debug)]
pub(crate) struct StateCell<S> {
    value: AtomicU8,
    _state: PhantomData<fn() -> S>,
}

impl<S: LifecycleState> StateCell<S> {
    pub(crate) fn new(initial: S) -> Self {
        Self {
            value: AtomicU8::new(initial.to_u8()),
            _state: PhantomData,
        }
    }

    pub(crate) fn get(&self) -> S {
        S::from_u8(self.value.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: S) {
        self.value.store(state.to_u8(), Ordering::Release);
    }

    /// Stores `state` and returns the previous one.
    pub(crate) fn replace(&self, state: S) -> S {
        S::from_u8(self.value.swap(state.to_u8(), Ordering::AcqRel))
    }
}
