// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Clock
//!
//! Time source injected into every state mutator that stamps audit fields.
//! Nothing in the domain layer reads the wall clock directly.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Deterministic `UtcNow()` capability

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Provides the current UTC time.
pub trait Clock: Send + Sync {
    fn utc_now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by `chrono::Utc::now`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replay.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn set(&self, value: DateTime<Utc>) {
        *self.now.lock() = value;
    }

    /// Moves the clock forward and returns the new time.
    pub fn advance(&self, by: Duration) -> DateTime<Utc> {
        let mut now = self.now.lock();
        *now += by;
        *now
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn utc_now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
