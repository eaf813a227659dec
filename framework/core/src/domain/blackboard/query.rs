// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Deferred queries and signal subscriptions persisted with a board.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A query registered for later resolution. Survives board reactivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackboardDeferredQueryState {
    pub uid: Uuid,
    pub query: Value,
    pub created_at: DateTime<Utc>,
}

impl BlackboardDeferredQueryState {
    pub fn new(query: Value, created_at: DateTime<Utc>) -> Self {
        Self {
            uid: Uuid::new_v4(),
            query,
            created_at,
        }
    }
}

/// Link between a board and an external signal source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalSubscription {
    pub subscription_id: Uuid,
    pub signal_id: Uuid,
    #[serde(default)]
    pub from_door: bool,
}

impl SignalSubscription {
    pub fn new(signal_id: Uuid, from_door: bool) -> Self {
        Self {
            subscription_id: Uuid::new_v4(),
            signal_id,
            from_door,
        }
    }
}
