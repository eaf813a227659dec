// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Blackboard domain events, queued in the command context and flushed to the
//! event bus once a top-level command succeeds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::blackboard::record::RecordMetadata;
use crate::domain::blackboard::state::BlackboardLifeStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageAction {
    Add,
    Remove,
    ChangeStatus,
    MetaDataChanged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BlackboardEvent {
    Storage {
        board_uid: Uuid,
        action: StorageAction,
        record: RecordMetadata,
        at: DateTime<Utc>,
    },
    LifeStatusChanged {
        board_uid: Uuid,
        status: BlackboardLifeStatus,
        at: DateTime<Utc>,
    },
}

impl BlackboardEvent {
    pub fn board_uid(&self) -> Uuid {
        match self {
            BlackboardEvent::Storage { board_uid, .. } | BlackboardEvent::LifeStatusChanged { board_uid, .. } => {
                *board_uid
            }
        }
    }
}
