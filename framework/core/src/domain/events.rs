// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::sequence::executor_state::ExecutionResult;

/// Sequence execution lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SequenceEvent {
    SequenceStarted {
        flow_uid: Uuid,
        instance_id: Uuid,
        sequence_definition_id: Uuid,
        resumed: bool,
        started_at: DateTime<Utc>,
    },
    StageCompleted {
        flow_uid: Uuid,
        instance_id: Uuid,
        stage_uid: Uuid,
        stage_kind: String,
        completed_at: DateTime<Utc>,
    },
    SequenceCompleted {
        instance_id: Uuid,
        result: ExecutionResult,
        completed_at: DateTime<Utc>,
    },
    SequenceFailed {
        instance_id: Uuid,
        result: ExecutionResult,
        failed_at: DateTime<Utc>,
    },
}

impl SequenceEvent {
    pub fn instance_id(&self) -> Uuid {
        match self {
            SequenceEvent::SequenceStarted { instance_id, .. }
            | SequenceEvent::StageCompleted { instance_id, .. }
            | SequenceEvent::SequenceCompleted { instance_id, .. }
            | SequenceEvent::SequenceFailed { instance_id, .. } => *instance_id,
        }
    }
}
