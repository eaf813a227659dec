// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Blackboard Commands
//!
//! Closed set of mutations a board accepts. Clients send them to the board
//! actor; the storage controller returns them as issue resolutions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::blackboard::issues::ProcessingIssue;
use crate::domain::blackboard::record::{DataRecordContainer, RecordCustomMetadata, RecordStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum BlackboardCommand {
    AddRecord {
        record: DataRecordContainer,
        /// Replace a record already registered under the same uid
        #[serde(default)]
        override_existing: bool,
        /// Insert into storage when the uid is unknown there
        #[serde(default = "default_insert_if_new")]
        insert_if_new: bool,
    },
    PrepareSlot {
        uid: Uuid,
        logical_type: String,
        display_name: String,
    },
    RemoveRecord {
        uid: Uuid,
    },
    DecommissionRecord {
        uid: Uuid,
    },
    ChangeStatus {
        uid: Uuid,
        status: RecordStatus,
    },
    ChangeMetaData {
        uid: Uuid,
        #[serde(default)]
        metadata: Option<RecordCustomMetadata>,
    },
    Reject {
        issue: ProcessingIssue,
    },
    Seal,
}

fn default_insert_if_new() -> bool {
    true
}

impl BlackboardCommand {
    pub fn add(record: DataRecordContainer) -> Self {
        BlackboardCommand::AddRecord {
            record,
            override_existing: false,
            insert_if_new: true,
        }
    }

    pub fn add_or_replace(record: DataRecordContainer) -> Self {
        BlackboardCommand::AddRecord {
            record,
            override_existing: true,
            insert_if_new: true,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            BlackboardCommand::AddRecord { .. } => "add_record",
            BlackboardCommand::PrepareSlot { .. } => "prepare_slot",
            BlackboardCommand::RemoveRecord { .. } => "remove_record",
            BlackboardCommand::DecommissionRecord { .. } => "decommission_record",
            BlackboardCommand::ChangeStatus { .. } => "change_status",
            BlackboardCommand::ChangeMetaData { .. } => "change_metadata",
            BlackboardCommand::Reject { .. } => "reject",
            BlackboardCommand::Seal => "seal",
        }
    }

    /// Uid targeted by the command, if any.
    pub fn target_uid(&self) -> Option<Uuid> {
        match self {
            BlackboardCommand::AddRecord { record, .. } => Some(record.uid),
            BlackboardCommand::PrepareSlot { uid, .. }
            | BlackboardCommand::RemoveRecord { uid }
            | BlackboardCommand::DecommissionRecord { uid }
            | BlackboardCommand::ChangeStatus { uid, .. }
            | BlackboardCommand::ChangeMetaData { uid, .. } => Some(*uid),
            BlackboardCommand::Reject { .. } | BlackboardCommand::Seal => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_record_defaults_from_json() {
        let json = serde_json::json!({
            "command": "add_record",
            "record": {
                "logical_type": "item",
                "uid": "1f0e9a8e-1111-4a8e-9d43-3e0bde0e7f11",
                "display_name": "bolt",
                "data": 3,
                "status": "active",
                "creation_time_utc": "2026-01-01T00:00:00Z",
                "last_update_time_utc": "2026-01-01T00:00:00Z"
            }
        });

        let command: BlackboardCommand = serde_json::from_value(json).unwrap();
        match command {
            BlackboardCommand::AddRecord {
                override_existing,
                insert_if_new,
                ..
            } => {
                assert!(!override_existing);
                assert!(insert_if_new);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
