// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::blackboard::issues::ProcessingIssue;
use crate::domain::blackboard::record::{DataRecordContainer, RecordMetadata};
use crate::domain::blackboard::registry::RecordIndex;
use crate::domain::blackboard::rules::{LimitType, RemoveType};

/// One record per logical type.
///
/// With `allow_replacement` the validator does not reject: it emits a
/// one-slot `MaxRecord` issue asking the controller to keep the newest record
/// and remove the older one.
#[derive(Debug, Clone)]
pub struct UniqueValidator {
    allow_replacement: bool,
}

impl UniqueValidator {
    pub fn new(allow_replacement: bool) -> Self {
        Self { allow_replacement }
    }

    pub fn validate(&self, record: &DataRecordContainer, existing: &RecordIndex) -> Option<ProcessingIssue> {
        let mut others: Vec<RecordMetadata> = existing
            .values()
            .filter(|m| m.uid != record.uid && m.logical_type == record.logical_type)
            .cloned()
            .collect();

        if others.is_empty() {
            return None;
        }

        if !self.allow_replacement {
            return Some(ProcessingIssue::Unique {
                new_record: record.clone(),
            });
        }

        others.sort_by_key(|m| (m.creation_time_utc, m.uid));

        Some(ProcessingIssue::MaxRecord {
            max_record_allow: 1,
            conflict_records: others,
            new_record: record.clone(),
            preference_resolution: Some(LimitType::KeepNewest),
            preference_remove_resolution: Some(RemoveType::Remove),
            counts_decommissioned: false,
        })
    }
}
