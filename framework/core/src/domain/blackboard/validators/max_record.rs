// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use regex::Regex;

use crate::domain::blackboard::issues::ProcessingIssue;
use crate::domain::blackboard::record::{DataRecordContainer, RecordMetadata, RecordStatus};
use crate::domain::blackboard::registry::RecordIndex;
use crate::domain::blackboard::rules::{LimitType, RemoveType};

/// Caps the number of records governed by a handler pattern.
#[derive(Debug, Clone)]
pub struct MaxRecordValidator {
    handler_pattern: Regex,
    max_record: usize,
    include_decommissioned: bool,
    limit_policy: Option<LimitType>,
    remove_policy: Option<RemoveType>,
}

impl MaxRecordValidator {
    pub fn new(
        handler_pattern: Regex,
        max_record: usize,
        include_decommissioned: bool,
        limit_policy: Option<LimitType>,
        remove_policy: Option<RemoveType>,
    ) -> Self {
        Self {
            handler_pattern,
            max_record,
            include_decommissioned,
            limit_policy,
            remove_policy,
        }
    }

    /// A record whose uid is already registered is never counted against the limit.
    /// Otherwise the issue fires once the matching records reach `max_record`.
    pub fn validate(&self, record: &DataRecordContainer, existing: &RecordIndex) -> Option<ProcessingIssue> {
        if existing.contains_key(&record.uid) {
            return None;
        }

        let mut conflict_records: Vec<RecordMetadata> = existing
            .values()
            .filter(|m| self.include_decommissioned || m.status != RecordStatus::Decommissioned)
            .filter(|m| self.handler_pattern.is_match(&m.logical_type))
            .cloned()
            .collect();

        if conflict_records.len() < self.max_record {
            return None;
        }

        conflict_records.sort_by(|a, b| {
            a.creation_time_utc
                .cmp(&b.creation_time_utc)
                .then_with(|| a.uid.cmp(&b.uid))
        });

        Some(ProcessingIssue::MaxRecord {
            max_record_allow: self.max_record,
            conflict_records,
            new_record: record.clone(),
            preference_resolution: self.limit_policy,
            preference_remove_resolution: self.remove_policy,
            counts_decommissioned: self.include_decommissioned,
        })
    }
}
