// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Processing Issues
//!
//! Validation outcomes produced by rule solvers. Issues are values, not
//! errors: they describe which rule a record violates and carry enough data
//! (conflicting records, resolution preferences) for a storage controller to
//! resolve them without re-reading the registry.

use serde::{Deserialize, Serialize};

use crate::domain::blackboard::record::{DataKind, DataRecordContainer, RecordMetadata};
use crate::domain::blackboard::rules::{LimitType, RemoveType};

/// Storage classification of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageIssueType {
    Conflict,
    Limits,
    Format,
}

/// A rule violation detected while processing a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessingIssue {
    /// Several issues collected by a group solver
    Aggregate { issues: Vec<ProcessingIssue> },
    NotSupported,
    Generic { message: String },
    /// The pushed uid already exists and override was not requested
    Conflict {
        conflict_records: Vec<RecordMetadata>,
        new_record: DataRecordContainer,
    },
    MaxRecord {
        max_record_allow: usize,
        conflict_records: Vec<RecordMetadata>,
        new_record: DataRecordContainer,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        preference_resolution: Option<LimitType>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        preference_remove_resolution: Option<RemoveType>,
        /// Decommissioned records count against the limit.
        #[serde(default)]
        counts_decommissioned: bool,
    },
    Unique { new_record: DataRecordContainer },
    Regex {
        regex: String,
        value: String,
        new_record: DataRecordContainer,
    },
    NumberRange {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        value: f64,
        new_record: DataRecordContainer,
    },
    DataType {
        expected: DataKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        actual: Option<DataKind>,
        new_record: DataRecordContainer,
    },
}

impl ProcessingIssue {
    pub fn generic(message: impl Into<String>) -> Self {
        ProcessingIssue::Generic { message: message.into() }
    }

    /// Storage classification, `None` for issues that are not tied to storage.
    pub fn storage_type(&self) -> Option<StorageIssueType> {
        match self {
            ProcessingIssue::Conflict { .. } | ProcessingIssue::Unique { .. } => Some(StorageIssueType::Conflict),
            ProcessingIssue::MaxRecord { .. } | ProcessingIssue::NumberRange { .. } => Some(StorageIssueType::Limits),
            ProcessingIssue::Regex { .. } | ProcessingIssue::DataType { .. } => Some(StorageIssueType::Format),
            ProcessingIssue::Aggregate { .. } | ProcessingIssue::NotSupported | ProcessingIssue::Generic { .. } => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ProcessingIssue::Aggregate { .. } => "aggregate",
            ProcessingIssue::NotSupported => "not_supported",
            ProcessingIssue::Generic { .. } => "generic",
            ProcessingIssue::Conflict { .. } => "conflict",
            ProcessingIssue::MaxRecord { .. } => "max_record",
            ProcessingIssue::Unique { .. } => "unique",
            ProcessingIssue::Regex { .. } => "regex",
            ProcessingIssue::NumberRange { .. } => "number_range",
            ProcessingIssue::DataType { .. } => "data_type",
        }
    }
}

impl std::fmt::Display for ProcessingIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingIssue::Aggregate { issues } => {
                write!(f, "[aggregate] {} issue(s)", issues.len())?;
                for issue in issues {
                    write!(f, "; {}", issue)?;
                }
                Ok(())
            }
            ProcessingIssue::NotSupported => write!(f, "[not_supported]"),
            ProcessingIssue::Generic { message } => write!(f, "[generic] {}", message),
            ProcessingIssue::Conflict { conflict_records, .. } => {
                write!(f, "[storage] [conflict] - ({})", conflict_records.len())
            }
            ProcessingIssue::MaxRecord {
                max_record_allow,
                preference_resolution,
                ..
            } => write!(
                f,
                "[rule] [limits] - max record - limit {} - preference {:?}",
                max_record_allow, preference_resolution
            ),
            ProcessingIssue::Unique { new_record } => {
                write!(f, "[rule] [conflict] - unique '{}'", new_record.logical_type)
            }
            ProcessingIssue::Regex { regex, value, .. } => {
                write!(f, "[rule] [format] - string regex '{}' rejected '{}'", regex, value)
            }
            ProcessingIssue::NumberRange { min, max, value, .. } => {
                write!(f, "[rule] [limits] - number range [{:?} -> {:?}[ rejected {}", min, max, value)
            }
            ProcessingIssue::DataType { expected, actual, .. } => {
                write!(f, "[rule] [format] - data type expected '{}' got {:?}", expected, actual)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_storage_classification() {
        let record = DataRecordContainer::new("x", Uuid::new_v4(), "x", None, Utc::now());
        let unique = ProcessingIssue::Unique { new_record: record.clone() };
        assert_eq!(unique.storage_type(), Some(StorageIssueType::Conflict));

        let max = ProcessingIssue::MaxRecord {
            max_record_allow: 1,
            conflict_records: vec![],
            new_record: record,
            preference_resolution: Some(LimitType::KeepNewest),
            preference_remove_resolution: Some(RemoveType::Remove),
            counts_decommissioned: false,
        };
        assert_eq!(max.storage_type(), Some(StorageIssueType::Limits));
        assert!(max.to_string().contains("limit 1"));

        assert_eq!(ProcessingIssue::generic("boom").storage_type(), None);
    }
}
