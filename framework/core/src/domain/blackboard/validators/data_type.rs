// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::blackboard::issues::ProcessingIssue;
use crate::domain::blackboard::record::{DataKind, DataRecordContainer};

/// Payload kind must be assignable to `filter_type`. Slots are not checked.
#[derive(Debug, Clone)]
pub struct DataTypeValidator {
    filter_type: DataKind,
}

impl DataTypeValidator {
    pub fn new(filter_type: DataKind) -> Self {
        Self { filter_type }
    }

    pub fn validate(&self, record: &DataRecordContainer) -> Option<ProcessingIssue> {
        let actual = record.data_kind()?;

        if self.filter_type.is_assignable_from(actual) {
            return None;
        }

        Some(ProcessingIssue::DataType {
            expected: self.filter_type,
            actual: Some(actual),
            new_record: record.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_type_check() {
        let validator = DataTypeValidator::new(DataKind::Number);
        let ok = DataRecordContainer::new("t", Uuid::new_v4(), "t", Some(json!(1.5)), Utc::now());
        let bad = DataRecordContainer::new("t", Uuid::new_v4(), "t", Some(json!("1.5")), Utc::now());
        let slot = DataRecordContainer::slot("t", Uuid::new_v4(), "t", Utc::now());

        assert!(validator.validate(&ok).is_none());
        assert!(matches!(validator.validate(&bad), Some(ProcessingIssue::DataType { .. })));
        assert!(validator.validate(&slot).is_none());
    }
}
