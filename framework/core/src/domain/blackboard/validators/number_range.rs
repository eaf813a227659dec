// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde_json::Value;

use crate::domain::blackboard::issues::ProcessingIssue;
use crate::domain::blackboard::record::{DataKind, DataRecordContainer};

/// Numeric payloads must fall in `[min, max)`. Either bound may be open.
#[derive(Debug, Clone)]
pub struct NumberRangeValidator {
    min: Option<f64>,
    max: Option<f64>,
}

impl NumberRangeValidator {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn validate(&self, record: &DataRecordContainer) -> Option<ProcessingIssue> {
        let value = match record.data.as_ref() {
            None | Some(Value::Null) => return None,
            Some(Value::Number(number)) => number.as_f64()?,
            Some(other) => {
                return Some(ProcessingIssue::DataType {
                    expected: DataKind::Number,
                    actual: DataKind::of(other),
                    new_record: record.clone(),
                })
            }
        };

        let below = self.min.is_some_and(|min| value < min);
        let above = self.max.is_some_and(|max| value >= max);

        if !below && !above {
            return None;
        }

        Some(ProcessingIssue::NumberRange {
            min: self.min,
            max: self.max,
            value,
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

    fn with(data: Value) -> DataRecordContainer {
        DataRecordContainer::new("level", Uuid::new_v4(), "level", Some(data), Utc::now())
    }

    #[test]
    fn test_max_is_exclusive() {
        let validator = NumberRangeValidator::new(Some(0.0), Some(10.0));
        assert!(validator.validate(&with(json!(10))).is_some());
        assert!(validator.validate(&with(json!(9.999))).is_none());
        assert!(validator.validate(&with(json!(-0.001))).is_some());
        assert!(validator.validate(&with(json!(0))).is_none());
    }

    #[test]
    fn test_open_bounds() {
        let only_min = NumberRangeValidator::new(Some(5.0), None);
        assert!(only_min.validate(&with(json!(1_000_000))).is_none());
        assert!(only_min.validate(&with(json!(4))).is_some());
    }

    #[test]
    fn test_non_numeric_is_type_issue() {
        let validator = NumberRangeValidator::new(Some(0.0), Some(1.0));
        assert!(matches!(
            validator.validate(&with(json!("0.5"))),
            Some(ProcessingIssue::DataType { expected: DataKind::Number, .. })
        ));
    }
}
