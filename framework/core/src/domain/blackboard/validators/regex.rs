// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use regex::Regex;
use serde_json::Value;

use crate::domain::blackboard::issues::ProcessingIssue;
use crate::domain::blackboard::record::{DataKind, DataRecordContainer};

/// String payloads must match `match_regex`.
///
/// Null payloads are left to type-check rules; any other non-string payload
/// is a type mismatch.
#[derive(Debug, Clone)]
pub struct RegexValidator {
    match_regex: Regex,
}

impl RegexValidator {
    pub fn new(match_regex: Regex) -> Self {
        Self { match_regex }
    }

    pub fn validate(&self, record: &DataRecordContainer) -> Option<ProcessingIssue> {
        match record.data.as_ref() {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => {
                if self.match_regex.is_match(text) {
                    None
                } else {
                    Some(ProcessingIssue::Regex {
                        regex: self.match_regex.as_str().to_string(),
                        value: text.clone(),
                        new_record: record.clone(),
                    })
                }
            }
            Some(other) => Some(ProcessingIssue::DataType {
                expected: DataKind::String,
                actual: DataKind::of(other),
                new_record: record.clone(),
            }),
        }
    }
}
