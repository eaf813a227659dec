// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::blackboard::issues::ProcessingIssue;
use crate::domain::blackboard::record::DataRecordContainer;
use crate::domain::blackboard::registry::RecordIndex;
use crate::domain::blackboard::rules::ValidationMode;

use super::RuleSolver;

const NONE_ONE_VIOLATION: &str = "No rule must be valid, but one was";

/// Sibling validators combined under a [`ValidationMode`], evaluated in declared order.
#[derive(Debug, Clone)]
pub struct GroupSolver {
    mode: ValidationMode,
    collection_group: String,
    children: Vec<RuleSolver>,
}

impl GroupSolver {
    pub fn new(mode: ValidationMode, collection_group: impl Into<String>, children: Vec<RuleSolver>) -> Self {
        Self {
            mode,
            collection_group: collection_group.into(),
            children,
        }
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    pub fn collection_group(&self) -> &str {
        &self.collection_group
    }

    pub fn children(&self) -> &[RuleSolver] {
        &self.children
    }

    pub fn validate(&self, record: &DataRecordContainer, existing: &RecordIndex) -> Option<ProcessingIssue> {
        match self.mode {
            // First issue wins
            ValidationMode::All => self.children.iter().find_map(|c| c.validate(record, existing)),

            // First success wins
            ValidationMode::AtLeastOne => {
                let mut issues = Vec::with_capacity(self.children.len());
                for child in &self.children {
                    match child.validate(record, existing) {
                        None => return None,
                        Some(issue) => issues.push(issue),
                    }
                }
                if issues.is_empty() {
                    None
                } else {
                    Some(ProcessingIssue::Aggregate { issues })
                }
            }

            ValidationMode::NoneOne => {
                for child in &self.children {
                    if child.validate(record, existing).is_none() {
                        return Some(ProcessingIssue::generic(NONE_ONE_VIOLATION));
                    }
                }
                None
            }
        }
    }
}
