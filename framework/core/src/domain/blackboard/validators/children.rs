// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::blackboard::issues::ProcessingIssue;
use crate::domain::blackboard::record::DataRecordContainer;
use crate::domain::blackboard::registry::RecordIndex;

use super::RuleSolver;

/// Parent-gated validation: children only run once the root passes.
#[derive(Debug, Clone)]
pub struct ChildrenSolver {
    root: Box<RuleSolver>,
    children: Vec<RuleSolver>,
}

impl ChildrenSolver {
    pub fn new(root: RuleSolver, children: Vec<RuleSolver>) -> Self {
        Self {
            root: Box::new(root),
            children,
        }
    }

    pub fn root(&self) -> &RuleSolver {
        &self.root
    }

    pub fn children(&self) -> &[RuleSolver] {
        &self.children
    }

    pub fn validate(&self, record: &DataRecordContainer, existing: &RecordIndex) -> Option<ProcessingIssue> {
        if let Some(issue) = self.root.validate(record, existing) {
            return Some(issue);
        }

        self.children.iter().find_map(|child| child.validate(record, existing))
    }
}
