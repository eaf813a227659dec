// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Rule Validators
//!
//! One validator per rule kind plus two composites. Every validator honours
//! the same contract: inspect a candidate record against a read-only snapshot
//! of the registry and return the first violation found, or `None`.
//!
//! | Validator | Rule | Issue |
//! |-----------|------|-------|
//! | `MaxRecordValidator` | `MaxRecord` | `MaxRecord` |
//! | `UniqueValidator` | `Unique` | `Unique` or synthetic `MaxRecord` |
//! | `RegexValidator` | `Regex` | `Regex`, `DataType` |
//! | `DataTypeValidator` | `TypeCheck` | `DataType` |
//! | `NumberRangeValidator` | `NumberRange` | `NumberRange`, `DataType` |
//! | `GroupSolver` | sibling rules | first child issue, `Aggregate`, `Generic` |
//! | `ChildrenSolver` | hierarchy rule with children | root or child issue |
//!
//! Dispatch is a closed sum type (`RuleSolver`) built by
//! [`provider::ValidatorProvider`].

pub mod children;
pub mod data_type;
pub mod group;
pub mod max_record;
pub mod number_range;
pub mod provider;
pub mod regex;
pub mod unique;

pub use children::ChildrenSolver;
pub use data_type::DataTypeValidator;
pub use group::GroupSolver;
pub use max_record::MaxRecordValidator;
pub use number_range::NumberRangeValidator;
pub use provider::ValidatorProvider;
pub use regex::RegexValidator;
pub use unique::UniqueValidator;

use crate::domain::blackboard::issues::ProcessingIssue;
use crate::domain::blackboard::record::DataRecordContainer;
use crate::domain::blackboard::registry::RecordIndex;

/// Assembled validator tree for one logical-type handler.
#[derive(Debug, Clone)]
pub enum RuleSolver {
    /// No rules declared
    Null,
    MaxRecord(MaxRecordValidator),
    Unique(UniqueValidator),
    Regex(RegexValidator),
    DataType(DataTypeValidator),
    NumberRange(NumberRangeValidator),
    Group(GroupSolver),
    Children(ChildrenSolver),
}

impl RuleSolver {
    /// Validate `record` against the current registry snapshot.
    ///
    /// Pure: neither the record nor the index is modified.
    pub fn validate(&self, record: &DataRecordContainer, existing: &RecordIndex) -> Option<ProcessingIssue> {
        match self {
            RuleSolver::Null => None,
            RuleSolver::MaxRecord(v) => v.validate(record, existing),
            RuleSolver::Unique(v) => v.validate(record, existing),
            RuleSolver::Regex(v) => v.validate(record),
            RuleSolver::DataType(v) => v.validate(record),
            RuleSolver::NumberRange(v) => v.validate(record),
            RuleSolver::Group(g) => g.validate(record, existing),
            RuleSolver::Children(c) => c.validate(record, existing),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RuleSolver::Null)
    }
}
