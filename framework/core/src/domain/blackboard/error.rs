// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
use uuid::Uuid;

use crate::domain::blackboard::issues::ProcessingIssue;
use crate::domain::blackboard::rules::RuleError;
use crate::domain::repository::RepositoryError;

/// Errors returned by board commands and queries.
#[derive(Debug, thiserror::Error)]
pub enum BlackboardError {
    #[error("Board '{0}' has no template bound")]
    NotBuilt(String),

    #[error("Board '{0}' is waiting for initialization")]
    NotInitialized(String),

    #[error("Board '{0}' is sealed")]
    Sealed(String),

    #[error("Board '{0}' is already initialized")]
    AlreadyInitialized(String),

    #[error("Record {0} not found")]
    RecordNotFound(Uuid),

    #[error("Template '{0}' not found")]
    TemplateNotFound(String),

    #[error("Push rejected: {0}")]
    PushValidation(ProcessingIssue),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Board actor unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl BlackboardError {
    /// The rejected issue, for pushes refused by a rule.
    pub fn issue(&self) -> Option<&ProcessingIssue> {
        match self {
            BlackboardError::PushValidation(issue) => Some(issue),
            _ => None,
        }
    }
}
