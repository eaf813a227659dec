// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
use uuid::Uuid;

use crate::domain::repository::RepositoryError;
use crate::domain::sequence::thread_state::ThreadException;

/// Errors raised while defining or executing sequences.
#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    #[error("Sequence definition {0} not found")]
    DefinitionNotFound(Uuid),

    #[error("Invalid sequence definition: {0}")]
    InvalidDefinition(String),

    #[error("Stage {0} not found in sequence definition")]
    StageNotFound(Uuid),

    #[error("Stage handler '{0}' is not registered")]
    HandlerNotFound(String),

    #[error("Stage '{stage}' failed: {message}")]
    StageFailed { stage: String, message: String },

    #[error("Invalid input for stage '{stage}': {reason}")]
    InvalidStageInput { stage: String, reason: String },

    #[error("Foreach stage '{0}' requires an array input")]
    ForeachInputNotArray(String),

    #[error("Inner thread misuse: {0}")]
    NestedThread(String),

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Sequence execution cancelled")]
    Cancelled,

    #[error("Sequence execution failed [{error_code}]: {message}")]
    ExecutionFailed { error_code: String, message: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl SequenceError {
    /// Stable machine-readable code, persisted with thread exceptions.
    pub fn error_code(&self) -> &str {
        match self {
            SequenceError::DefinitionNotFound(_) => "definition_not_found",
            SequenceError::InvalidDefinition(_) => "invalid_definition",
            SequenceError::StageNotFound(_) => "stage_not_found",
            SequenceError::HandlerNotFound(_) => "handler_not_found",
            SequenceError::StageFailed { .. } => "stage_failed",
            SequenceError::InvalidStageInput { .. } => "invalid_stage_input",
            SequenceError::ForeachInputNotArray(_) => "foreach_input_not_array",
            SequenceError::NestedThread(_) => "nested_thread",
            SequenceError::Handler(_) => "handler_error",
            SequenceError::Cancelled => "cancelled",
            SequenceError::ExecutionFailed { error_code, .. } => error_code,
            SequenceError::Repository(_) => "repository_error",
        }
    }

    pub fn to_exception(&self) -> ThreadException {
        ThreadException {
            error_code: self.error_code().to_string(),
            message: self.to_string(),
        }
    }

    /// Rebuild an error from a persisted thread failure.
    pub fn from_failure(exception: Option<&ThreadException>, error_message: Option<&str>) -> Self {
        match exception {
            Some(exception) if exception.error_code == "cancelled" => SequenceError::Cancelled,
            Some(exception) => SequenceError::ExecutionFailed {
                error_code: exception.error_code.clone(),
                message: exception.message.clone(),
            },
            None => SequenceError::ExecutionFailed {
                error_code: "error".to_string(),
                message: error_message.unwrap_or("unknown failure").to_string(),
            },
        }
    }
}
