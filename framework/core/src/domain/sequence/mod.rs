// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Sequence Domain
//!
//! Definitions of multi-stage workflows and the resumable state of their
//! executions. Execution itself lives in `application::sequence_executor`.

pub mod definition;
pub mod error;
pub mod executor_state;
pub mod thread_state;

pub use definition::{SequenceDefinition, SequenceOptions, StageDefinition, StageKind};
pub use error::SequenceError;
pub use executor_state::{ExecutionResult, SequenceExecutorState, SequenceExecutorStateCustomization};
pub use thread_state::{SequenceExecutorThreadState, ThreadException};
