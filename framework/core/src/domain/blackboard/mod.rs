// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Blackboard Domain
//!
//! A blackboard is a rule-governed collection of records shared by several
//! actors. Each board is bound to a [`template::BlackboardTemplate`] whose
//! rules are grouped by logical-type pattern into [`handler::LogicalTypeHandler`]s.
//!
//! | Module | Contents |
//! |--------|----------|
//! | `rules` | declarative rule model |
//! | `validators` | one validator per rule kind plus composites |
//! | `issues` | validation outcomes |
//! | `record` | record container and metadata |
//! | `registry` | uid → metadata ledger of one board |
//! | `handler` | pattern → storage + validator tree |
//! | `template` | board definition |
//! | `board` | board identity and top-level registry |
//! | `state` | per-board aggregate root |
//! | `query` | deferred queries and subscriptions |
//! | `command_context` | event batching unit of work |
//! | `commands`, `events`, `error` | command pipeline vocabulary |

pub mod board;
pub mod command_context;
pub mod commands;
pub mod error;
pub mod events;
pub mod handler;
pub mod issues;
pub mod query;
pub mod record;
pub mod registry;
pub mod rules;
pub mod state;
pub mod template;
pub mod validators;

pub use board::{BlackboardId, BlackboardRegistryState};
pub use command_context::CommandExecutionContext;
pub use commands::BlackboardCommand;
pub use error::BlackboardError;
pub use events::{BlackboardEvent, StorageAction};
pub use handler::{LogicalTypeHandler, LogicalTypeHandlers};
pub use issues::ProcessingIssue;
pub use record::{DataRecordContainer, RecordMetadata, RecordStatus};
pub use registry::BlackboardRecordRegistry;
pub use rules::{LimitType, LogicalTypeRule, RemoveType, StorageDefinition};
pub use state::{BlackboardGrainState, BlackboardLifeStatus};
pub use template::BlackboardTemplate;
