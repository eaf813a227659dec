// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts consumed by the blackboard and sequence subsystems.
//! Traits live in the domain layer; implementations live in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Stores | Implementations |
//! |-------|--------|----------------|
//! | `RecordRepository` | record payloads of one storage key | `InMemoryRecordRepository`, `PostgresRecordRepository` |
//! | `BlackboardTemplateRepository` | `BlackboardTemplate` | `InMemoryBlackboardTemplateRepository` |
//! | `BlackboardStateRepository` | `BlackboardGrainStateSurrogate` | `InMemoryBlackboardStateRepository`, `PostgresBlackboardStateRepository` |
//! | `BoardRegistryRepository` | `BlackboardRegistrySurrogate` | `InMemoryBoardRegistryRepository` |
//! | `SequenceDefinitionRepository` | `SequenceDefinition` | `InMemorySequenceDefinitionRepository` |
//! | `SequenceStateRepository` | `SequenceExecutorStateSurrogate` | `InMemorySequenceStateRepository`, `PostgresSequenceStateRepository` |
//!
//! ## Storage Backend Abstraction
//!
//! Concrete implementations are selected at startup from configuration
//! (`democrite-config.yaml`). In-memory implementations serve development and
//! tests; PostgreSQL implementations store surrogates as JSONB.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::blackboard::board::BlackboardRegistrySurrogate;
use crate::domain::blackboard::record::DataRecordContainer;
use crate::domain::blackboard::rules::StorageDefinition;
use crate::domain::blackboard::state::BlackboardGrainStateSurrogate;
use crate::domain::blackboard::template::BlackboardTemplate;
use crate::domain::sequence::definition::SequenceDefinition;
use crate::domain::sequence::executor_state::SequenceExecutorStateSurrogate;

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub connection_string: String,
}

/// Payload store for the records of one storage key.
///
/// Repositories that need setup report it through `is_initialized` and are
/// prepared once by the owning logical-type handler.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    fn is_initialized(&self) -> bool {
        true
    }

    async fn initialize(&self, _storage_key: &str, _cancel: &CancellationToken) -> Result<(), RepositoryError> {
        Ok(())
    }

    /// Store a record. With `insert_if_new` a missing uid is inserted,
    /// otherwise only existing records are replaced. Returns whether a row was written.
    async fn push_record(&self, record: &DataRecordContainer, insert_if_new: bool) -> Result<bool, RepositoryError>;

    async fn get_record(&self, uid: Uuid) -> Result<Option<DataRecordContainer>, RepositoryError>;

    async fn get_records(&self, uids: &[Uuid]) -> Result<Vec<DataRecordContainer>, RepositoryError>;

    /// Returns whether something was deleted.
    async fn delete_record(&self, uid: Uuid) -> Result<bool, RepositoryError>;
}

/// Resolves the record repository for a storage definition.
pub trait RecordRepositoryFactory: Send + Sync {
    fn get(&self, storage: &StorageDefinition) -> Result<Arc<dyn RecordRepository>, RepositoryError>;
}

/// Repository interface for blackboard templates
#[async_trait]
pub trait BlackboardTemplateRepository: Send + Sync {
    async fn save(&self, template: &BlackboardTemplate) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, uid: Uuid) -> Result<Option<BlackboardTemplate>, RepositoryError>;

    async fn find_by_name(&self, unique_template_name: &str) -> Result<Option<BlackboardTemplate>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<BlackboardTemplate>, RepositoryError>;
}

/// Repository interface for per-board durable state
#[async_trait]
pub trait BlackboardStateRepository: Send + Sync {
    async fn save(&self, state: &BlackboardGrainStateSurrogate) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, board_uid: Uuid) -> Result<Option<BlackboardGrainStateSurrogate>, RepositoryError>;

    async fn delete(&self, board_uid: Uuid) -> Result<(), RepositoryError>;
}

/// Repository interface for the top-level board identity registry
#[async_trait]
pub trait BoardRegistryRepository: Send + Sync {
    async fn load(&self) -> Result<Option<BlackboardRegistrySurrogate>, RepositoryError>;

    async fn save(&self, registry: &BlackboardRegistrySurrogate) -> Result<(), RepositoryError>;
}

/// Repository interface for sequence definitions
#[async_trait]
pub trait SequenceDefinitionRepository: Send + Sync {
    async fn save(&self, definition: &SequenceDefinition) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, uid: Uuid) -> Result<Option<SequenceDefinition>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<SequenceDefinition>, RepositoryError>;
}

/// Repository interface for sequence executor checkpoints
#[async_trait]
pub trait SequenceStateRepository: Send + Sync {
    async fn save(&self, state: &SequenceExecutorStateSurrogate) -> Result<(), RepositoryError>;

    async fn find_by_instance(&self, instance_id: Uuid) -> Result<Option<SequenceExecutorStateSurrogate>, RepositoryError>;

    async fn delete(&self, instance_id: Uuid) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Repository operation cancelled")]
    Cancelled,

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
