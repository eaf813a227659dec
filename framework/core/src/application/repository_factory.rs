// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates concrete repository implementations from the configured storage
//! backend. Traits stay in the domain layer; implementations live in the
//! infrastructure layer.
//!
//! Templates, sequence definitions and the board registry are small and are
//! loaded from YAML at startup, so they are always kept in memory.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Backend selection for every repository the node uses

use std::sync::Arc;

use crate::domain::repository::{
    BlackboardStateRepository, BlackboardTemplateRepository, BoardRegistryRepository, RecordRepositoryFactory,
    RepositoryError, SequenceDefinitionRepository, SequenceStateRepository, StorageBackend,
};
use crate::infrastructure::db::Database;
use crate::infrastructure::repositories::{
    InMemoryBlackboardStateRepository, InMemoryBlackboardTemplateRepository, InMemoryBoardRegistryRepository,
    InMemorySequenceDefinitionRepository, InMemorySequenceStateRepository, PostgresBlackboardStateRepository,
    PostgresSequenceStateRepository,
};
use crate::infrastructure::repository_cache::RepositoryCache;

fn require_database(database: Option<&Database>) -> Result<&Database, RepositoryError> {
    database.ok_or_else(|| RepositoryError::Database("postgres backend selected without a database connection".to_string()))
}

/// Creates a BlackboardStateRepository implementation based on the configured backend
pub fn create_blackboard_state_repository(
    backend: &StorageBackend,
    database: Option<&Database>,
) -> Result<Arc<dyn BlackboardStateRepository>, RepositoryError> {
    match backend {
        StorageBackend::InMemory => Ok(Arc::new(InMemoryBlackboardStateRepository::new())),
        StorageBackend::PostgreSQL(_) => Ok(Arc::new(PostgresBlackboardStateRepository::new(
            require_database(database)?.get_pool().clone(),
        ))),
    }
}

/// Creates a SequenceStateRepository implementation based on the configured backend
pub fn create_sequence_state_repository(
    backend: &StorageBackend,
    database: Option<&Database>,
) -> Result<Arc<dyn SequenceStateRepository>, RepositoryError> {
    match backend {
        StorageBackend::InMemory => Ok(Arc::new(InMemorySequenceStateRepository::new())),
        StorageBackend::PostgreSQL(_) => Ok(Arc::new(PostgresSequenceStateRepository::new(
            require_database(database)?.get_pool().clone(),
        ))),
    }
}

/// Creates the record repository cache whose `default` configuration uses `backend`
pub fn create_record_repository_factory(backend: &StorageBackend) -> Arc<dyn RecordRepositoryFactory> {
    Arc::new(RepositoryCache::new(backend.clone()))
}

pub fn create_template_repository() -> Arc<dyn BlackboardTemplateRepository> {
    Arc::new(InMemoryBlackboardTemplateRepository::new())
}

pub fn create_board_registry_repository() -> Arc<dyn BoardRegistryRepository> {
    Arc::new(InMemoryBoardRegistryRepository::new())
}

pub fn create_sequence_definition_repository() -> Arc<dyn SequenceDefinitionRepository> {
    Arc::new(InMemorySequenceDefinitionRepository::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repository::PostgresConfig;

    #[test]
    fn test_postgres_backend_requires_database() {
        let backend = StorageBackend::PostgreSQL(PostgresConfig {
            connection_string: "postgres://localhost/democrite".to_string(),
        });
        assert!(create_blackboard_state_repository(&backend, None).is_err());
        assert!(create_sequence_state_repository(&backend, None).is_err());
    }

    #[test]
    fn test_in_memory_backend() {
        let states = create_sequence_state_repository(&StorageBackend::InMemory, None).unwrap();
        let found = tokio_test::block_on(states.find_by_instance(uuid::Uuid::new_v4())).unwrap();
        assert!(found.is_none());
    }
}
