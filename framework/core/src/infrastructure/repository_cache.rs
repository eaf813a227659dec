// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Cache
//!
//! Shared by every board: resolves the record repository of a
//! [`StorageDefinition`], creating at most one repository per
//! `(configuration_name, storage_key, entity_type)` and at most one
//! connection pool per connection string.
//!
//! Read-mostly: lookups take the read lock; a miss takes the write lock and
//! checks again before creating.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::domain::blackboard::rules::StorageDefinition;
use crate::domain::repository::{RecordRepository, RecordRepositoryFactory, RepositoryError, StorageBackend};
use crate::infrastructure::db::Database;
use crate::infrastructure::repositories::{InMemoryRecordRepository, PostgresRecordRepository};

pub const DEFAULT_CONFIGURATION: &str = "default";
const RECORD_ENTITY: &str = "record";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryCacheKey {
    pub configuration_name: String,
    pub storage_key: String,
    pub entity_type: &'static str,
}

pub struct RepositoryCache {
    configurations: HashMap<String, StorageBackend>,
    repositories: RwLock<HashMap<RepositoryCacheKey, Arc<dyn RecordRepository>>>,
    pools: RwLock<HashMap<String, Database>>,
}

impl RepositoryCache {
    /// Cache whose `default` configuration uses `backend`.
    pub fn new(backend: StorageBackend) -> Self {
        Self {
            configurations: HashMap::from([(DEFAULT_CONFIGURATION.to_string(), backend)]),
            repositories: RwLock::new(HashMap::new()),
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// Register an additional named configuration.
    pub fn with_configuration(mut self, name: impl Into<String>, backend: StorageBackend) -> Self {
        self.configurations.insert(name.into(), backend);
        self
    }

    pub fn len(&self) -> usize {
        self.repositories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.read().is_empty()
    }

    fn pool_for(&self, connection_string: &str) -> Result<Database, RepositoryError> {
        if let Some(db) = self.pools.read().get(connection_string) {
            return Ok(db.clone());
        }

        let mut pools = self.pools.write();
        if let Some(db) = pools.get(connection_string) {
            return Ok(db.clone());
        }

        let db = Database::connect_lazy(connection_string)?;
        pools.insert(connection_string.to_string(), db.clone());
        Ok(db)
    }

    fn create(&self, backend: &StorageBackend, storage_key: &str) -> Result<Arc<dyn RecordRepository>, RepositoryError> {
        match backend {
            StorageBackend::InMemory => Ok(Arc::new(InMemoryRecordRepository::new())),
            StorageBackend::PostgreSQL(config) => {
                let db = self.pool_for(&config.connection_string)?;
                Ok(Arc::new(PostgresRecordRepository::new(db.get_pool().clone(), storage_key)))
            }
        }
    }
}

impl RecordRepositoryFactory for RepositoryCache {
    fn get(&self, storage: &StorageDefinition) -> Result<Arc<dyn RecordRepository>, RepositoryError> {
        let key = RepositoryCacheKey {
            configuration_name: storage.configuration_name.clone(),
            storage_key: storage.storage_key.clone(),
            entity_type: RECORD_ENTITY,
        };

        if let Some(repository) = self.repositories.read().get(&key) {
            return Ok(repository.clone());
        }

        let backend = self.configurations.get(&key.configuration_name).ok_or_else(|| {
            RepositoryError::NotFound(format!("storage configuration '{}'", key.configuration_name))
        })?;

        let mut repositories = self.repositories.write();
        if let Some(repository) = repositories.get(&key) {
            return Ok(repository.clone());
        }

        debug!(
            configuration = %key.configuration_name,
            storage_key = %key.storage_key,
            "Creating record repository"
        );
        let repository = self.create(backend, &key.storage_key)?;
        repositories.insert(key, repository.clone());
        Ok(repository)
    }
}
