// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the repository traits declared in
//! `crate::domain::repository`.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve record payloads, board state and sequence checkpoints
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## PostgreSQL Repositories
//!
//! - **PostgresRecordRepository** - record payloads, one logical table partition per storage key
//! - **PostgresBlackboardStateRepository** - board surrogates as JSONB
//! - **PostgresSequenceStateRepository** - executor checkpoints as JSONB
//!
//! ## In-Memory Repositories
//!
//! HashMap-backed implementations for development and tests. Every trait has one.

pub mod postgres_blackboard_state;
pub mod postgres_records;
pub mod postgres_sequence_state;

pub use postgres_blackboard_state::PostgresBlackboardStateRepository;
pub use postgres_records::PostgresRecordRepository;
pub use postgres_sequence_state::PostgresSequenceStateRepository;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::blackboard::board::BlackboardRegistrySurrogate;
use crate::domain::blackboard::record::DataRecordContainer;
use crate::domain::blackboard::state::BlackboardGrainStateSurrogate;
use crate::domain::blackboard::template::BlackboardTemplate;
use crate::domain::repository::{
    BlackboardStateRepository, BlackboardTemplateRepository, BoardRegistryRepository, RecordRepository,
    RepositoryError, SequenceDefinitionRepository, SequenceStateRepository,
};
use crate::domain::sequence::definition::SequenceDefinition;
use crate::domain::sequence::executor_state::SequenceExecutorStateSurrogate;

#[derive(Clone, Default)]
pub struct InMemoryRecordRepository {
    records: Arc<RwLock<HashMap<Uuid, DataRecordContainer>>>,
}

impl InMemoryRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl RecordRepository for InMemoryRecordRepository {
    async fn push_record(&self, record: &DataRecordContainer, insert_if_new: bool) -> Result<bool, RepositoryError> {
        let mut records = self.records.write();
        if !insert_if_new && !records.contains_key(&record.uid) {
            return Ok(false);
        }
        records.insert(record.uid, record.clone());
        Ok(true)
    }

    async fn get_record(&self, uid: Uuid) -> Result<Option<DataRecordContainer>, RepositoryError> {
        Ok(self.records.read().get(&uid).cloned())
    }

    async fn get_records(&self, uids: &[Uuid]) -> Result<Vec<DataRecordContainer>, RepositoryError> {
        let records = self.records.read();
        Ok(uids.iter().filter_map(|uid| records.get(uid).cloned()).collect())
    }

    async fn delete_record(&self, uid: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.records.write().remove(&uid).is_some())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryBlackboardTemplateRepository {
    templates: Arc<RwLock<HashMap<Uuid, BlackboardTemplate>>>,
}

impl InMemoryBlackboardTemplateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlackboardTemplateRepository for InMemoryBlackboardTemplateRepository {
    async fn save(&self, template: &BlackboardTemplate) -> Result<(), RepositoryError> {
        let mut templates = self.templates.write();
        // Names are unique: a new uid under an existing name replaces it.
        templates.retain(|uid, t| *uid == template.uid || t.unique_template_name != template.unique_template_name);
        templates.insert(template.uid, template.clone());
        Ok(())
    }

    async fn find_by_id(&self, uid: Uuid) -> Result<Option<BlackboardTemplate>, RepositoryError> {
        Ok(self.templates.read().get(&uid).cloned())
    }

    async fn find_by_name(&self, unique_template_name: &str) -> Result<Option<BlackboardTemplate>, RepositoryError> {
        Ok(self
            .templates
            .read()
            .values()
            .find(|t| t.unique_template_name == unique_template_name)
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<BlackboardTemplate>, RepositoryError> {
        let mut templates: Vec<_> = self.templates.read().values().cloned().collect();
        templates.sort_by(|a, b| a.unique_template_name.cmp(&b.unique_template_name));
        Ok(templates)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryBlackboardStateRepository {
    states: Arc<RwLock<HashMap<Uuid, BlackboardGrainStateSurrogate>>>,
}

impl InMemoryBlackboardStateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlackboardStateRepository for InMemoryBlackboardStateRepository {
    async fn save(&self, state: &BlackboardGrainStateSurrogate) -> Result<(), RepositoryError> {
        let board_uid = state
            .board_uid()
            .ok_or_else(|| RepositoryError::Unknown("board state has no identity".to_string()))?;
        self.states.write().insert(board_uid, state.clone());
        Ok(())
    }

    async fn find_by_id(&self, board_uid: Uuid) -> Result<Option<BlackboardGrainStateSurrogate>, RepositoryError> {
        Ok(self.states.read().get(&board_uid).cloned())
    }

    async fn delete(&self, board_uid: Uuid) -> Result<(), RepositoryError> {
        self.states.write().remove(&board_uid);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryBoardRegistryRepository {
    registry: Arc<RwLock<Option<BlackboardRegistrySurrogate>>>,
}

impl InMemoryBoardRegistryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BoardRegistryRepository for InMemoryBoardRegistryRepository {
    async fn load(&self) -> Result<Option<BlackboardRegistrySurrogate>, RepositoryError> {
        Ok(self.registry.read().clone())
    }

    async fn save(&self, registry: &BlackboardRegistrySurrogate) -> Result<(), RepositoryError> {
        *self.registry.write() = Some(registry.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemorySequenceDefinitionRepository {
    definitions: Arc<RwLock<HashMap<Uuid, SequenceDefinition>>>,
}

impl InMemorySequenceDefinitionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SequenceDefinitionRepository for InMemorySequenceDefinitionRepository {
    async fn save(&self, definition: &SequenceDefinition) -> Result<(), RepositoryError> {
        self.definitions.write().insert(definition.uid, definition.clone());
        Ok(())
    }

    async fn find_by_id(&self, uid: Uuid) -> Result<Option<SequenceDefinition>, RepositoryError> {
        Ok(self.definitions.read().get(&uid).cloned())
    }

    async fn list_all(&self) -> Result<Vec<SequenceDefinition>, RepositoryError> {
        Ok(self.definitions.read().values().cloned().collect())
    }
}

#[derive(Clone, Default)]
pub struct InMemorySequenceStateRepository {
    states: Arc<RwLock<HashMap<Uuid, SequenceExecutorStateSurrogate>>>,
}

impl InMemorySequenceStateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}

#[async_trait]
impl SequenceStateRepository for InMemorySequenceStateRepository {
    async fn save(&self, state: &SequenceExecutorStateSurrogate) -> Result<(), RepositoryError> {
        self.states.write().insert(state.instance_id, state.clone());
        Ok(())
    }

    async fn find_by_instance(&self, instance_id: Uuid) -> Result<Option<SequenceExecutorStateSurrogate>, RepositoryError> {
        Ok(self.states.read().get(&instance_id).cloned())
    }

    async fn delete(&self, instance_id: Uuid) -> Result<(), RepositoryError> {
        self.states.write().remove(&instance_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[tokio::test]
    async fn test_record_push_respects_insert_if_new() {
        let repo = InMemoryRecordRepository::new();
        let record = DataRecordContainer::new("item", Uuid::new_v4(), "bolt", Some(json!(1)), Utc::now());

        assert!(!repo.push_record(&record, false).await.unwrap());
        assert!(repo.is_empty());

        assert!(repo.push_record(&record, true).await.unwrap());
        assert!(repo.push_record(&record, false).await.unwrap());
        assert_eq!(repo.len(), 1);

        assert_eq!(repo.get_records(&[record.uid, Uuid::new_v4()]).await.unwrap().len(), 1);
        assert!(repo.delete_record(record.uid).await.unwrap());
        assert!(!repo.delete_record(record.uid).await.unwrap());
    }

    #[tokio::test]
    async fn test_template_name_is_unique() {
        let repo = InMemoryBlackboardTemplateRepository::new();
        let first = BlackboardTemplate::new("inventory", vec![]).unwrap();
        let second = BlackboardTemplate::new("inventory", vec![]).unwrap();

        repo.save(&first).await.unwrap();
        repo.save(&second).await.unwrap();

        assert_eq!(repo.list_all().await.unwrap().len(), 1);
        assert_eq!(repo.find_by_name("inventory").await.unwrap().unwrap().uid, second.uid);
        assert!(repo.find_by_id(first.uid).await.unwrap().is_none());
    }
}
