// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Blackboard Provider - Application Layer
//!
//! Entry point for obtaining board handles. Boards are identified by the pair
//! (board name, template name); the provider keeps the top-level
//! [`BlackboardRegistryState`], spawns each board actor at most once, and
//! restores the persisted grain state of a board the first time it is touched
//! after a restart.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Collaborators:** `BlackboardTemplateRepository`, `BoardRegistryRepository`,
//!   `BlackboardStateRepository`, [`crate::application::blackboard_service`]

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::blackboard_service::{spawn_board, BlackboardHandle, BlackboardRuntime};
use crate::domain::blackboard::board::{BlackboardId, BlackboardRegistryState};
use crate::domain::blackboard::error::BlackboardError;
use crate::domain::blackboard::state::BlackboardGrainState;
use crate::domain::blackboard::template::BlackboardTemplate;
use crate::domain::repository::{BlackboardTemplateRepository, BoardRegistryRepository};

pub struct BlackboardProvider {
    registry: Mutex<BlackboardRegistryState>,
    registry_repository: Arc<dyn BoardRegistryRepository>,
    templates: Arc<dyn BlackboardTemplateRepository>,
    runtime: Arc<BlackboardRuntime>,
    boards: DashMap<Uuid, BlackboardHandle>,
    shutdown: CancellationToken,
}

impl BlackboardProvider {
    /// Load the board registry and prepare the provider. Board actors are
    /// started lazily.
    pub async fn new(
        registry_repository: Arc<dyn BoardRegistryRepository>,
        templates: Arc<dyn BlackboardTemplateRepository>,
        runtime: Arc<BlackboardRuntime>,
    ) -> Result<Self, BlackboardError> {
        let registry = match registry_repository.load().await? {
            Some(surrogate) => BlackboardRegistryState::from_surrogate(surrogate),
            None => BlackboardRegistryState::new(),
        };
        debug!(boards = registry.len(), "Board registry loaded");

        Ok(Self {
            registry: Mutex::new(registry),
            registry_repository,
            templates,
            runtime,
            boards: DashMap::new(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Store a template so boards can be created from it.
    pub async fn register_template(&self, template: BlackboardTemplate) -> Result<(), BlackboardError> {
        template.validate()?;
        info!(template = %template.unique_template_name, "Registering blackboard template");
        self.templates.save(&template).await?;
        Ok(())
    }

    pub async fn list_templates(&self) -> Result<Vec<BlackboardTemplate>, BlackboardError> {
        Ok(self.templates.list_all().await?)
    }

    /// Handle of board `board_name` built from `template_name`, creating and
    /// building the board on first use.
    pub async fn get_board(&self, board_name: &str, template_name: &str) -> Result<BlackboardHandle, BlackboardError> {
        let template = self
            .templates
            .find_by_name(template_name)
            .await?
            .ok_or_else(|| BlackboardError::TemplateNotFound(template_name.to_string()))?;

        // Held while spawning so one board never gets two actors.
        let mut registry = self.registry.lock().await;
        let (id, created) = registry.create_new_blackboard_id(board_name, template_name);
        if created {
            info!(board_id = %id, "Registered new board");
            self.registry_repository.save(&registry.to_surrogate()).await?;
        }

        if let Some(handle) = self.live_handle(&id.uid) {
            return Ok(handle);
        }

        let handle = self.activate(id).await?;
        if !handle.snapshot().await?.template.is_some_and(|t| t.uid == template.uid) {
            handle.build(template).await?;
        }
        drop(registry);

        Ok(handle)
    }

    /// Handle of an already registered board.
    pub async fn try_get(&self, uid: Uuid) -> Result<Option<BlackboardHandle>, BlackboardError> {
        let registry = self.registry.lock().await;
        let Some(id) = registry.try_get(&uid).cloned() else {
            return Ok(None);
        };

        if let Some(handle) = self.live_handle(&uid) {
            return Ok(Some(handle));
        }

        let handle = self.activate(id).await?;
        drop(registry);
        Ok(Some(handle))
    }

    pub async fn registered_boards(&self) -> Vec<BlackboardId> {
        self.registry.lock().await.to_surrogate().boards
    }

    /// Stop the board actor, forget its identity and delete its state.
    pub async fn unregister(&self, uid: Uuid) -> Result<Option<BlackboardId>, BlackboardError> {
        let mut registry = self.registry.lock().await;
        let Some(id) = registry.unregister(&uid) else {
            return Ok(None);
        };
        self.registry_repository.save(&registry.to_surrogate()).await?;

        if let Some((_, handle)) = self.boards.remove(&uid) {
            handle.shutdown();
        }
        self.runtime.state_repository.delete(uid).await?;

        info!(board_id = %id, "Board unregistered");
        Ok(Some(id))
    }

    /// Stop every running board actor.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.boards.clear();
    }

    fn live_handle(&self, uid: &Uuid) -> Option<BlackboardHandle> {
        self.boards
            .get(uid)
            .map(|entry| entry.value().clone())
            .filter(|handle| !handle.is_closed())
    }

    async fn activate(&self, id: BlackboardId) -> Result<BlackboardHandle, BlackboardError> {
        let state = match self.runtime.state_repository.find_by_id(id.uid).await? {
            Some(surrogate) => {
                debug!(board_id = %id, records = surrogate.registry.record_metadatas.len(), "Restoring board state");
                BlackboardGrainState::from_surrogate(surrogate)
            }
            None => BlackboardGrainState::new(),
        };

        let handle = spawn_board(id.clone(), state, self.runtime.clone(), self.shutdown.child_token())?;
        self.boards.insert(id.uid, handle.clone());
        Ok(handle)
    }
}
