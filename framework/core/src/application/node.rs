// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Node bootstrap
//!
//! Wires the repositories, event bus, board provider and sequence executor of
//! one node from a [`DemocriteConfig`].

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::application::blackboard_provider::BlackboardProvider;
use crate::application::blackboard_service::BlackboardRuntime;
use crate::application::repository_factory::{
    create_blackboard_state_repository, create_board_registry_repository, create_record_repository_factory,
    create_sequence_definition_repository, create_sequence_state_repository, create_template_repository,
};
use crate::application::sequence_executor::{SequenceExecutorService, StageHandlerRegistry};
use crate::application::storage_controller::DefaultStorageController;
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::config::DemocriteConfig;
use crate::domain::repository::StorageBackend;
use crate::infrastructure::db::Database;
use crate::infrastructure::event_bus::EventBus;

pub struct DemocriteNode {
    pub event_bus: EventBus,
    pub blackboards: Arc<BlackboardProvider>,
    pub sequences: Arc<SequenceExecutorService>,
}

impl DemocriteNode {
    /// Build a node on the system clock.
    pub async fn start(config: &DemocriteConfig, handlers: StageHandlerRegistry) -> Result<Self> {
        Self::start_with_clock(config, handlers, Arc::new(SystemClock)).await
    }

    pub async fn start_with_clock(
        config: &DemocriteConfig,
        handlers: StageHandlerRegistry,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let backend = config.spec.storage.to_backend()?;

        let database = match &backend {
            StorageBackend::InMemory => None,
            StorageBackend::PostgreSQL(pg) => {
                let db = Database::new(&pg.connection_string)
                    .await
                    .context("Failed to connect to PostgreSQL")?;
                db.ensure_schema().await?;
                Some(db)
            }
        };

        let event_bus = EventBus::new(config.spec.event_bus.capacity);

        let runtime = Arc::new(BlackboardRuntime {
            clock: clock.clone(),
            record_repositories: create_record_repository_factory(&backend),
            state_repository: create_blackboard_state_repository(&backend, database.as_ref())?,
            controller: Arc::new(DefaultStorageController::new(
                config.spec.blackboard.default_controller.clone(),
            )),
            event_bus: event_bus.clone(),
            max_command_depth: config.spec.runtime.max_command_depth,
        });

        let blackboards = BlackboardProvider::new(
            create_board_registry_repository(),
            create_template_repository(),
            runtime,
        )
        .await?;

        let sequences = SequenceExecutorService::new(
            create_sequence_definition_repository(),
            create_sequence_state_repository(&backend, database.as_ref())?,
            Arc::new(handlers),
            event_bus.clone(),
            clock,
        )
        .with_state_storage_blocked(config.spec.runtime.block_sequence_state_storage);

        info!(
            node = %config.metadata.name,
            backend = ?config.spec.storage.backend,
            "Democrite node started"
        );

        Ok(Self {
            event_bus,
            blackboards: Arc::new(blackboards),
            sequences: Arc::new(sequences),
        })
    }

    pub fn shutdown(&self) {
        self.blackboards.shutdown();
        info!("Democrite node stopped");
    }
}
