// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::repository::{RepositoryError, SequenceStateRepository};
use crate::domain::sequence::executor_state::SequenceExecutorStateSurrogate;

/// Executor checkpoints stored as JSONB, one row per instance id.
pub struct PostgresSequenceStateRepository {
    pool: PgPool,
}

impl PostgresSequenceStateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SequenceStateRepository for PostgresSequenceStateRepository {
    async fn save(&self, state: &SequenceExecutorStateSurrogate) -> Result<(), RepositoryError> {
        let state_json = serde_json::to_value(state)?;

        sqlx::query(
            r#"
            INSERT INTO sequence_executor_states (instance_id, flow_uid, sequence_definition_id, state_json, started_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (instance_id) DO UPDATE SET
                state_json = EXCLUDED.state_json,
                updated_at = NOW()
            "#,
        )
        .bind(state.instance_id)
        .bind(state.flow_uid)
        .bind(state.sequence_definition_id)
        .bind(&state_json)
        .bind(state.start_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save sequence state: {}", e)))?;

        Ok(())
    }

    async fn find_by_instance(&self, instance_id: Uuid) -> Result<Option<SequenceExecutorStateSurrogate>, RepositoryError> {
        let row = sqlx::query("SELECT state_json FROM sequence_executor_states WHERE instance_id = $1")
            .bind(instance_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let state_json: serde_json::Value = row
                    .try_get("state_json")
                    .map_err(|e| RepositoryError::Database(e.to_string()))?;
                Ok(Some(serde_json::from_value(state_json)?))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, instance_id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM sequence_executor_states WHERE instance_id = $1")
            .bind(instance_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
