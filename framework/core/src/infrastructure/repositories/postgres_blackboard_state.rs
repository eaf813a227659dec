// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::blackboard::state::BlackboardGrainStateSurrogate;
use crate::domain::repository::{BlackboardStateRepository, RepositoryError};

/// Board surrogates stored as JSONB, one row per board uid.
pub struct PostgresBlackboardStateRepository {
    pool: PgPool,
}

impl PostgresBlackboardStateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlackboardStateRepository for PostgresBlackboardStateRepository {
    async fn save(&self, state: &BlackboardGrainStateSurrogate) -> Result<(), RepositoryError> {
        let board_uid = state
            .board_uid()
            .ok_or_else(|| RepositoryError::Unknown("board state has no identity".to_string()))?;
        let state_json = serde_json::to_value(state)?;

        sqlx::query(
            r#"
            INSERT INTO blackboard_states (board_uid, board_name, state_json, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (board_uid) DO UPDATE SET
                board_name = EXCLUDED.board_name,
                state_json = EXCLUDED.state_json,
                updated_at = NOW()
            "#,
        )
        .bind(board_uid)
        .bind(&state.name)
        .bind(&state_json)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save board state: {}", e)))?;

        Ok(())
    }

    async fn find_by_id(&self, board_uid: Uuid) -> Result<Option<BlackboardGrainStateSurrogate>, RepositoryError> {
        let row = sqlx::query("SELECT state_json FROM blackboard_states WHERE board_uid = $1")
            .bind(board_uid)
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

    async fn delete(&self, board_uid: Uuid) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM blackboard_states WHERE board_uid = $1")
            .bind(board_uid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
