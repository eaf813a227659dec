// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::domain::blackboard::record::DataRecordContainer;
use crate::domain::repository::{RecordRepository, RepositoryError};

/// Record payloads of one storage key, stored as JSONB rows.
pub struct PostgresRecordRepository {
    pool: PgPool,
    storage_key: String,
    initialized: AtomicBool,
}

impl PostgresRecordRepository {
    pub fn new(pool: PgPool, storage_key: impl Into<String>) -> Self {
        Self {
            pool,
            storage_key: storage_key.into(),
            initialized: AtomicBool::new(false),
        }
    }

    fn decode(row: &sqlx::postgres::PgRow) -> Result<DataRecordContainer, RepositoryError> {
        let record_json: serde_json::Value = row
            .try_get("record_json")
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        Ok(serde_json::from_value(record_json)?)
    }
}

#[async_trait]
impl RecordRepository for PostgresRecordRepository {
    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    async fn initialize(&self, storage_key: &str, cancel: &CancellationToken) -> Result<(), RepositoryError> {
        let create = sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blackboard_records (
                storage_key TEXT NOT NULL,
                uid UUID NOT NULL,
                logical_type TEXT NOT NULL,
                record_json JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (storage_key, uid)
            )
            "#,
        )
        .execute(&self.pool);

        tokio::select! {
            _ = cancel.cancelled() => return Err(RepositoryError::Cancelled),
            result = create => {
                result.map_err(|e| RepositoryError::Database(format!("Failed to prepare record storage: {}", e)))?;
            }
        }

        info!(storage_key, "Record storage ready");
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    async fn push_record(&self, record: &DataRecordContainer, insert_if_new: bool) -> Result<bool, RepositoryError> {
        let record_json = serde_json::to_value(record)?;

        let result = if insert_if_new {
            sqlx::query(
                r#"
                INSERT INTO blackboard_records (storage_key, uid, logical_type, record_json, updated_at)
                VALUES ($1, $2, $3, $4, NOW())
                ON CONFLICT (storage_key, uid) DO UPDATE SET
                    logical_type = EXCLUDED.logical_type,
                    record_json = EXCLUDED.record_json,
                    updated_at = NOW()
                "#,
            )
            .bind(&self.storage_key)
            .bind(record.uid)
            .bind(&record.logical_type)
            .bind(&record_json)
            .execute(&self.pool)
            .await
        } else {
            sqlx::query(
                r#"
                UPDATE blackboard_records
                SET logical_type = $3, record_json = $4, updated_at = NOW()
                WHERE storage_key = $1 AND uid = $2
                "#,
            )
            .bind(&self.storage_key)
            .bind(record.uid)
            .bind(&record.logical_type)
            .bind(&record_json)
            .execute(&self.pool)
            .await
        };

        let result = result.map_err(|e| RepositoryError::Database(format!("Failed to push record: {}", e)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_record(&self, uid: Uuid) -> Result<Option<DataRecordContainer>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT record_json
            FROM blackboard_records
            WHERE storage_key = $1 AND uid = $2
            "#,
        )
        .bind(&self.storage_key)
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::decode).transpose()
    }

    async fn get_records(&self, uids: &[Uuid]) -> Result<Vec<DataRecordContainer>, RepositoryError> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT record_json
            FROM blackboard_records
            WHERE storage_key = $1 AND uid = ANY($2)
            "#,
        )
        .bind(&self.storage_key)
        .bind(uids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::decode).collect()
    }

    async fn delete_record(&self, uid: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM blackboard_records WHERE storage_key = $1 AND uid = $2")
            .bind(&self.storage_key)
            .bind(uid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
