// SPDX-License-Identifier: MIT

//! SQLite checkpoint store
//!
//! One row per checkpoint:
//!
//! ```text
//! checkpoints(thread_id, checkpoint_id, parent_id, checkpoint BLOB, metadata BLOB)
//! PRIMARY KEY (thread_id, checkpoint_id)
//! ```
//!
//! Blobs are produced by [`codec`](super::codec). Each `put` is a single
//! upsert statement, so a row is either fully written or untouched.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use log::debug;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use super::{
    codec, Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple, Checkpointer,
    ListOptions,
};
use crate::adk::error::CheckpointError;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS checkpoints (
        thread_id TEXT NOT NULL,
        checkpoint_id TEXT NOT NULL,
        parent_id TEXT,
        checkpoint BLOB NOT NULL,
        metadata BLOB NOT NULL,
        PRIMARY KEY (thread_id, checkpoint_id)
    )
"#;

pub struct SqliteCheckpointer {
    pool: SqlitePool,
    is_setup: AtomicBool,
}

impl std::fmt::Debug for SqliteCheckpointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCheckpointer").finish()
    }
}

impl SqliteCheckpointer {
    /// Open (or create) the database at `database_url`,
    /// e.g. `sqlite://weft.db`
    pub async fn connect(database_url: &str) -> Result<Self, CheckpointError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Ok(Self::from_pool(pool))
    }

    /// Private database living as long as this store
    pub async fn in_memory() -> Result<Self, CheckpointError> {
        // every pooled connection would otherwise see its own empty database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            is_setup: AtomicBool::new(false),
        }
    }

    async fn ensure_setup(&self) -> Result<(), CheckpointError> {
        if self.is_setup.load(Ordering::Acquire) {
            return Ok(());
        }
        self.setup().await
    }

    fn tuple(thread_id: &str, row: &SqliteRow) -> Result<CheckpointTuple, CheckpointError> {
        let checkpoint_id: String = row.try_get("checkpoint_id")?;
        let parent_id: Option<String> = row.try_get("parent_id")?;
        let checkpoint: Vec<u8> = row.try_get("checkpoint")?;
        let metadata: Vec<u8> = row.try_get("metadata")?;
        CheckpointTuple::from_row(thread_id, &checkpoint_id, parent_id, &checkpoint, &metadata)
    }
}

#[async_trait]
impl Checkpointer for SqliteCheckpointer {
    async fn setup(&self) -> Result<(), CheckpointError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        self.is_setup.store(true, Ordering::Release);
        Ok(())
    }

    async fn get_tuple(
        &self,
        config: &CheckpointConfig,
    ) -> Result<Option<CheckpointTuple>, CheckpointError> {
        self.ensure_setup().await?;
        let row = match &config.checkpoint_id {
            Some(id) => {
                sqlx::query(
                    "SELECT checkpoint_id, parent_id, checkpoint, metadata FROM checkpoints \
                     WHERE thread_id = ?1 AND checkpoint_id = ?2",
                )
                .bind(&config.thread_id)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT checkpoint_id, parent_id, checkpoint, metadata FROM checkpoints \
                     WHERE thread_id = ?1 ORDER BY checkpoint_id DESC LIMIT 1",
                )
                .bind(&config.thread_id)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        row.map(|r| Self::tuple(&config.thread_id, &r)).transpose()
    }

    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointConfig, CheckpointError> {
        self.ensure_setup().await?;
        let checkpoint_blob = codec::encode(&checkpoint)?;
        let metadata_blob = codec::encode(&metadata)?;

        sqlx::query(
            r#"
            INSERT INTO checkpoints (thread_id, checkpoint_id, parent_id, checkpoint, metadata)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (thread_id, checkpoint_id) DO UPDATE SET
                parent_id = excluded.parent_id,
                checkpoint = excluded.checkpoint,
                metadata = excluded.metadata
            "#,
        )
        .bind(&config.thread_id)
        .bind(&checkpoint.id)
        .bind(&checkpoint.parent_id)
        .bind(checkpoint_blob)
        .bind(metadata_blob)
        .execute(&self.pool)
        .await?;

        debug!(
            "Stored checkpoint {} for thread {}",
            checkpoint.id, config.thread_id
        );
        Ok(CheckpointConfig::at(&config.thread_id, checkpoint.id))
    }

    async fn list(
        &self,
        thread_id: &str,
        options: ListOptions,
    ) -> Result<Vec<CheckpointTuple>, CheckpointError> {
        self.ensure_setup().await?;
        // LIMIT -1 means no limit in SQLite
        let limit = options
            .limit
            .and_then(|l| i64::try_from(l).ok())
            .unwrap_or(-1);
        let rows = sqlx::query(
            "SELECT checkpoint_id, parent_id, checkpoint, metadata FROM checkpoints \
             WHERE thread_id = ?1 AND (?2 IS NULL OR checkpoint_id < ?2) \
             ORDER BY checkpoint_id DESC LIMIT ?3",
        )
        .bind(thread_id)
        .bind(options.before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|r| Self::tuple(thread_id, r)).collect()
    }

    async fn reset_thread(&self, thread_id: &str) -> Result<u64, CheckpointError> {
        self.ensure_setup().await?;
        let result = sqlx::query("DELETE FROM checkpoints WHERE thread_id = ?1")
            .bind(thread_id)
            .execute(&self.pool)
            .await?;
        debug!(
            "Deleted {} checkpoints for thread {}",
            result.rows_affected(),
            thread_id
        );
        Ok(result.rows_affected())
    }

    async fn hard_reset(&self) -> Result<u64, CheckpointError> {
        self.ensure_setup().await?;
        let result = sqlx::query("DELETE FROM checkpoints")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
