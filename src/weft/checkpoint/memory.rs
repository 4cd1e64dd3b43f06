// SPDX-License-Identifier: MIT

//! In-memory checkpoint store
//!
//! Checkpoints are kept encoded, exactly as a database would hold them, so
//! the codec is exercised even in tests. Nothing survives the process.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use super::{
    codec, Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple, Checkpointer,
    ListOptions,
};
use crate::adk::error::CheckpointError;

struct StoredRow {
    parent_id: Option<String>,
    checkpoint: Vec<u8>,
    metadata: Vec<u8>,
}

/// Thread id -> checkpoint id -> encoded row
type Threads = HashMap<String, BTreeMap<String, StoredRow>>;

#[derive(Default)]
pub struct InMemoryCheckpointer {
    threads: RwLock<Threads>,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Threads>, CheckpointError> {
        self.threads
            .read()
            .map_err(|_| CheckpointError::Backend("checkpoint lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Threads>, CheckpointError> {
        self.threads
            .write()
            .map_err(|_| CheckpointError::Backend("checkpoint lock poisoned".to_string()))
    }
}

impl std::fmt::Debug for InMemoryCheckpointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let threads = self.threads.read().map(|t| t.len()).unwrap_or_default();
        f.debug_struct("InMemoryCheckpointer")
            .field("threads", &threads)
            .finish()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn setup(&self) -> Result<(), CheckpointError> {
        Ok(())
    }

    async fn get_tuple(
        &self,
        config: &CheckpointConfig,
    ) -> Result<Option<CheckpointTuple>, CheckpointError> {
        let threads = self.read()?;
        let Some(rows) = threads.get(&config.thread_id) else {
            return Ok(None);
        };
        let found = match &config.checkpoint_id {
            Some(id) => rows.get_key_value(id),
            None => rows.iter().next_back(),
        };
        found
            .map(|(id, row)| {
                CheckpointTuple::from_row(
                    &config.thread_id,
                    id,
                    row.parent_id.clone(),
                    &row.checkpoint,
                    &row.metadata,
                )
            })
            .transpose()
    }

    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointConfig, CheckpointError> {
        let row = StoredRow {
            parent_id: checkpoint.parent_id.clone(),
            checkpoint: codec::encode(&checkpoint)?,
            metadata: codec::encode(&metadata)?,
        };
        self.write()?
            .entry(config.thread_id.clone())
            .or_default()
            .insert(checkpoint.id.clone(), row);
        Ok(CheckpointConfig::at(&config.thread_id, checkpoint.id))
    }

    async fn list(
        &self,
        thread_id: &str,
        options: ListOptions,
    ) -> Result<Vec<CheckpointTuple>, CheckpointError> {
        let threads = self.read()?;
        let Some(rows) = threads.get(thread_id) else {
            return Ok(Vec::new());
        };
        rows.iter()
            .rev()
            .filter(|(id, _)| {
                options
                    .before
                    .as_ref()
                    .map_or(true, |before| id.as_str() < before.as_str())
            })
            .take(options.limit.unwrap_or(usize::MAX))
            .map(|(id, row)| {
                CheckpointTuple::from_row(
                    thread_id,
                    id,
                    row.parent_id.clone(),
                    &row.checkpoint,
                    &row.metadata,
                )
            })
            .collect()
    }

    async fn reset_thread(&self, thread_id: &str) -> Result<u64, CheckpointError> {
        let removed = self.write()?.remove(thread_id);
        Ok(removed.map(|rows| rows.len() as u64).unwrap_or(0))
    }

    async fn hard_reset(&self) -> Result<u64, CheckpointError> {
        let mut threads = self.write()?;
        let count = threads.values().map(|rows| rows.len() as u64).sum();
        threads.clear();
        Ok(count)
    }
}
