// SPDX-License-Identifier: MIT

//! Checkpoint persistence
//!
//! A checkpoint is a full snapshot of a thread's state plus the frontier of
//! nodes still to run. The executor writes one after the input is merged
//! and one after every superstep; the parent links form a singly linked
//! history per thread.
//!
//! - `codec` - binary-safe encode/decode (MessagePack)
//! - `memory` - process-local store
//! - `sqlite` - durable store on sqlx

pub mod codec;
mod memory;
mod sqlite;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adk::error::CheckpointError;
use crate::weft::state::{PartialState, StateValue, WorkflowState};

pub use memory::InMemoryCheckpointer;
pub use sqlite::SqliteCheckpointer;

/// A durable snapshot of one point in a thread's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub parent_id: Option<String>,
    pub ts: DateTime<Utc>,
    /// Superstep counter; -1 for the input checkpoint of a thread's first run
    pub step: i64,
    pub values: WorkflowState,
    /// Nodes that would run next; empty once the run reached END
    pub next: Vec<String>,
    /// Join targets mapped to the sources that have completed so far
    pub pending_joins: BTreeMap<String, BTreeSet<String>>,
}

impl Checkpoint {
    /// First checkpoint after `parent`, with a fresh id and timestamp
    pub fn child_of(parent: Option<&Checkpoint>, values: WorkflowState) -> Self {
        let parent_id = parent.map(|p| p.id.clone());
        Self {
            id: next_checkpoint_id(parent_id.as_deref()),
            parent_id,
            ts: Utc::now(),
            step: parent.map(|p| p.step + 1).unwrap_or(-1),
            values,
            next: Vec::new(),
            pending_joins: parent.map(|p| p.pending_joins.clone()).unwrap_or_default(),
        }
    }
}

/// What produced a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointSource {
    /// The caller's input was merged
    Input,
    /// A superstep finished
    Loop,
    /// `update_state` patched the thread from outside
    Update,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub source: CheckpointSource,
    pub step: i64,
    /// Partial updates merged into this checkpoint, keyed by writer
    pub writes: BTreeMap<String, PartialState>,
    /// Caller-supplied run metadata
    pub extra: BTreeMap<String, StateValue>,
}

/// Address of a thread, optionally pinned to one checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub thread_id: String,
    pub checkpoint_id: Option<String>,
}

impl CheckpointConfig {
    pub fn latest(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            checkpoint_id: None,
        }
    }

    pub fn at(thread_id: impl Into<String>, checkpoint_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            checkpoint_id: Some(checkpoint_id.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointTuple {
    pub config: CheckpointConfig,
    pub checkpoint: Checkpoint,
    pub metadata: CheckpointMetadata,
    pub parent_config: Option<CheckpointConfig>,
}

impl CheckpointTuple {
    /// Decode a stored row
    pub(crate) fn from_row(
        thread_id: &str,
        checkpoint_id: &str,
        parent_id: Option<String>,
        checkpoint: &[u8],
        metadata: &[u8],
    ) -> Result<Self, CheckpointError> {
        Ok(Self {
            config: CheckpointConfig::at(thread_id, checkpoint_id),
            checkpoint: codec::decode(checkpoint)?,
            metadata: codec::decode(metadata)?,
            parent_config: parent_id.map(|id| CheckpointConfig::at(thread_id, id)),
        })
    }
}

/// Filters for [`Checkpointer::list`]
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub limit: Option<usize>,
    /// Only checkpoints with an id strictly below this one
    pub before: Option<String>,
}

impl ListOptions {
    pub fn limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            before: None,
        }
    }
}

/// Generate a checkpoint id that sorts after `parent`.
///
/// Ids are zero-padded microsecond timestamps, so lexicographic order is
/// chronological. When the clock has not advanced past the parent the id is
/// bumped to parent + 1.
pub fn next_checkpoint_id(parent: Option<&str>) -> String {
    let candidate = format!("{:020}", Utc::now().timestamp_micros().max(0));
    match parent {
        Some(parent) if candidate.as_str() <= parent => match parent.parse::<i64>() {
            Ok(n) => format!("{:020}", n + 1),
            Err(_) => format!("{parent}.1"),
        },
        _ => candidate,
    }
}

/// Persistence backend for checkpoints.
///
/// Writes to different threads may run concurrently; writes to one thread
/// are serialized by the executor. Every failure is reported, never
/// swallowed.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Create backing storage. Safe to call repeatedly.
    async fn setup(&self) -> Result<(), CheckpointError>;

    /// The pinned checkpoint, or the newest one when no id is given
    async fn get_tuple(
        &self,
        config: &CheckpointConfig,
    ) -> Result<Option<CheckpointTuple>, CheckpointError>;

    /// Insert or replace the checkpoint keyed by (thread, checkpoint id)
    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointConfig, CheckpointError>;

    /// Checkpoints of a thread, newest first
    async fn list(
        &self,
        thread_id: &str,
        options: ListOptions,
    ) -> Result<Vec<CheckpointTuple>, CheckpointError>;

    /// Delete every checkpoint of one thread; returns the number removed
    async fn reset_thread(&self, thread_id: &str) -> Result<u64, CheckpointError>;

    /// Delete every checkpoint of every thread
    async fn hard_reset(&self) -> Result<u64, CheckpointError>;

    async fn get(&self, config: &CheckpointConfig) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self.get_tuple(config).await?.map(|t| t.checkpoint))
    }
}
