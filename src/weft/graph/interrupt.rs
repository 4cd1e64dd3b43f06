// SPDX-License-Identifier: MIT

//! Interrupts and thread state inspection
//!
//! A graph compiled with `interrupt_before` stops before any listed node
//! and returns [`RunOutcome::Paused`]. The caller may patch the paused
//! state with [`CompiledGraph::update_state`] and continue with
//! [`CompiledGraph::resume`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::info;

use crate::adk::error::GraphError;
use crate::weft::checkpoint::{
    Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointSource, CheckpointTuple,
    Checkpointer, ListOptions,
};
use crate::weft::state::{PartialState, WorkflowState};

use super::compiled::CompiledGraph;
use super::types::RunConfig;

/// Writer key recorded for patches applied through `update_state`
const EXTERNAL_WRITER: &str = "__update__";

/// How an invocation ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// No nodes left to run
    Completed(WorkflowState),
    /// Stopped before an interrupt node
    Paused(Interrupted),
}

impl RunOutcome {
    pub fn state(&self) -> &WorkflowState {
        match self {
            Self::Completed(state) => state,
            Self::Paused(interrupted) => &interrupted.state,
        }
    }

    pub fn into_state(self) -> WorkflowState {
        match self {
            Self::Completed(state) => state,
            Self::Paused(interrupted) => interrupted.state,
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused(_))
    }

    pub fn interrupted(&self) -> Option<&Interrupted> {
        match self {
            Self::Paused(interrupted) => Some(interrupted),
            Self::Completed(_) => None,
        }
    }
}

/// A paused run
#[derive(Debug, Clone, PartialEq)]
pub struct Interrupted {
    /// Nodes that will run on resume
    pub next: Vec<String>,
    pub state: WorkflowState,
    /// Checkpoint holding the paused state
    pub config: CheckpointConfig,
}

/// A checkpoint as seen by callers
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub values: WorkflowState,
    pub next: Vec<String>,
    pub config: CheckpointConfig,
    pub parent_config: Option<CheckpointConfig>,
    pub metadata: CheckpointMetadata,
    pub created_at: DateTime<Utc>,
}

impl From<CheckpointTuple> for StateSnapshot {
    fn from(tuple: CheckpointTuple) -> Self {
        Self {
            values: tuple.checkpoint.values,
            next: tuple.checkpoint.next,
            config: tuple.config,
            parent_config: tuple.parent_config,
            metadata: tuple.metadata,
            created_at: tuple.checkpoint.ts,
        }
    }
}

impl CompiledGraph {
    fn persistence(
        &self,
        config: &RunConfig,
    ) -> Result<(&dyn Checkpointer, CheckpointConfig), GraphError> {
        match (&self.inner.checkpointer, config.checkpoint_config()) {
            (Some(saver), Some(address)) => Ok((saver.as_ref(), address)),
            _ => Err(GraphError::MissingThread),
        }
    }

    /// Merge `patch` into the thread's latest (or selected) checkpoint
    /// through the schema reducers, keeping whatever was pending.
    pub async fn update_state(
        &self,
        config: &RunConfig,
        patch: PartialState,
    ) -> Result<CheckpointConfig, GraphError> {
        let (saver, address) = self.persistence(config)?;
        let parent = saver.get(&address).await?;

        let base = parent
            .as_ref()
            .map(|cp| cp.values.clone())
            .unwrap_or_else(|| self.schema().defaults());
        let values = base
            .merge(self.schema(), &patch)
            .map_err(GraphError::InvalidInput)?;

        let mut checkpoint = Checkpoint::child_of(parent.as_ref(), values);
        checkpoint.next = parent.map(|cp| cp.next).unwrap_or_default();
        let metadata = CheckpointMetadata {
            source: CheckpointSource::Update,
            step: checkpoint.step,
            writes: BTreeMap::from([(EXTERNAL_WRITER.to_string(), patch)]),
            extra: config.metadata.clone(),
        };

        info!(
            "Updating state of thread {} (pending {:?})",
            address.thread_id, checkpoint.next
        );
        let stored = saver
            .put(&CheckpointConfig::latest(address.thread_id), checkpoint, metadata)
            .await?;
        Ok(stored)
    }

    /// Continue a paused thread, optionally patching its state first
    pub async fn resume(
        &self,
        patch: Option<PartialState>,
        config: &RunConfig,
    ) -> Result<RunOutcome, GraphError> {
        let mut config = config.clone();
        if let Some(patch) = patch {
            let stored = self.update_state(&config, patch).await?;
            config.checkpoint_id = stored.checkpoint_id;
        }
        self.invoke(None, &config).await
    }

    /// Latest (or selected) checkpoint of a thread
    pub async fn get_state(&self, config: &RunConfig) -> Result<Option<StateSnapshot>, GraphError> {
        let (saver, address) = self.persistence(config)?;
        Ok(saver.get_tuple(&address).await?.map(StateSnapshot::from))
    }

    /// Checkpoints of a thread, newest first
    pub async fn get_state_history(
        &self,
        config: &RunConfig,
        options: ListOptions,
    ) -> Result<Vec<StateSnapshot>, GraphError> {
        let (saver, address) = self.persistence(config)?;
        Ok(saver
            .list(&address.thread_id, options)
            .await?
            .into_iter()
            .map(StateSnapshot::from)
            .collect())
    }
}
