// SPDX-License-Identifier: MIT

//! Typed error handling for weft-rs
//!
//! Every failure the engine can report is one of the enums below. Graph,
//! checkpoint and model failures all propagate to the caller of
//! `invoke`/`stream`; nothing is downgraded to a log line.

use std::time::Duration;

use thiserror::Error;

use crate::weft::state::WorkflowState;

/// Error type returned by step functions.
pub type StepError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error type for weft-rs
#[derive(Debug, Error)]
pub enum WeftError {
    /// Configuration errors (missing env vars, invalid flags)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Graph or schema rejected at compile time
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Failure while executing a compiled graph
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Checkpoint store failures outside of a graph run
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// Model provider failures
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A graph-backed agent stopped at an interrupt
    #[error("Run paused before {next:?}; resume the thread to continue")]
    Paused { next: Vec<String> },

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

/// Graph and schema definitions rejected before anything runs.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("Unknown reducer '{reducer}' for field '{field}'")]
    UnknownReducer { field: String, reducer: String },

    #[error("Unknown type '{field_type}' for field '{field}'")]
    UnknownFieldType { field: String, field_type: String },

    #[error("Node name '{0}' is reserved")]
    ReservedName(String),

    #[error("Node '{0}' is registered more than once")]
    DuplicateNode(String),

    #[error("Graph has no entry point: add an edge from START")]
    NoEntryPoint,

    #[error("Edge references unknown node '{0}'")]
    UnknownNode(String),

    #[error("Invalid edge {from} -> {to}: {reason}")]
    InvalidEdge {
        from: String,
        to: String,
        reason: &'static str,
    },

    #[error("Conditional edge from '{from}' targets unknown node '{target}'")]
    UnknownRouteTarget { from: String, target: String },

    #[error("Node '{0}' already has a conditional edge")]
    DuplicateRouter(String),

    #[error("Unreachable nodes: {0:?}")]
    Unreachable(Vec<String>),

    #[error("Node '{0}' has no outgoing edge; add an edge to END")]
    DeadEnd(String),

    #[error("interrupt_before references unknown node '{0}'")]
    UnknownInterrupt(String),

    #[error("interrupt_before requires a checkpointer")]
    InterruptWithoutCheckpointer,

    #[error("Invalid condition '{expr}': {reason}")]
    InvalidCondition { expr: String, reason: String },

    #[error("Step '{0}' is not registered")]
    UnknownStep(String),

    #[error("Node '{node}' is invalid: {reason}")]
    InvalidNode { node: String, reason: String },
}

/// Reducer failures while merging a partial state.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StateError {
    #[error("Field '{0}' is not declared in the state schema")]
    UnknownField(String),

    #[error("Reducer '{reducer}' cannot merge a {found} value into field '{field}'")]
    ReducerMismatch {
        field: String,
        reducer: String,
        found: &'static str,
    },
}

/// Run-time failures of a compiled graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The caller's input does not fit the schema
    #[error("Invalid input: {0}")]
    InvalidInput(#[source] StateError),

    /// A step returned an error; nothing from its superstep was merged
    #[error("Node '{node}' failed: {source}")]
    StepFailed {
        node: String,
        #[source]
        source: StepError,
        /// State as it was before the failing superstep
        state: Box<WorkflowState>,
    },

    /// A router returned a key outside its path map
    #[error("Router on '{node}' returned unknown target '{target}'")]
    InvalidRoute { node: String, target: String },

    #[error("Recursion limit of {limit} supersteps reached without hitting END")]
    RecursionLimit { limit: usize },

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Operation needs both a checkpointer and a thread id
    #[error("Operation requires a checkpointer and a thread id")]
    MissingThread,
}

/// Checkpoint store failures.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Storage backend I/O failure
    #[error("Checkpoint backend error: {0}")]
    Backend(String),

    /// Encoding or decoding of a checkpoint blob failed
    #[error("Checkpoint codec error: {0}")]
    Codec(String),

    #[error("Checkpoint '{checkpoint_id}' not found for thread '{thread_id}'")]
    NotFound {
        thread_id: String,
        checkpoint_id: String,
    },
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// No model was injected into the run context
    #[error("No model configured for this run")]
    MissingModel,

    /// Model not supported
    #[error("Model not supported: {0}")]
    UnsupportedModel(String),

    /// Provider call exceeded the step timeout
    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),
}

impl WeftError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl GraphError {
    /// Name of the node that failed, if the error came from a step.
    pub fn node(&self) -> Option<&str> {
        match self {
            Self::StepFailed { node, .. } | Self::InvalidRoute { node, .. } => Some(node),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for CheckpointError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for CheckpointError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for CheckpointError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<&str> for WeftError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for WeftError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}
