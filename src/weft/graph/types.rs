// SPDX-License-Identifier: MIT

//! Graph type definitions
//!
//! Markers, routes and the configuration objects passed into a run.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::adk::error::ModelError;
use crate::adk::model::Model;
use crate::weft::checkpoint::{CheckpointConfig, Checkpointer};
use crate::weft::state::{PartialState, StateValue, WorkflowState};

use super::interrupt::Interrupted;

/// Virtual source node every run starts from
pub const START: &str = "__start__";
/// Virtual sink node; reaching it ends a branch
pub const END: &str = "__end__";

pub const DEFAULT_RECURSION_LIMIT: usize = 25;

/// Path-map key(s) chosen by a router
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    One(String),
    /// Fan out to every key, in order
    Many(Vec<String>),
}

impl Route {
    pub fn into_keys(self) -> Vec<String> {
        match self {
            Route::One(key) => vec![key],
            Route::Many(keys) => keys,
        }
    }
}

impl From<&str> for Route {
    fn from(key: &str) -> Self {
        Route::One(key.to_string())
    }
}

impl From<String> for Route {
    fn from(key: String) -> Self {
        Route::One(key)
    }
}

impl From<Vec<String>> for Route {
    fn from(keys: Vec<String>) -> Self {
        Route::Many(keys)
    }
}

impl From<Vec<&str>> for Route {
    fn from(keys: Vec<&str>) -> Self {
        Route::Many(keys.into_iter().map(str::to_string).collect())
    }
}

/// Routing function of a conditional edge, evaluated on merged state
pub type RouterFn = Arc<dyn Fn(&WorkflowState) -> Route + Send + Sync>;

/// Per-node settings supplied at registration
#[derive(Debug, Clone, Default)]
pub struct NodeOptions {
    /// Copied into the node's `RunContext`
    pub metadata: BTreeMap<String, StateValue>,
}

impl NodeOptions {
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<StateValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Settings that apply when a graph is compiled
#[derive(Clone, Default)]
pub struct CompileOptions {
    pub checkpointer: Option<Arc<dyn Checkpointer>>,
    /// Pause before any of these nodes runs
    pub interrupt_before: Vec<String>,
    /// Upper bound on fan-out siblings running at once; unbounded if unset
    pub max_concurrency: Option<usize>,
    pub name: Option<String>,
}

impl CompileOptions {
    pub fn with_checkpointer(mut self, checkpointer: Arc<dyn Checkpointer>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    pub fn interrupt_before<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interrupt_before = nodes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit.max(1));
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl fmt::Debug for CompileOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileOptions")
            .field("checkpointer", &self.checkpointer.is_some())
            .field("interrupt_before", &self.interrupt_before)
            .field("max_concurrency", &self.max_concurrency)
            .field("name", &self.name)
            .finish()
    }
}

/// Per-invocation settings
#[derive(Clone)]
pub struct RunConfig {
    /// Required when the graph has a checkpointer
    pub thread_id: Option<String>,
    /// Start from this checkpoint instead of the thread's latest
    pub checkpoint_id: Option<String>,
    /// Maximum supersteps per invocation
    pub recursion_limit: usize,
    /// Handed to every step and stored with each checkpoint
    pub metadata: BTreeMap<String, StateValue>,
    pub model: Option<Arc<dyn Model>>,
    /// Hint for steps bounding their own external calls
    pub timeout: Option<Duration>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            thread_id: None,
            checkpoint_id: None,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            metadata: BTreeMap::new(),
            model: None,
            timeout: None,
        }
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("thread_id", &self.thread_id)
            .field("checkpoint_id", &self.checkpoint_id)
            .field("recursion_limit", &self.recursion_limit)
            .field("metadata", &self.metadata)
            .field("model", &self.model.as_ref().map(|m| m.name().to_string()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_thread(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
            ..Self::default()
        }
    }

    pub fn with_checkpoint(mut self, checkpoint_id: impl Into<String>) -> Self {
        self.checkpoint_id = Some(checkpoint_id.into());
        self
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<StateValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_model(mut self, model: Arc<dyn Model>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Checkpoint address of this run, if it names a thread
    pub fn checkpoint_config(&self) -> Option<CheckpointConfig> {
        self.thread_id.as_ref().map(|thread_id| CheckpointConfig {
            thread_id: thread_id.clone(),
            checkpoint_id: self.checkpoint_id.clone(),
        })
    }
}

/// What a step sees besides state
#[derive(Clone)]
pub struct RunContext {
    pub thread_id: Option<String>,
    /// Name of the node being run
    pub node: String,
    /// Superstep number within the thread
    pub step: i64,
    pub metadata: BTreeMap<String, StateValue>,
    pub node_metadata: BTreeMap<String, StateValue>,
    pub timeout: Option<Duration>,
    model: Option<Arc<dyn Model>>,
}

impl RunContext {
    /// Context for running a step outside of a graph
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            thread_id: None,
            node: node.into(),
            step: 0,
            metadata: BTreeMap::new(),
            node_metadata: BTreeMap::new(),
            timeout: None,
            model: None,
        }
    }

    pub(crate) fn for_node(
        config: &RunConfig,
        node: &str,
        step: i64,
        options: &NodeOptions,
    ) -> Self {
        Self {
            thread_id: config.thread_id.clone(),
            node: node.to_string(),
            step,
            metadata: config.metadata.clone(),
            node_metadata: options.metadata.clone(),
            timeout: config.timeout,
            model: config.model.clone(),
        }
    }

    pub fn with_model(mut self, model: Arc<dyn Model>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn model(&self) -> Result<&Arc<dyn Model>, ModelError> {
        self.model.as_ref().ok_or(ModelError::MissingModel)
    }

    /// Call the injected model, bounded by the run's timeout hint
    pub async fn invoke_model(&self, prompt: &str) -> Result<String, ModelError> {
        let model = self.model()?;
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, model.invoke(prompt))
                .await
                .map_err(|_| ModelError::Timeout(limit))?,
            None => model.invoke(prompt).await,
        }
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("thread_id", &self.thread_id)
            .field("node", &self.node)
            .field("step", &self.step)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Incremental output of [`CompiledGraph::stream`](super::CompiledGraph::stream)
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A node finished; `update` is the partial it returned
    Update { node: String, update: PartialState },
    /// The run paused; always the last event
    Interrupted(Interrupted),
}
