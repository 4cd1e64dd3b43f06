// SPDX-License-Identifier: MIT

//! YAML schema types for declarative workflows
//!
//! A workflow file declares the state schema, the nodes, and how control
//! moves between them:
//!
//! ```yaml
//! name: triage
//! state:
//!   query: { type: string }
//!   notes: { type: array, reducer: append }
//! nodes:
//!   - id: classify
//!     prompt: "Classify: {query}"
//!     output: label
//! edges:
//!   - { from: START, to: classify }
//! routes:
//!   - from: classify
//!     branches:
//!       - { when: "label == 'bug'", to: file_bug }
//!     default: END
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level workflow definition
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// State schema, field name to definition
    #[serde(default)]
    pub state: BTreeMap<String, StateFieldDef>,
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
    #[serde(default)]
    pub routes: Vec<RouteDefinition>,
    #[serde(default)]
    pub joins: Vec<JoinDefinition>,
    #[serde(default)]
    pub interrupt_before: Vec<String>,
    pub recursion_limit: Option<usize>,
    pub max_concurrency: Option<usize>,
}

/// State field definition
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StateFieldDef {
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: String,
    #[serde(default)]
    pub reducer: Option<String>,
    /// Initial value; the string `now` on a datetime field means the
    /// time the state is created
    pub default: Option<serde_json::Value>,
}

fn default_field_type() -> String {
    "any".to_string()
}

/// A node: exactly one of `step`, `prompt` or `set`
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NodeDefinition {
    pub id: String,
    /// Name of a step in the [`StepRegistry`](super::registry::StepRegistry)
    pub step: Option<String>,
    /// Prompt template with `{field}` placeholders, sent to the run's model
    pub prompt: Option<String>,
    /// Field receiving the model reply of a `prompt` node
    pub output: Option<String>,
    /// Constant writes
    pub set: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Static edge; `START` and `END` name the virtual endpoints
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct EdgeDefinition {
    pub from: String,
    pub to: String,
}

/// Conditional routing out of one node
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RouteDefinition {
    pub from: String,
    pub branches: Vec<BranchDefinition>,
    /// Target when no branch matches; `END` when omitted
    pub default: Option<String>,
    /// Take every matching branch instead of the first
    #[serde(default)]
    pub fan_out: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BranchDefinition {
    pub when: String,
    pub to: String,
}

/// Run `target` after every node in `sources` has completed
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct JoinDefinition {
    pub sources: Vec<String>,
    pub target: String,
}
