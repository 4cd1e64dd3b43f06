// SPDX-License-Identifier: MIT

//! Declarative workflows
//!
//! YAML files describing a state schema, nodes and routes, compiled into
//! the same [`CompiledGraph`](crate::weft::graph::CompiledGraph) the
//! programmatic builder produces.

pub mod builder;
pub mod loader;
pub mod registry;
pub mod steps;
pub mod types;

pub use builder::{build_schema, Workflow, WorkflowBuilder};
pub use loader::WorkflowLoader;
pub use registry::StepRegistry;
pub use steps::{render_template, PromptStep, SetStep};
pub use types::{
    BranchDefinition, EdgeDefinition, JoinDefinition, NodeDefinition, RouteDefinition,
    StateFieldDef, WorkflowDefinition,
};
