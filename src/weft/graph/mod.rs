// SPDX-License-Identifier: MIT

//! Graph-based workflow execution
//!
//! `StateGraph` collects nodes and edges, `compile` validates them into a
//! `CompiledGraph`, and the executor runs it in supersteps with optional
//! checkpointing and interrupts.

pub mod agent;
mod builder;
mod compiled;
mod executor;
mod interrupt;
mod node;
pub mod types;

pub use agent::GraphAgent;
pub use builder::StateGraph;
pub use compiled::{CompiledGraph, EdgeKind, EdgeView, GraphView};
pub use interrupt::{Interrupted, RunOutcome, StateSnapshot};
pub use node::{FnStep, NodeSpec, Step};
pub use types::{
    CompileOptions, NodeOptions, Route, RouterFn, RunConfig, RunContext, StreamEvent,
    DEFAULT_RECURSION_LIMIT, END, START,
};
