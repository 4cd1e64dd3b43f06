// SPDX-License-Identifier: MIT

//! The workflow engine
//!
//! - `state` - schema, reducers and state values
//! - `graph` - builder, executor and interrupts
//! - `checkpoint` - per-thread persistence
//! - `condition` - expression language for declarative routes
//! - `workflow` - YAML workflow definitions
//! - `companion` - the built-in chat companion graph
//! - `config` - process configuration

pub mod checkpoint;
pub mod companion;
pub mod condition;
pub mod config;
pub mod graph;
pub mod state;
pub mod workflow;
