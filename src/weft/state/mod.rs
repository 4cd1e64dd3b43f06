// SPDX-License-Identifier: MIT

//! State management for graph workflows
//!
//! This module provides:
//! - `StateValue` - dynamically typed field values (dates and bytes included)
//! - `StateSchema` - defines the fields of workflow state and their reducers
//! - `WorkflowState` / `PartialState` - full state and step updates

mod schema;
mod store;
mod value;

pub use schema::{FieldDef, FieldDefault, FieldType, ReducerType, StateSchema, StateSchemaBuilder};
pub use store::{PartialState, WorkflowState};
pub use value::StateValue;
