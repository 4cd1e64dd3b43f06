// SPDX-License-Identifier: MIT

//! weft-rs: a graph workflow engine for conversational agents
//!
//! Sub-agents are declared as named steps connected by static and
//! conditional edges over a shared state whose fields carry their own merge
//! rules. Runs are checkpointed per thread so conversations can be resumed,
//! rewound, or paused for human review.
//!
//! ```no_run
//! use weft_rs::weft::graph::{CompileOptions, RunConfig, StateGraph, END, START};
//! use weft_rs::weft::state::{FieldDef, FieldType, PartialState, StateSchema};
//!
//! # async fn demo() -> Result<(), weft_rs::adk::error::WeftError> {
//! let schema = StateSchema::builder()
//!     .field("query", FieldDef::overwrite(FieldType::String))
//!     .field("messages", FieldDef::append())
//!     .build()?;
//!
//! let mut graph = StateGraph::new(schema);
//! graph.add_node_fn("respond", |state, _ctx| async move {
//!     let query = state.get_str("query").unwrap_or_default().to_string();
//!     Ok(PartialState::new().with("messages", vec![format!("echo: {query}")]))
//! });
//! graph.add_edge(START, "respond");
//! graph.add_edge("respond", END);
//!
//! let app = graph.compile(CompileOptions::default())?;
//! let outcome = app
//!     .invoke(Some(PartialState::new().with("query", "hello")), &RunConfig::new())
//!     .await?;
//! println!("{:?}", outcome.state().get("messages"));
//! # Ok(())
//! # }
//! ```

pub mod adk;
pub mod weft;
