// SPDX-License-Identifier: MIT

//! Condition expressions for routing
//!
//! Conditions are small expressions evaluated against the current state:
//! - `current_action == 'respond'`
//! - `retries >= 3`
//! - `tags contains 'urgent' and not done == true`

mod ast;
mod evaluator;
mod parser;

pub use ast::{CompareOp, Expression, Literal};
pub use evaluator::evaluate;
pub use parser::parse;
