// SPDX-License-Identifier: MIT

//! Agent development kit: the boundaries every sub-agent shares
//!
//! - `agent` - caller-facing `Agent` trait
//! - `model` - text-completion provider boundary
//! - `error` - typed error hierarchy

pub mod agent;
pub mod error;
pub mod model;
