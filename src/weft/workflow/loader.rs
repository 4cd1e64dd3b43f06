// SPDX-License-Identifier: MIT

//! Workflow loader - YAML file loading and parsing

use std::fs;
use std::path::Path;

use log::debug;

use crate::adk::error::WeftError;

use super::types::WorkflowDefinition;

/// Loads workflow definitions from YAML files
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkflowLoader;

impl WorkflowLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a workflow definition from a YAML file
    pub fn load_workflow<P: AsRef<Path>>(&self, path: P) -> Result<WorkflowDefinition, WeftError> {
        let path = path.as_ref();
        debug!("Loading workflow from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    /// Parse a workflow definition from a YAML string
    pub fn parse_yaml(content: &str) -> Result<WorkflowDefinition, WeftError> {
        Ok(serde_yaml::from_str(content)?)
    }
}
