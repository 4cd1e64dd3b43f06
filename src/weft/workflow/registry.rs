// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::weft::graph::Step;

/// Named steps that workflow files can reference with `step: <name>`.
/// Clones share the same table.
#[derive(Clone, Default)]
pub struct StepRegistry {
    steps: Arc<RwLock<HashMap<String, Arc<dyn Step>>>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `step` under `name`, replacing any previous entry
    pub async fn register(&self, name: impl Into<String>, step: Arc<dyn Step>) {
        let mut steps = self.steps.write().await;
        steps.insert(name.into(), step);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Step>> {
        let steps = self.steps.read().await;
        steps.get(name).cloned()
    }

    /// Registered names, sorted
    pub async fn names(&self) -> Vec<String> {
        let steps = self.steps.read().await;
        let mut names: Vec<String> = steps.keys().cloned().collect();
        names.sort();
        names
    }
}
