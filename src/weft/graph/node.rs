// SPDX-License-Identifier: MIT

//! Step functions and registered nodes

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::adk::error::StepError;
use crate::weft::state::{PartialState, WorkflowState};

use super::types::{NodeOptions, RunContext};

/// A unit of work: reads the current state, returns only what it changes.
///
/// Steps never mutate state directly; the executor merges the returned
/// partial through the schema's reducers.
#[async_trait]
pub trait Step: Send + Sync {
    async fn run(&self, state: &WorkflowState, ctx: &RunContext)
        -> Result<PartialState, StepError>;
}

/// Adapts an async closure into a [`Step`]
pub struct FnStep<F>(pub F);

#[async_trait]
impl<F, Fut> Step for FnStep<F>
where
    F: Fn(WorkflowState, RunContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PartialState, StepError>> + Send + 'static,
{
    async fn run(
        &self,
        state: &WorkflowState,
        ctx: &RunContext,
    ) -> Result<PartialState, StepError> {
        (self.0)(state.clone(), ctx.clone()).await
    }
}

/// A node as registered on the builder
#[derive(Clone)]
pub struct NodeSpec {
    pub name: String,
    pub step: Arc<dyn Step>,
    pub options: NodeOptions,
}

impl std::fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSpec")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish()
    }
}
