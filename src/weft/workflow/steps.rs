// SPDX-License-Identifier: MIT

//! Built-in steps for declarative workflows

use async_trait::async_trait;

use crate::adk::error::StepError;
use crate::weft::graph::{RunContext, Step};
use crate::weft::state::{PartialState, WorkflowState};

/// Renders a template against the state, sends it to the run's model and
/// writes the reply to `output`.
///
/// `{path}` placeholders are replaced with the text of the value at that
/// path; missing values render as an empty string. `{{` and `}}` produce
/// literal braces.
#[derive(Debug, Clone)]
pub struct PromptStep {
    template: String,
    output: String,
}

impl PromptStep {
    pub fn new(template: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            output: output.into(),
        }
    }

    pub fn render(&self, state: &WorkflowState) -> String {
        render_template(&self.template, state)
    }
}

#[async_trait]
impl Step for PromptStep {
    async fn run(&self, state: &WorkflowState, ctx: &RunContext) -> Result<PartialState, StepError> {
        let prompt = self.render(state);
        let reply = ctx.invoke_model(&prompt).await?;
        Ok(PartialState::new().with(self.output.clone(), reply))
    }
}

/// Writes the same partial state every time it runs
#[derive(Debug, Clone)]
pub struct SetStep {
    values: PartialState,
}

impl SetStep {
    pub fn new(values: PartialState) -> Self {
        Self { values }
    }
}

#[async_trait]
impl Step for SetStep {
    async fn run(&self, _state: &WorkflowState, _ctx: &RunContext) -> Result<PartialState, StepError> {
        Ok(self.values.clone())
    }
}

/// Replace `{path}` placeholders with state values
pub fn render_template(template: &str, state: &WorkflowState) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(&['{', '}'][..]) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('{') {
            if let Some(end) = tail.find('}') {
                let path = tail[1..end].trim();
                if let Some(value) = state.get_path(path) {
                    out.push_str(&value.to_text());
                }
                rest = &tail[end + 1..];
                continue;
            }
        }
        // unbalanced brace, keep it verbatim
        out.push_str(&tail[..1]);
        rest = &tail[1..];
    }
    out.push_str(rest);
    out
}
