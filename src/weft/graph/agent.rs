// SPDX-License-Identifier: MIT

//! Graph-backed agents
//!
//! Adapts a [`CompiledGraph`] to the caller-facing [`Agent`] trait: the
//! input text is written to one state field and the answer is read back
//! from another.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::adk::agent::{Agent, AgentEvent};
use crate::adk::error::WeftError;
use crate::weft::state::{PartialState, StateValue};

use super::compiled::CompiledGraph;
use super::interrupt::RunOutcome;
use super::types::{RunConfig, StreamEvent};

pub struct GraphAgent {
    name: String,
    graph: CompiledGraph,
    input_field: String,
    output_field: String,
    config: RunConfig,
}

impl GraphAgent {
    /// Agent over `graph` reading `query` and answering from `messages`,
    /// on a fresh thread
    pub fn new(name: impl Into<String>, graph: CompiledGraph) -> Self {
        Self {
            name: name.into(),
            graph,
            input_field: "query".to_string(),
            output_field: "messages".to_string(),
            config: RunConfig::for_thread(uuid::Uuid::new_v4().to_string()),
        }
    }

    pub fn with_input_field(mut self, field: impl Into<String>) -> Self {
        self.input_field = field.into();
        self
    }

    pub fn with_output_field(mut self, field: impl Into<String>) -> Self {
        self.output_field = field.into();
        self
    }

    /// Run settings; a config without a thread keeps the current thread
    pub fn with_config(mut self, config: RunConfig) -> Self {
        let thread_id = config.thread_id.clone().or(self.config.thread_id.take());
        self.config = RunConfig { thread_id, ..config };
        self
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.config.thread_id.as_deref()
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    fn input(&self, text: String) -> PartialState {
        PartialState::new().with(self.input_field.clone(), text)
    }
}

/// Text of an output field: the last element of a list, the `content` of a
/// message map, or the value itself
pub fn answer_text(value: &StateValue) -> String {
    match value {
        StateValue::List(items) => items.last().map(answer_text).unwrap_or_default(),
        StateValue::Map(map) => map
            .get("content")
            .map(StateValue::to_text)
            .unwrap_or_else(|| value.to_text()),
        other => other.to_text(),
    }
}

#[async_trait]
impl Agent for GraphAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, input: String) -> Result<String, WeftError> {
        match self.graph.invoke(Some(self.input(input)), &self.config).await? {
            RunOutcome::Completed(state) => Ok(state
                .get(&self.output_field)
                .map(answer_text)
                .unwrap_or_default()),
            RunOutcome::Paused(interrupted) => Err(WeftError::Paused {
                next: interrupted.next,
            }),
        }
    }

    async fn run_stream(
        &self,
        input: String,
        tx: mpsc::Sender<AgentEvent>,
    ) -> Result<String, WeftError> {
        let mut events = self.graph.stream(Some(self.input(input)), &self.config);
        let mut answer = String::new();

        while let Some(event) = events.next().await {
            match event {
                Ok(StreamEvent::Update { node, update }) => {
                    if let Some(value) = update.get(&self.output_field) {
                        answer = answer_text(value);
                    }
                    let _ = tx
                        .send(AgentEvent::Update {
                            node,
                            update: update.to_json(),
                        })
                        .await;
                }
                Ok(StreamEvent::Interrupted(interrupted)) => {
                    let _ = tx
                        .send(AgentEvent::Interrupted {
                            next: interrupted.next.clone(),
                        })
                        .await;
                    return Err(WeftError::Paused {
                        next: interrupted.next,
                    });
                }
                Err(e) => {
                    let _ = tx.send(AgentEvent::Error(e.to_string())).await;
                    return Err(e.into());
                }
            }
        }

        let _ = tx.send(AgentEvent::Answer(answer.clone())).await;
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::adk::model::EchoModel;
    use crate::weft::checkpoint::InMemoryCheckpointer;
    use crate::weft::graph::{CompileOptions, StateGraph};
    use crate::weft::state::{FieldDef, FieldType, StateSchema};

    fn echo_graph(interrupt: bool) -> CompiledGraph {
        let schema = StateSchema::builder()
            .field("query", FieldDef::overwrite(FieldType::String))
            .field("messages", FieldDef::append())
            .build()
            .unwrap();
        let mut graph = StateGraph::new(schema);
        graph.add_node_fn("respond", |s, ctx| async move {
            let reply = ctx.invoke_model(s.get_str("query").unwrap_or_default()).await?;
            Ok(PartialState::new().with("messages", reply))
        });
        graph.set_entry_point("respond").set_finish_point("respond");

        let mut options =
            CompileOptions::default().with_checkpointer(Arc::new(InMemoryCheckpointer::new()));
        if interrupt {
            options = options.interrupt_before(["respond"]);
        }
        graph.compile(options).unwrap()
    }

    fn agent(interrupt: bool) -> GraphAgent {
        GraphAgent::new("echo", echo_graph(interrupt))
            .with_config(RunConfig::new().with_model(Arc::new(EchoModel::new().with_prefix("> "))))
    }

    #[tokio::test]
    async fn test_run_returns_last_message() {
        let agent = agent(false);
        assert!(agent.thread_id().is_some());
        assert_eq!(agent.run("hello".to_string()).await.unwrap(), "> hello");
        assert_eq!(agent.run("again".to_string()).await.unwrap(), "> again");
    }

    #[tokio::test]
    async fn test_run_stream_sends_updates_then_answer() {
        let agent = agent(false);
        let (tx, mut rx) = mpsc::channel(8);
        let answer = agent.run_stream("hi".to_string(), tx).await.unwrap();
        assert_eq!(answer, "> hi");

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, AgentEvent::Update { ref node, .. } if node == "respond"));
        assert_eq!(rx.recv().await, Some(AgentEvent::Answer("> hi".to_string())));
    }

    #[tokio::test]
    async fn test_paused_graph_reports_paused() {
        let agent = agent(true);
        let err = agent.run("hi".to_string()).await.unwrap_err();
        assert!(matches!(err, WeftError::Paused { ref next } if next == &vec!["respond".to_string()]));
    }

    #[test]
    fn test_answer_text() {
        let message = StateValue::from(serde_json::json!([
            {"role": "user", "content": "q"},
            {"role": "assistant", "content": "a"}
        ]));
        assert_eq!(answer_text(&message), "a");
        assert_eq!(answer_text(&StateValue::from("plain")), "plain");
        assert_eq!(answer_text(&StateValue::List(vec![])), "");
    }
}
