// SPDX-License-Identifier: MIT

//! Agent module - the caller-facing surface of a sub-agent
//!
//! Higher-level code (CLI commands, chat front ends) talks to sub-agents
//! through the `Agent` trait. Graph-backed agents implement it in
//! `weft::graph::agent`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::adk::error::WeftError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AgentEvent {
    /// A node finished and produced this update
    Update {
        node: String,
        update: serde_json::Value,
    },
    /// The run stopped before these nodes
    Interrupted { next: Vec<String> },
    Answer(String),
    Error(String),
}

/// Core agent trait for all agent types
#[async_trait]
pub trait Agent: Send + Sync {
    /// Returns the agent name
    fn name(&self) -> &str;

    /// Run the agent with the given input
    async fn run(&self, input: String) -> Result<String, WeftError>;

    /// Run the agent with streaming events
    async fn run_stream(
        &self,
        input: String,
        tx: mpsc::Sender<AgentEvent>,
    ) -> Result<String, WeftError> {
        // Default implementation falls back to run()
        match self.run(input).await {
            Ok(res) => {
                let _ = tx.send(AgentEvent::Answer(res.clone())).await;
                Ok(res)
            }
            Err(e) => {
                let _ = tx.send(AgentEvent::Error(e.to_string())).await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple mock agent that transforms input (used in tests)
    pub struct MockAgent {
        name: String,
        transform: fn(String) -> String,
    }

    impl MockAgent {
        pub fn new(name: &str, transform: fn(String) -> String) -> Self {
            Self {
                name: name.to_string(),
                transform,
            }
        }
    }

    #[async_trait]
    impl Agent for MockAgent {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self, input: String) -> Result<String, WeftError> {
            Ok((self.transform)(input))
        }
    }

    #[tokio::test]
    async fn test_default_run_stream_sends_answer() {
        let agent = MockAgent::new("upper", |s| s.to_uppercase());
        let (tx, mut rx) = mpsc::channel(4);

        let result = agent.run_stream("hi".to_string(), tx).await.unwrap();
        assert_eq!(result, "HI");
        assert_eq!(rx.recv().await, Some(AgentEvent::Answer("HI".to_string())));
    }
}
