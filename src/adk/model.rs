// SPDX-License-Identifier: MIT

//! Model provider boundary
//!
//! Steps never talk to a hosted provider directly; they receive an
//! `Arc<dyn Model>` through their run context. Only the offline
//! [`EchoModel`] ships with the crate.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::adk::error::ModelError;

/// Core trait for text-completion providers
#[async_trait]
pub trait Model: Send + Sync {
    /// Returns the model name
    fn name(&self) -> &str;

    /// Complete a prompt in one call
    async fn invoke(&self, prompt: &str) -> Result<String, ModelError>;

    /// Complete a prompt as a stream of text chunks
    async fn stream(
        &self,
        prompt: &str,
    ) -> Result<BoxStream<'static, Result<String, ModelError>>, ModelError> {
        // Default implementation falls back to invoke()
        let text = self.invoke(prompt).await?;
        Ok(stream::once(async move { Ok(text) }).boxed())
    }
}

/// Offline model that answers with the last non-empty line of the prompt.
#[derive(Debug, Clone)]
pub struct EchoModel {
    name: String,
    prefix: String,
}

impl EchoModel {
    pub fn new() -> Self {
        Self {
            name: "echo".to_string(),
            prefix: String::new(),
        }
    }

    /// Prepend `prefix` to every answer
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn answer(&self, prompt: &str) -> String {
        let last = prompt
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or_default();
        format!("{}{}", self.prefix, last)
    }
}

impl Default for EchoModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Model for EchoModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, prompt: &str) -> Result<String, ModelError> {
        Ok(self.answer(prompt))
    }

    async fn stream(
        &self,
        prompt: &str,
    ) -> Result<BoxStream<'static, Result<String, ModelError>>, ModelError> {
        let answer = self.answer(prompt);
        let chunks: Vec<Result<String, ModelError>> = answer
            .split_inclusive(' ')
            .map(|w| Ok(w.to_string()))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }
}

/// Resolve a model name to a provider.
///
/// Hosted providers live outside this crate, so only `echo` resolves here.
pub fn from_name(name: &str) -> Result<Arc<dyn Model>, ModelError> {
    match name {
        "echo" => Ok(Arc::new(EchoModel::new())),
        other => Err(ModelError::UnsupportedModel(other.to_string())),
    }
}
