// SPDX-License-Identifier: MIT

//! Process configuration
//!
//! Read once at startup from the environment (after `.env` has been loaded
//! with `dotenv`) and passed down explicitly:
//!
//! | Variable                 | Meaning                                  |
//! |--------------------------|------------------------------------------|
//! | `WEFT_DATABASE_URL`      | SQLite URL for checkpoints; in-memory if unset |
//! | `WEFT_RECURSION_LIMIT`   | Supersteps per invocation (default 25)   |
//! | `WEFT_MODEL`             | Model name (default `echo`)              |
//! | `WEFT_STEP_TIMEOUT_SECS` | Timeout hint for model calls             |

use std::env;
use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::adk::error::WeftError;
use crate::adk::model;
use crate::weft::checkpoint::{Checkpointer, InMemoryCheckpointer, SqliteCheckpointer};
use crate::weft::graph::{RunConfig, DEFAULT_RECURSION_LIMIT};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: Option<String>,
    pub recursion_limit: usize,
    pub model: String,
    pub step_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            model: "echo".to_string(),
            step_timeout: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, WeftError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WeftError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let recursion_limit = match get("WEFT_RECURSION_LIMIT") {
            Some(raw) => parse_positive("WEFT_RECURSION_LIMIT", &raw)?,
            None => defaults.recursion_limit,
        };
        let step_timeout = get("WEFT_STEP_TIMEOUT_SECS")
            .map(|raw| parse_positive("WEFT_STEP_TIMEOUT_SECS", &raw))
            .transpose()?
            .map(|secs| Duration::from_secs(secs as u64));

        Ok(Self {
            database_url: get("WEFT_DATABASE_URL"),
            recursion_limit,
            model: get("WEFT_MODEL").unwrap_or(defaults.model),
            step_timeout,
        })
    }

    /// Run settings for `thread_id` with the configured model injected
    pub fn run_config(&self, thread_id: &str) -> Result<RunConfig, WeftError> {
        let mut config = RunConfig::for_thread(thread_id)
            .with_recursion_limit(self.recursion_limit)
            .with_model(model::from_name(&self.model)?);
        if let Some(timeout) = self.step_timeout {
            config = config.with_timeout(timeout);
        }
        Ok(config)
    }

    /// Open the configured checkpoint store and create its tables
    pub async fn checkpointer(&self) -> Result<Arc<dyn Checkpointer>, WeftError> {
        let saver: Arc<dyn Checkpointer> = match &self.database_url {
            Some(url) => {
                info!("Using SQLite checkpoints at {url}");
                Arc::new(SqliteCheckpointer::connect(url).await?)
            }
            None => {
                info!("Using in-memory checkpoints");
                Arc::new(InMemoryCheckpointer::new())
            }
        };
        saver.setup().await?;
        Ok(saver)
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<usize, WeftError> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(WeftError::config(format!(
            "{key} must be a positive integer, got '{raw}'"
        ))),
    }
}
