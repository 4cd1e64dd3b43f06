// SPDX-License-Identifier: MIT

//! Runtime state storage for workflow execution

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::schema::StateSchema;
use super::value::StateValue;
use crate::adk::error::StateError;

/// Runtime workflow state.
///
/// Values are never mutated in place during a run: [`WorkflowState::merge`]
/// returns a new state so concurrent branches keep reading a stable snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowState {
    values: BTreeMap<String, StateValue>,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(StateValue::as_str)
    }

    pub fn get_list(&self, key: &str) -> Option<&[StateValue]> {
        self.get(key).and_then(StateValue::as_list)
    }

    /// Get a nested field value using dot notation (e.g., "result.intent")
    pub fn get_path(&self, path: &str) -> Option<&StateValue> {
        let mut parts = path.split('.');
        let mut current = self.values.get(parts.next()?)?;
        for part in parts {
            current = match current {
                StateValue::List(items) => items.get(part.parse::<usize>().ok()?)?,
                other => other.get(part)?,
            };
        }
        Some(current)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn values(&self) -> &BTreeMap<String, StateValue> {
        &self.values
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    /// Convert state to JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Fold a partial update into a copy of this state.
    ///
    /// Each field present in `partial` goes through its reducer; fields
    /// absent from `partial` are carried over untouched.
    pub fn merge(
        &self,
        schema: &StateSchema,
        partial: &PartialState,
    ) -> Result<WorkflowState, StateError> {
        let mut values = self.values.clone();
        for (key, incoming) in partial.iter() {
            let def = schema
                .get(key)
                .ok_or_else(|| StateError::UnknownField(key.clone()))?;
            let merged = def.reducer.apply(key, values.get(key), incoming)?;
            values.insert(key.clone(), merged);
        }
        Ok(Self { values })
    }
}

impl FromIterator<(String, StateValue)> for WorkflowState {
    fn from_iter<I: IntoIterator<Item = (String, StateValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// The update a step returns: only the fields it wants to write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartialState {
    values: BTreeMap<String, StateValue>,
}

impl PartialState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<StateValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<StateValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &StateValue)> {
        self.values.iter()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Build from a JSON object; anything else yields `None`
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(
                map.into_iter()
                    .map(|(k, v)| (k, StateValue::from(v)))
                    .collect(),
            ),
            _ => None,
        }
    }
}

impl FromIterator<(String, StateValue)> for PartialState {
    fn from_iter<I: IntoIterator<Item = (String, StateValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
