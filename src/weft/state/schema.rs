// SPDX-License-Identifier: MIT

//! State schema definitions and reducers

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::store::WorkflowState;
use super::value::StateValue;
use crate::adk::error::{StateError, ValidationError};

/// Supported field types
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    #[serde(rename = "datetime")]
    DateTime,
    #[default]
    Any,
}

impl FieldType {
    /// Value a field of this type starts with when no default is given
    pub fn zero_value(&self) -> StateValue {
        match self {
            Self::String => StateValue::String(String::new()),
            Self::Number => StateValue::Int(0),
            Self::Boolean => StateValue::Bool(false),
            Self::Array => StateValue::List(Vec::new()),
            Self::Object => StateValue::Map(BTreeMap::new()),
            Self::DateTime | Self::Any => StateValue::Null,
        }
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "boolean" | "bool" => Ok(Self::Boolean),
            "array" | "list" => Ok(Self::Array),
            "object" | "map" => Ok(Self::Object),
            "datetime" | "date" => Ok(Self::DateTime),
            "any" => Ok(Self::Any),
            other => Err(other.to_string()),
        }
    }
}

/// Reducer types for merging values into state
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReducerType {
    /// Replace the value (default)
    #[default]
    Overwrite,
    /// Concatenate sequences; a scalar is pushed as one element
    Append,
    /// Concatenate, skipping items already present
    AppendUnique,
    /// Keep maximum value (numbers or dates)
    Max,
    /// Keep minimum value (numbers or dates)
    Min,
    /// Shallow merge of maps, incoming keys win
    Merge,
}

impl FromStr for ReducerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "overwrite" | "replace" => Ok(Self::Overwrite),
            "append" | "concat" => Ok(Self::Append),
            "append_unique" | "union" => Ok(Self::AppendUnique),
            "max" => Ok(Self::Max),
            "min" => Ok(Self::Min),
            "merge" => Ok(Self::Merge),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for ReducerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Overwrite => "overwrite",
            Self::Append => "append",
            Self::AppendUnique => "append_unique",
            Self::Max => "max",
            Self::Min => "min",
            Self::Merge => "merge",
        };
        f.write_str(name)
    }
}

impl ReducerType {
    /// Combine the existing value of `field` with an incoming one.
    ///
    /// `Null` incoming values overwrite under `Overwrite` and are ignored by
    /// every other reducer. A missing or `Null` existing value counts as the
    /// reducer's identity (empty list, empty map, no bound).
    pub fn apply(
        &self,
        field: &str,
        existing: Option<&StateValue>,
        incoming: &StateValue,
    ) -> Result<StateValue, StateError> {
        let existing = existing.filter(|v| !v.is_null());

        if incoming.is_null() && *self != Self::Overwrite {
            return Ok(existing.cloned().unwrap_or_default());
        }

        match self {
            Self::Overwrite => Ok(incoming.clone()),
            Self::Append | Self::AppendUnique => {
                let mut items = match existing {
                    None => Vec::new(),
                    Some(StateValue::List(items)) => items.clone(),
                    Some(other) => return Err(self.mismatch(field, other)),
                };
                let new_items = match incoming {
                    StateValue::List(new_items) => new_items.as_slice(),
                    scalar => std::slice::from_ref(scalar),
                };
                for item in new_items {
                    if *self == Self::AppendUnique && items.contains(item) {
                        continue;
                    }
                    items.push(item.clone());
                }
                Ok(StateValue::List(items))
            }
            Self::Max | Self::Min => {
                let Some(current) = existing else {
                    return match incoming {
                        StateValue::Int(_) | StateValue::Float(_) | StateValue::DateTime(_) => {
                            Ok(incoming.clone())
                        }
                        other => Err(self.mismatch(field, other)),
                    };
                };
                let incoming_wins = match (current, incoming) {
                    (StateValue::DateTime(a), StateValue::DateTime(b)) => {
                        if *self == Self::Max {
                            b > a
                        } else {
                            b < a
                        }
                    }
                    (a, b) => {
                        let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) else {
                            let found = if a.as_f64().is_none() && a.as_datetime().is_none() {
                                a
                            } else {
                                b
                            };
                            return Err(self.mismatch(field, found));
                        };
                        if *self == Self::Max {
                            b > a
                        } else {
                            b < a
                        }
                    }
                };
                Ok(if incoming_wins {
                    incoming.clone()
                } else {
                    current.clone()
                })
            }
            Self::Merge => {
                let mut map = match existing {
                    None => BTreeMap::new(),
                    Some(StateValue::Map(map)) => map.clone(),
                    Some(other) => return Err(self.mismatch(field, other)),
                };
                let StateValue::Map(new_map) = incoming else {
                    return Err(self.mismatch(field, incoming));
                };
                for (k, v) in new_map {
                    map.insert(k.clone(), v.clone());
                }
                Ok(StateValue::Map(map))
            }
        }
    }

    fn mismatch(&self, field: &str, found: &StateValue) -> StateError {
        StateError::ReducerMismatch {
            field: field.to_string(),
            reducer: self.to_string(),
            found: found.type_name(),
        }
    }
}

/// How a field's initial value is produced
#[derive(Clone, Default)]
pub enum FieldDefault {
    /// The zero value of the field type
    #[default]
    Zero,
    Value(StateValue),
    /// Current UTC time at materialisation
    Now,
    Factory(Arc<dyn Fn() -> StateValue + Send + Sync>),
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zero => f.write_str("Zero"),
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Now => f.write_str("Now"),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Definition of a single state field
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub field_type: FieldType,
    pub reducer: ReducerType,
    pub default: FieldDefault,
}

impl FieldDef {
    pub fn new(field_type: FieldType, reducer: ReducerType) -> Self {
        Self {
            field_type,
            reducer,
            default: FieldDefault::Zero,
        }
    }

    pub fn overwrite(field_type: FieldType) -> Self {
        Self::new(field_type, ReducerType::Overwrite)
    }

    /// List field that concatenates every write
    pub fn append() -> Self {
        Self::new(FieldType::Array, ReducerType::Append)
    }

    pub fn append_unique() -> Self {
        Self::new(FieldType::Array, ReducerType::AppendUnique)
    }

    pub fn with_default(mut self, value: impl Into<StateValue>) -> Self {
        self.default = FieldDefault::Value(value.into());
        self
    }

    pub fn default_now(mut self) -> Self {
        self.default = FieldDefault::Now;
        self
    }

    pub fn default_with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> StateValue + Send + Sync + 'static,
    {
        self.default = FieldDefault::Factory(Arc::new(factory));
        self
    }

    /// Materialise this field's initial value
    pub fn default_value(&self) -> StateValue {
        match &self.default {
            FieldDefault::Zero => self.field_type.zero_value(),
            FieldDefault::Value(v) => v.clone(),
            FieldDefault::Now => StateValue::now(),
            FieldDefault::Factory(f) => f(),
        }
    }
}

/// Schema defining the workflow state structure
#[derive(Debug, Clone, Default)]
pub struct StateSchema {
    fields: BTreeMap<String, FieldDef>,
}

impl StateSchema {
    pub fn builder() -> StateSchemaBuilder {
        StateSchemaBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldDef)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// A fresh state with every field set to its default
    pub fn defaults(&self) -> WorkflowState {
        self.fields
            .iter()
            .map(|(name, def)| (name.clone(), def.default_value()))
            .collect()
    }
}

/// Collects field definitions; duplicates are reported by `build`
#[derive(Debug, Default)]
pub struct StateSchemaBuilder {
    fields: Vec<(String, FieldDef)>,
}

impl StateSchemaBuilder {
    pub fn field(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        self.fields.push((name.into(), def));
        self
    }

    pub fn build(self) -> Result<StateSchema, ValidationError> {
        let mut fields = BTreeMap::new();
        for (name, def) in self.fields {
            if fields.contains_key(&name) {
                return Err(ValidationError::DuplicateField(name));
            }
            fields.insert(name, def);
        }
        Ok(StateSchema { fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_duplicate_field_rejected() {
        let err = StateSchema::builder()
            .field("query", FieldDef::overwrite(FieldType::String))
            .field("query", FieldDef::append())
            .build()
            .unwrap_err();
        assert_eq!(err, ValidationError::DuplicateField("query".to_string()));
    }

    #[test]
    fn test_defaults_materialise() {
        let schema = StateSchema::builder()
            .field("name", FieldDef::overwrite(FieldType::String).with_default("ava"))
            .field("count", FieldDef::overwrite(FieldType::Number))
            .field("items", FieldDef::append())
            .field("seen_at", FieldDef::overwrite(FieldType::DateTime).default_now())
            .field("tag", FieldDef::overwrite(FieldType::Any).default_with(|| "x".into()))
            .build()
            .unwrap();

        let state = schema.defaults();
        assert_eq!(state.get_str("name"), Some("ava"));
        assert_eq!(state.get("count"), Some(&StateValue::Int(0)));
        assert_eq!(state.get("items"), Some(&StateValue::List(vec![])));
        assert!(state.get("seen_at").and_then(StateValue::as_datetime).is_some());
        assert_eq!(state.get_str("tag"), Some("x"));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("append".parse::<ReducerType>(), Ok(ReducerType::Append));
        assert_eq!(
            "append_unique".parse::<ReducerType>(),
            Ok(ReducerType::AppendUnique)
        );
        assert_eq!("sum".parse::<ReducerType>(), Err("sum".to_string()));
        assert_eq!("datetime".parse::<FieldType>(), Ok(FieldType::DateTime));
        assert_eq!(ReducerType::AppendUnique.to_string(), "append_unique");
    }

    #[test]
    fn test_overwrite_reducer() {
        let r = ReducerType::Overwrite;
        let out = r.apply("v", Some(&"first".into()), &"second".into()).unwrap();
        assert_eq!(out, StateValue::from("second"));
        let out = r.apply("v", Some(&"first".into()), &StateValue::Null).unwrap();
        assert_eq!(out, StateValue::Null);
    }

    #[test]
    fn test_append_reducer() {
        let r = ReducerType::Append;
        let out = r.apply("items", None, &"item1".into()).unwrap();
        assert_eq!(out, StateValue::from(vec!["item1"]));

        let out = r
            .apply("items", Some(&out), &StateValue::from(vec!["item2", "item3"]))
            .unwrap();
        assert_eq!(out, StateValue::from(vec!["item1", "item2", "item3"]));

        let out = r.apply("items", Some(&out), &StateValue::Null).unwrap();
        assert_eq!(out, StateValue::from(vec!["item1", "item2", "item3"]));
    }

    #[test]
    fn test_append_onto_scalar_is_mismatch() {
        let err = ReducerType::Append
            .apply("items", Some(&"oops".into()), &"x".into())
            .unwrap_err();
        assert_eq!(
            err,
            StateError::ReducerMismatch {
                field: "items".to_string(),
                reducer: "append".to_string(),
                found: "string",
            }
        );
    }

    #[test]
    fn test_append_unique_reducer() {
        let r = ReducerType::AppendUnique;
        let existing = StateValue::from(vec!["a", "b"]);
        let out = r
            .apply("tags", Some(&existing), &StateValue::from(vec!["b", "c", "c"]))
            .unwrap();
        assert_eq!(out, StateValue::from(vec!["a", "b", "c"]));
    }

    #[test]
    fn test_max_min_reducers() {
        let out = ReducerType::Max
            .apply("score", Some(&StateValue::Float(5.0)), &StateValue::Int(3))
            .unwrap();
        assert_eq!(out, StateValue::Float(5.0));
        let out = ReducerType::Max
            .apply("score", Some(&StateValue::Float(5.0)), &StateValue::Int(8))
            .unwrap();
        assert_eq!(out, StateValue::Int(8));
        let out = ReducerType::Min
            .apply("cost", Some(&StateValue::Int(10)), &StateValue::Int(5))
            .unwrap();
        assert_eq!(out, StateValue::Int(5));
        let out = ReducerType::Min.apply("cost", None, &StateValue::Int(7)).unwrap();
        assert_eq!(out, StateValue::Int(7));
    }

    #[test]
    fn test_max_on_dates() {
        let earlier = Utc::now();
        let later = earlier + Duration::minutes(5);
        let out = ReducerType::Max
            .apply("seen", Some(&later.into()), &earlier.into())
            .unwrap();
        assert_eq!(out, StateValue::DateTime(later));
    }

    #[test]
    fn test_max_on_string_is_mismatch() {
        let err = ReducerType::Max
            .apply("score", Some(&StateValue::Int(1)), &"high".into())
            .unwrap_err();
        assert!(matches!(err, StateError::ReducerMismatch { found: "string", .. }));
    }

    #[test]
    fn test_merge_reducer() {
        let existing = StateValue::from(serde_json::json!({"a": 1, "b": 1}));
        let incoming = StateValue::from(serde_json::json!({"b": 2, "c": 3}));
        let out = ReducerType::Merge
            .apply("meta", Some(&existing), &incoming)
            .unwrap();
        assert_eq!(out, StateValue::from(serde_json::json!({"a": 1, "b": 2, "c": 3})));
    }
}
