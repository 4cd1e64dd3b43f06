// SPDX-License-Identifier: MIT

//! Built-in chat companion
//!
//! `route` asks the model whether the query needs a plain reply or an
//! action, one of `respond` / `action` answers, and `memory` rewrites the
//! long-term memories from the conversation:
//!
//! ```text
//! START -> route -> respond | action -> memory -> END
//! ```

use chrono::Utc;
use log::debug;

use crate::adk::error::{StepError, ValidationError};
use crate::weft::graph::{CompileOptions, CompiledGraph, RunContext, StateGraph, END, START};
use crate::weft::state::{
    FieldDef, FieldType, PartialState, ReducerType, StateSchema, StateValue, WorkflowState,
};

pub const RESPOND: &str = "respond";
pub const ACTION: &str = "action";

pub(crate) const ROUTE_HEADER: &str = "Decide how to handle the user's latest query.";
pub(crate) const ACTION_HEADER: &str = "Answer the query using the actions available to you.";
pub(crate) const MEMORY_HEADER: &str = "You are the memory of a digital companion.";

/// State fields of the companion graph
pub fn companion_schema() -> Result<StateSchema, ValidationError> {
    StateSchema::builder()
        .field("assistant_name", FieldDef::overwrite(FieldType::String).with_default("Ava"))
        .field("user_name", FieldDef::overwrite(FieldType::String).with_default("User"))
        .field("query", FieldDef::overwrite(FieldType::String))
        .field("current_action", FieldDef::overwrite(FieldType::String).with_default(RESPOND))
        .field("messages", FieldDef::append())
        .field("goals", FieldDef::append())
        .field("thoughts", FieldDef::append())
        .field("memories", FieldDef::new(FieldType::Array, ReducerType::Overwrite))
        .field(
            "last_interaction_at",
            FieldDef::overwrite(FieldType::DateTime).default_now(),
        )
        .build()
}

/// Compile the companion graph
pub fn build_companion_graph(options: CompileOptions) -> Result<CompiledGraph, ValidationError> {
    let mut graph = StateGraph::new(companion_schema()?);
    graph
        .add_node_fn("route", route)
        .add_node_fn(RESPOND, respond)
        .add_node_fn(ACTION, action)
        .add_node_fn("memory", memory)
        .add_edge(START, "route")
        .add_conditional_edges(
            "route",
            |state: &WorkflowState| {
                state
                    .get_str("current_action")
                    .unwrap_or(RESPOND)
                    .to_string()
            },
            [(RESPOND, RESPOND), (ACTION, ACTION)],
        )
        .add_edge(RESPOND, "memory")
        .add_edge(ACTION, "memory")
        .add_edge("memory", END);

    let options = CompileOptions {
        name: options.name.clone().or_else(|| Some("companion".to_string())),
        ..options
    };
    graph.compile(options)
}

/// A chat message as stored in `messages`
pub fn message(role: &str, content: impl Into<String>) -> StateValue {
    StateValue::Map(
        [
            ("role".to_string(), StateValue::from(role)),
            ("content".to_string(), StateValue::from(content.into())),
        ]
        .into_iter()
        .collect(),
    )
}

/// Bodies of every `<tag>...</tag>` pair in `text`, trimmed, in order
pub fn extract_tags(text: &str, tag: &str) -> Vec<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut found = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(&open) {
        let body = &rest[start + open.len()..];
        let Some(end) = body.find(&close) else {
            break;
        };
        found.push(body[..end].trim().to_string());
        rest = &body[end + close.len()..];
    }
    found
}

async fn route(state: WorkflowState, ctx: RunContext) -> Result<PartialState, StepError> {
    let query = state.get_str("query").unwrap_or_default();
    if query.trim().is_empty() {
        return Err("query is required".into());
    }

    let prompt = format!(
        "{ROUTE_HEADER}\n\
         Conversation so far:\n<messages>\n{}\n</messages>\n\
         Query:\n<user_query>\n{query}\n</user_query>\n\
         Reply <route>respond</route> for plain conversation and \
         <route>action</route> when the query needs lookups or processing.\n\
         DO NOT OUTPUT ANYTHING ELSE.",
        conversation(&state)
    );
    let reply = ctx.invoke_model(&prompt).await?;
    let chosen = match extract_tags(&reply, "route").first().map(String::as_str) {
        Some(ACTION) => ACTION,
        _ => RESPOND,
    };
    debug!("Routing query to {chosen}");

    Ok(PartialState::new().with("current_action", chosen))
}

async fn respond(state: WorkflowState, ctx: RunContext) -> Result<PartialState, StepError> {
    let assistant = state.get_str("assistant_name").unwrap_or("Ava");
    let user = state.get_str("user_name").unwrap_or("User");
    let last_seen = state
        .get("last_interaction_at")
        .and_then(StateValue::as_datetime)
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());

    let prompt = format!(
        "You are {assistant}, a companion to {user}.\n\
         Current time: {}\n\
         Last interaction: {last_seen}\n\
         <recentConversation>\n{}\n</recentConversation>\n\
         <memories>\n{}\n</memories>\n\
         <goals>\n{}\n</goals>\n\
         <thoughts>\n{}\n</thoughts>\n\
         {user}: {}",
        Utc::now().to_rfc3339(),
        conversation(&state),
        lines(&state, "memories"),
        lines(&state, "goals"),
        lines(&state, "thoughts"),
        state.get_str("query").unwrap_or_default(),
    );
    let reply = ctx.invoke_model(&prompt).await?;
    Ok(PartialState::new().with("messages", message("assistant", reply)))
}

async fn action(state: WorkflowState, ctx: RunContext) -> Result<PartialState, StepError> {
    let prompt = format!(
        "{ACTION_HEADER}\n\
         Respond to the question directly without repeating it.\n\
         {}",
        state.get_str("query").unwrap_or_default()
    );
    let reply = ctx.invoke_model(&prompt).await?;
    Ok(PartialState::new().with("messages", message("assistant", reply)))
}

async fn memory(state: WorkflowState, ctx: RunContext) -> Result<PartialState, StepError> {
    let existing: String = state
        .get_list("memories")
        .unwrap_or_default()
        .iter()
        .map(|m| format!("<memory>{}</memory>", m.to_text()))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "{MEMORY_HEADER}\n\
         <conversation>\n{}\nuser: {}\n</conversation>\n\
         <existing_memories>\n{existing}\n</existing_memories>\n\
         Return the complete updated set of memories about the user, \
         each wrapped in <memory></memory> tags.\n\
         Keep existing memories that are still accurate.",
        conversation(&state),
        state.get_str("query").unwrap_or_default(),
    );
    let reply = ctx.invoke_model(&prompt).await?;

    let mut update = PartialState::new().with("last_interaction_at", Utc::now());
    let memories = extract_tags(&reply, "memory");
    // a reply without tags leaves the memories untouched
    if !memories.is_empty() {
        update.insert("memories", memories);
    }
    Ok(update)
}

/// `role: content` lines of the message history
fn conversation(state: &WorkflowState) -> String {
    state
        .get_list("messages")
        .unwrap_or_default()
        .iter()
        .map(|m| {
            let role = m.get("role").map(StateValue::to_text).unwrap_or_default();
            let content = m
                .get("content")
                .map(StateValue::to_text)
                .unwrap_or_else(|| m.to_text());
            format!("{role}: {content}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn lines(state: &WorkflowState, field: &str) -> String {
    state
        .get_list(field)
        .unwrap_or_default()
        .iter()
        .map(StateValue::to_text)
        .collect::<Vec<_>>()
        .join("\n")
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::testing::ScriptedModel;
    use super::*;
    use crate::adk::error::GraphError;
    use crate::adk::model::EchoModel;
    use crate::weft::graph::RunConfig;

    #[test]
    fn test_extract_tags() {
        assert_eq!(
            extract_tags("<memory> a </memory>\nnoise<memory>b</memory>", "memory"),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(extract_tags("<memory>unterminated", "memory").is_empty());
        assert!(extract_tags("nothing", "route").is_empty());
    }

    #[test]
    fn test_schema_defaults() {
        let defaults = companion_schema().unwrap().defaults();
        assert_eq!(defaults.get_str("current_action"), Some(RESPOND));
        assert_eq!(defaults.get_str("assistant_name"), Some("Ava"));
        assert_eq!(defaults.get_list("messages"), Some(&[][..]));
        assert!(defaults
            .get("last_interaction_at")
            .and_then(StateValue::as_datetime)
            .is_some());
    }

    #[test]
    fn test_graph_shape() {
        let graph = build_companion_graph(CompileOptions::default()).unwrap();
        assert_eq!(graph.name(), "companion");
        assert_eq!(
            graph.get_graph().nodes,
            vec!["route", "respond", "action", "memory"]
        );
    }

    #[tokio::test]
    async fn test_plain_query_is_answered_by_respond() {
        let graph = build_companion_graph(CompileOptions::default()).unwrap();
        let config = RunConfig::new().with_model(Arc::new(EchoModel::new()));

        let state = graph
            .invoke(Some(PartialState::new().with("query", "hello")), &config)
            .await
            .unwrap()
            .into_state();

        assert_eq!(state.get_str("current_action"), Some(RESPOND));
        assert_eq!(
            state.get_list("messages"),
            Some(&[message("assistant", "User: hello")][..])
        );
        // the echo reply carries no memory tags
        assert_eq!(state.get_list("memories"), Some(&[][..]));
    }

    #[tokio::test]
    async fn test_action_route_and_memories() {
        let graph = build_companion_graph(CompileOptions::default()).unwrap();
        let config = RunConfig::new().with_model(Arc::new(ScriptedModel));

        let state = graph
            .invoke(
                Some(PartialState::new().with("query", "what is the weather in Portland?")),
                &config,
            )
            .await
            .unwrap()
            .into_state();

        assert_eq!(state.get_str("current_action"), Some(ACTION));
        assert_eq!(
            state.get_list("messages"),
            Some(&[message("assistant", "It is sunny.")][..])
        );
        assert_eq!(
            state.get("memories"),
            Some(&StateValue::from(vec!["User is called Ada"]))
        );
    }

    #[tokio::test]
    async fn test_empty_query_fails_in_route() {
        let graph = build_companion_graph(CompileOptions::default()).unwrap();
        let config = RunConfig::new().with_model(Arc::new(EchoModel::new()));

        let err = graph
            .invoke(Some(PartialState::new()), &config)
            .await
            .unwrap_err();
        assert_eq!(err.node(), Some("route"));
        assert!(matches!(err, GraphError::StepFailed { .. }));
    }
}
