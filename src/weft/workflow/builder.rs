// SPDX-License-Identifier: MIT

//! Workflow builder - turns YAML definitions into compiled graphs

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;

use crate::adk::error::{ValidationError, WeftError};
use crate::weft::condition::{self, Expression};
use crate::weft::graph::{
    CompileOptions, CompiledGraph, NodeOptions, Route, RunConfig, StateGraph, Step,
    DEFAULT_RECURSION_LIMIT, END, START,
};
use crate::weft::state::{
    FieldDef, FieldType, PartialState, ReducerType, StateSchema, StateValue, WorkflowState,
};

use super::loader::WorkflowLoader;
use super::registry::StepRegistry;
use super::steps::{PromptStep, SetStep};
use super::types::{NodeDefinition, RouteDefinition, StateFieldDef, WorkflowDefinition};

/// A compiled workflow together with its run settings
#[derive(Debug, Clone)]
pub struct Workflow {
    pub name: String,
    pub description: String,
    pub graph: CompiledGraph,
    pub recursion_limit: usize,
}

impl Workflow {
    /// Run settings declared by the workflow file
    pub fn run_config(&self) -> RunConfig {
        RunConfig::new().with_recursion_limit(self.recursion_limit)
    }
}

/// Builds [`Workflow`]s from YAML definitions, resolving `step:` nodes
/// against a [`StepRegistry`]
pub struct WorkflowBuilder {
    loader: WorkflowLoader,
    registry: StepRegistry,
}

impl WorkflowBuilder {
    pub fn new(registry: StepRegistry) -> Self {
        Self {
            loader: WorkflowLoader::new(),
            registry,
        }
    }

    /// Load and build a workflow file
    pub async fn build_file<P: AsRef<Path>>(
        &self,
        path: P,
        options: CompileOptions,
    ) -> Result<Workflow, WeftError> {
        let def = self.loader.load_workflow(path)?;
        Ok(self.build(&def, options).await?)
    }

    /// Build a parsed definition. `options` supplies the checkpointer; the
    /// definition's interrupts, name and concurrency are applied on top.
    pub async fn build(
        &self,
        def: &WorkflowDefinition,
        mut options: CompileOptions,
    ) -> Result<Workflow, ValidationError> {
        let schema = build_schema(def)?;
        let mut graph = StateGraph::new(schema);

        for node in &def.nodes {
            let step = self.build_step(node, graph.schema()).await?;
            let mut node_options = NodeOptions::default();
            for (key, value) in &node.metadata {
                node_options = node_options.with_metadata(key.clone(), value.clone());
            }
            graph.add_node_with(node.id.clone(), step, node_options);
        }

        for edge in &def.edges {
            graph.add_edge(endpoint(&edge.from), endpoint(&edge.to));
        }
        for route in &def.routes {
            add_route(&mut graph, route)?;
        }
        for join in &def.joins {
            graph.add_join_edge(join.sources.iter().cloned(), join.target.clone());
        }

        if !def.interrupt_before.is_empty() {
            options = options.interrupt_before(def.interrupt_before.iter().cloned());
        }
        if options.name.is_none() {
            options.name = Some(def.name.clone());
        }
        if options.max_concurrency.is_none() {
            options.max_concurrency = def.max_concurrency;
        }

        let compiled = graph.compile(options)?;
        info!(
            "Built workflow '{}' with {} nodes",
            def.name,
            def.nodes.len()
        );

        Ok(Workflow {
            name: def.name.clone(),
            description: def.description.clone(),
            graph: compiled,
            recursion_limit: def.recursion_limit.unwrap_or(DEFAULT_RECURSION_LIMIT),
        })
    }

    async fn build_step(
        &self,
        node: &NodeDefinition,
        schema: &StateSchema,
    ) -> Result<Arc<dyn Step>, ValidationError> {
        match (&node.step, &node.prompt, &node.set) {
            (Some(name), None, None) => self
                .registry
                .get(name)
                .await
                .ok_or_else(|| ValidationError::UnknownStep(name.clone())),
            (None, Some(template), None) => {
                let output = node
                    .output
                    .as_ref()
                    .ok_or_else(|| invalid_node(node, "prompt node needs an output field"))?;
                if !schema.contains(output) {
                    return Err(invalid_node(
                        node,
                        format!("output field '{output}' is not declared"),
                    ));
                }
                Ok(Arc::new(PromptStep::new(template.clone(), output.clone())))
            }
            (None, None, Some(values)) => {
                if let Some(field) = values.keys().find(|k| !schema.contains(k)) {
                    return Err(invalid_node(
                        node,
                        format!("sets undeclared field '{field}'"),
                    ));
                }
                let partial: PartialState = values
                    .iter()
                    .map(|(k, v)| (k.clone(), StateValue::from(v.clone())))
                    .collect();
                Ok(Arc::new(SetStep::new(partial)))
            }
            _ => Err(invalid_node(
                node,
                "exactly one of step, prompt or set is required",
            )),
        }
    }
}

/// Translate the `state:` block into a schema
pub fn build_schema(def: &WorkflowDefinition) -> Result<StateSchema, ValidationError> {
    let mut builder = StateSchema::builder();
    for (name, field) in &def.state {
        builder = builder.field(name.clone(), field_def(name, field)?);
    }
    builder.build()
}

fn field_def(name: &str, def: &StateFieldDef) -> Result<FieldDef, ValidationError> {
    let field_type: FieldType =
        def.field_type
            .parse()
            .map_err(|_| ValidationError::UnknownFieldType {
                field: name.to_string(),
                field_type: def.field_type.clone(),
            })?;
    let reducer: ReducerType = match &def.reducer {
        Some(reducer) => reducer
            .parse()
            .map_err(|_| ValidationError::UnknownReducer {
                field: name.to_string(),
                reducer: reducer.clone(),
            })?,
        None => ReducerType::Overwrite,
    };

    let field = FieldDef::new(field_type, reducer);
    Ok(match &def.default {
        None => field,
        Some(serde_json::Value::String(text)) if matches!(field_type, FieldType::DateTime) => {
            if text == "now" {
                field.default_now()
            } else {
                match DateTime::parse_from_rfc3339(text) {
                    Ok(at) => field.with_default(at.with_timezone(&Utc)),
                    Err(_) => field.with_default(text.as_str()),
                }
            }
        }
        Some(value) => field.with_default(value.clone()),
    })
}

fn add_route(graph: &mut StateGraph, route: &RouteDefinition) -> Result<(), ValidationError> {
    let branches: Vec<(Expression, String)> = route
        .branches
        .iter()
        .map(|b| -> Result<_, ValidationError> {
            Ok((condition::parse(&b.when)?, endpoint(&b.to)))
        })
        .collect::<Result<_, _>>()?;
    let fallback = route
        .default
        .as_deref()
        .map(endpoint)
        .unwrap_or_else(|| END.to_string());

    let mut targets: Vec<String> = branches.iter().map(|(_, to)| to.clone()).collect();
    targets.push(fallback.clone());

    let fan_out = route.fan_out;
    graph.add_router(
        endpoint(&route.from),
        move |state: &WorkflowState| {
            let mut hits: Vec<String> = Vec::new();
            for (expr, to) in &branches {
                if !condition::evaluate(expr, state) {
                    continue;
                }
                if !fan_out {
                    return Route::One(to.clone());
                }
                if !hits.contains(to) {
                    hits.push(to.clone());
                }
            }
            if hits.is_empty() {
                Route::One(fallback.clone())
            } else {
                Route::Many(hits)
            }
        },
        targets,
    );
    Ok(())
}

/// Map the `START`/`END` keywords of workflow files to the graph markers
fn endpoint(name: &str) -> String {
    match name {
        "START" => START.to_string(),
        "END" => END.to_string(),
        other => other.to_string(),
    }
}

fn invalid_node(node: &NodeDefinition, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidNode {
        node: node.id.clone(),
        reason: reason.into(),
    }
}
