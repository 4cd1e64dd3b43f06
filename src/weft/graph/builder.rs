// SPDX-License-Identifier: MIT

//! Graph builder
//!
//! Collects nodes and edges, then validates them into an immutable
//! [`CompiledGraph`]. Registration never fails; every structural problem is
//! reported by [`StateGraph::compile`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use log::debug;

use crate::adk::error::{StepError, ValidationError};
use crate::weft::state::{PartialState, StateSchema, WorkflowState};

use super::compiled::{CompiledGraph, ConditionalEdge, GraphInner, JoinEdge};
use super::node::{FnStep, NodeSpec, Step};
use super::types::{CompileOptions, NodeOptions, Route, RunContext, END, START};

/// Mutable graph definition over one state schema
#[derive(Clone)]
pub struct StateGraph {
    schema: Arc<StateSchema>,
    nodes: Vec<NodeSpec>,
    edges: Vec<(String, String)>,
    routers: Vec<ConditionalEdge>,
    joins: Vec<JoinEdge>,
}

impl StateGraph {
    pub fn new(schema: StateSchema) -> Self {
        Self {
            schema: Arc::new(schema),
            nodes: Vec::new(),
            edges: Vec::new(),
            routers: Vec::new(),
            joins: Vec::new(),
        }
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn add_node(&mut self, name: impl Into<String>, step: Arc<dyn Step>) -> &mut Self {
        self.add_node_with(name, step, NodeOptions::default())
    }

    pub fn add_node_with(
        &mut self,
        name: impl Into<String>,
        step: Arc<dyn Step>,
        options: NodeOptions,
    ) -> &mut Self {
        self.nodes.push(NodeSpec {
            name: name.into(),
            step,
            options,
        });
        self
    }

    /// Register an async closure as a node
    pub fn add_node_fn<F, Fut>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(WorkflowState, RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PartialState, StepError>> + Send + 'static,
    {
        self.add_node(name, Arc::new(FnStep(f)))
    }

    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    /// Route from `from` by evaluating `router` on the merged state and
    /// looking each returned key up in `path_map`.
    pub fn add_conditional_edges<F, R, I, K, V>(
        &mut self,
        from: impl Into<String>,
        router: F,
        path_map: I,
    ) -> &mut Self
    where
        F: Fn(&WorkflowState) -> R + Send + Sync + 'static,
        R: Into<Route>,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.routers.push(ConditionalEdge {
            from: from.into(),
            router: Arc::new(move |state: &WorkflowState| router(state).into()),
            path_map: path_map
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        });
        self
    }

    /// Conditional edge whose router returns node names directly
    pub fn add_router<F, R, I, S>(&mut self, from: impl Into<String>, router: F, targets: I) -> &mut Self
    where
        F: Fn(&WorkflowState) -> R + Send + Sync + 'static,
        R: Into<Route>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path_map: Vec<(String, String)> = targets
            .into_iter()
            .map(|t| {
                let t = t.into();
                (t.clone(), t)
            })
            .collect();
        self.add_conditional_edges(from, router, path_map)
    }

    /// Schedule `target` once every source has completed
    pub fn add_join_edge<I, S>(&mut self, sources: I, target: impl Into<String>) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.joins.push(JoinEdge {
            sources: sources.into_iter().map(Into::into).collect(),
            target: target.into(),
        });
        self
    }

    pub fn set_entry_point(&mut self, node: impl Into<String>) -> &mut Self {
        self.add_edge(START, node)
    }

    pub fn set_finish_point(&mut self, node: impl Into<String>) -> &mut Self {
        self.add_edge(node, END)
    }

    /// Validate and freeze a copy of this graph.
    ///
    /// The builder stays usable; later changes do not reach graphs already
    /// compiled from it.
    pub fn compile(&self, options: CompileOptions) -> Result<CompiledGraph, ValidationError> {
        self.validate(&options)?;

        let mut edges: HashMap<String, Vec<String>> = HashMap::new();
        for (from, to) in &self.edges {
            let targets = edges.entry(from.clone()).or_default();
            if !targets.contains(to) {
                targets.push(to.clone());
            }
        }

        let inner = GraphInner {
            name: options.name.unwrap_or_else(|| "graph".to_string()),
            schema: self.schema.clone(),
            node_order: self.nodes.iter().map(|n| n.name.clone()).collect(),
            nodes: self
                .nodes
                .iter()
                .map(|n| (n.name.clone(), n.clone()))
                .collect(),
            edges,
            routers: self
                .routers
                .iter()
                .map(|r| (r.from.clone(), r.clone()))
                .collect(),
            joins: self.joins.clone(),
            checkpointer: options.checkpointer,
            interrupt_before: options.interrupt_before.into_iter().collect(),
            max_concurrency: options.max_concurrency.unwrap_or(usize::MAX).max(1),
        };
        debug!(
            "Compiled graph '{}' with {} nodes",
            inner.name,
            inner.node_order.len()
        );
        Ok(CompiledGraph::new(inner))
    }

    fn validate(&self, options: &CompileOptions) -> Result<(), ValidationError> {
        let mut names: HashSet<&str> = HashSet::new();
        for node in &self.nodes {
            if node.name == START || node.name == END || node.name.is_empty() {
                return Err(ValidationError::ReservedName(node.name.clone()));
            }
            if !names.insert(node.name.as_str()) {
                return Err(ValidationError::DuplicateNode(node.name.clone()));
            }
        }
        let known = |name: &str| names.contains(name);

        for (from, to) in &self.edges {
            if from == END {
                return Err(invalid_edge(from, to, "END cannot be a source"));
            }
            if to == START {
                return Err(invalid_edge(from, to, "START cannot be a target"));
            }
            if from != START && !known(from) {
                return Err(ValidationError::UnknownNode(from.clone()));
            }
            if to != END && !known(to) {
                return Err(ValidationError::UnknownNode(to.clone()));
            }
        }

        let mut routed: HashSet<&str> = HashSet::new();
        for edge in &self.routers {
            if edge.from == END {
                return Err(invalid_edge(&edge.from, "", "END cannot be a source"));
            }
            if edge.from != START && !known(&edge.from) {
                return Err(ValidationError::UnknownNode(edge.from.clone()));
            }
            if !routed.insert(edge.from.as_str()) {
                return Err(ValidationError::DuplicateRouter(edge.from.clone()));
            }
            if edge.path_map.is_empty() {
                return Err(invalid_edge(&edge.from, "", "conditional edge has no targets"));
            }
            for target in edge.path_map.values() {
                if target != END && !known(target) {
                    return Err(ValidationError::UnknownRouteTarget {
                        from: edge.from.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        for join in &self.joins {
            if join.sources.is_empty() {
                return Err(invalid_edge("", &join.target, "join edge has no sources"));
            }
            for source in &join.sources {
                if !known(source) {
                    return Err(ValidationError::UnknownNode(source.clone()));
                }
            }
            if !known(&join.target) {
                return Err(ValidationError::UnknownNode(join.target.clone()));
            }
        }

        let has_entry = self.edges.iter().any(|(from, _)| from == START)
            || self.routers.iter().any(|r| r.from == START);
        if !has_entry {
            return Err(ValidationError::NoEntryPoint);
        }

        let reachable = self.reachable();
        let unreachable: Vec<String> = self
            .nodes
            .iter()
            .filter(|n| !reachable.contains(n.name.as_str()))
            .map(|n| n.name.clone())
            .collect();
        if !unreachable.is_empty() {
            return Err(ValidationError::Unreachable(unreachable));
        }

        for node in &self.nodes {
            let name = node.name.as_str();
            let has_exit = self.edges.iter().any(|(from, _)| from == name)
                || routed.contains(name)
                || self.joins.iter().any(|j| j.sources.iter().any(|s| s == name));
            if !has_exit {
                return Err(ValidationError::DeadEnd(node.name.clone()));
            }
        }

        for node in &options.interrupt_before {
            if !known(node) {
                return Err(ValidationError::UnknownInterrupt(node.clone()));
            }
        }
        if !options.interrupt_before.is_empty() && options.checkpointer.is_none() {
            return Err(ValidationError::InterruptWithoutCheckpointer);
        }

        Ok(())
    }

    /// Nodes reachable from START, treating every path-map target as taken
    /// and a join target as reached once all of its sources are.
    fn reachable(&self) -> HashSet<&str> {
        let mut successors: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (from, to) in &self.edges {
            successors.entry(from.as_str()).or_default().push(to.as_str());
        }
        for edge in &self.routers {
            successors
                .entry(edge.from.as_str())
                .or_default()
                .extend(edge.path_map.values().map(String::as_str));
        }

        let mut reached: HashSet<&str> = HashSet::from([START]);
        let mut queue: Vec<&str> = vec![START];
        loop {
            while let Some(current) = queue.pop() {
                for &next in successors.get(current).into_iter().flatten() {
                    if reached.insert(next) {
                        queue.push(next);
                    }
                }
            }
            // joins can only fire after a full pass over plain edges
            for join in &self.joins {
                if !reached.contains(join.target.as_str())
                    && join.sources.iter().all(|s| reached.contains(s.as_str()))
                {
                    reached.insert(join.target.as_str());
                    queue.push(join.target.as_str());
                }
            }
            if queue.is_empty() {
                return reached;
            }
        }
    }
}

fn invalid_edge(from: &str, to: &str, reason: &'static str) -> ValidationError {
    ValidationError::InvalidEdge {
        from: from.to_string(),
        to: to.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weft::checkpoint::InMemoryCheckpointer;
    use crate::weft::state::{FieldDef, FieldType};

    fn schema() -> StateSchema {
        StateSchema::builder()
            .field("query", FieldDef::overwrite(FieldType::String))
            .field("log", FieldDef::append())
            .build()
            .unwrap()
    }

    fn graph_with(names: &[&str]) -> StateGraph {
        let mut graph = StateGraph::new(schema());
        for name in names {
            let label = name.to_string();
            graph.add_node_fn(*name, move |_state, _ctx| {
                let label = label.clone();
                async move { Ok(PartialState::new().with("log", label)) }
            });
        }
        graph
    }

    #[test]
    fn test_linear_graph_compiles() {
        let mut graph = graph_with(&["a", "b"]);
        graph.set_entry_point("a").add_edge("a", "b").set_finish_point("b");
        assert!(graph.compile(CompileOptions::default()).is_ok());
    }

    #[test]
    fn test_missing_entry_point() {
        let mut graph = graph_with(&["a"]);
        graph.set_finish_point("a");
        assert!(matches!(
            graph.compile(CompileOptions::default()),
            Err(ValidationError::NoEntryPoint)
        ));
    }

    #[test]
    fn test_reserved_and_duplicate_names() {
        let mut graph = graph_with(&[START]);
        graph.set_entry_point(START);
        assert!(matches!(
            graph.compile(CompileOptions::default()),
            Err(ValidationError::ReservedName(_))
        ));

        let mut graph = graph_with(&["a", "a"]);
        graph.set_entry_point("a").set_finish_point("a");
        assert_eq!(
            graph.compile(CompileOptions::default()).err(),
            Some(ValidationError::DuplicateNode("a".to_string()))
        );
    }

    #[test]
    fn test_edge_to_unknown_node() {
        let mut graph = graph_with(&["a"]);
        graph.set_entry_point("a").add_edge("a", "ghost");
        assert_eq!(
            graph.compile(CompileOptions::default()).err(),
            Some(ValidationError::UnknownNode("ghost".to_string()))
        );
    }

    #[test]
    fn test_end_cannot_be_source() {
        let mut graph = graph_with(&["a"]);
        graph.set_entry_point("a").set_finish_point("a").add_edge(END, "a");
        assert!(matches!(
            graph.compile(CompileOptions::default()),
            Err(ValidationError::InvalidEdge { .. })
        ));
    }

    #[test]
    fn test_unreachable_node_rejected() {
        let mut graph = graph_with(&["a", "orphan"]);
        graph
            .set_entry_point("a")
            .set_finish_point("a")
            .set_finish_point("orphan");
        assert_eq!(
            graph.compile(CompileOptions::default()).err(),
            Some(ValidationError::Unreachable(vec!["orphan".to_string()]))
        );
    }

    #[test]
    fn test_dead_end_rejected() {
        let mut graph = graph_with(&["a", "b"]);
        graph.set_entry_point("a").add_edge("a", "b");
        assert_eq!(
            graph.compile(CompileOptions::default()).err(),
            Some(ValidationError::DeadEnd("b".to_string()))
        );
    }

    #[test]
    fn test_dangling_route_target_rejected() {
        let mut graph = graph_with(&["a", "b"]);
        graph
            .set_entry_point("a")
            .add_conditional_edges("a", |_s: &WorkflowState| "go", [("go", "b"), ("stop", "nowhere")])
            .set_finish_point("b");
        assert_eq!(
            graph.compile(CompileOptions::default()).err(),
            Some(ValidationError::UnknownRouteTarget {
                from: "a".to_string(),
                target: "nowhere".to_string()
            })
        );
    }

    #[test]
    fn test_second_router_rejected() {
        let mut graph = graph_with(&["a", "b"]);
        graph
            .set_entry_point("a")
            .add_router("a", |_s: &WorkflowState| "b", ["b"])
            .add_router("a", |_s: &WorkflowState| END, [END])
            .set_finish_point("b");
        assert_eq!(
            graph.compile(CompileOptions::default()).err(),
            Some(ValidationError::DuplicateRouter("a".to_string()))
        );
    }

    #[test]
    fn test_join_target_reachable_only_through_all_sources() {
        let mut graph = graph_with(&["a", "b", "c", "join"]);
        graph
            .add_router(START, |_s: &WorkflowState| vec!["a", "b"], ["a", "b"])
            .add_join_edge(["a", "b"], "join")
            .add_join_edge(["join", "c"], "c")
            .set_finish_point("join");
        // c waits on itself and is never reached
        assert_eq!(
            graph.compile(CompileOptions::default()).err(),
            Some(ValidationError::Unreachable(vec!["c".to_string()]))
        );
    }

    #[test]
    fn test_interrupts_need_known_nodes_and_checkpointer() {
        let mut graph = graph_with(&["a"]);
        graph.set_entry_point("a").set_finish_point("a");

        assert_eq!(
            graph
                .compile(CompileOptions::default().interrupt_before(["zzz"]))
                .err(),
            Some(ValidationError::UnknownInterrupt("zzz".to_string()))
        );
        assert_eq!(
            graph
                .compile(CompileOptions::default().interrupt_before(["a"]))
                .err(),
            Some(ValidationError::InterruptWithoutCheckpointer)
        );
        assert!(graph
            .compile(
                CompileOptions::default()
                    .interrupt_before(["a"])
                    .with_checkpointer(Arc::new(InMemoryCheckpointer::new()))
            )
            .is_ok());
    }

    #[test]
    fn test_compile_copies_builder() {
        let mut graph = graph_with(&["a"]);
        graph.set_entry_point("a").set_finish_point("a");
        let compiled = graph.compile(CompileOptions::default()).unwrap();

        graph.add_node_fn("late", |_s, _c| async { Ok(PartialState::new()) });
        assert_eq!(compiled.get_graph().nodes, vec!["a".to_string()]);
    }
}
