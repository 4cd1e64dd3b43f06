// SPDX-License-Identifier: MIT

//! Compiled, immutable graphs

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;

use crate::weft::checkpoint::Checkpointer;
use crate::weft::state::StateSchema;

use super::node::NodeSpec;
use super::types::{RouterFn, END, START};

#[derive(Clone)]
pub(crate) struct ConditionalEdge {
    pub from: String,
    pub router: RouterFn,
    /// Router key -> node name or END
    pub path_map: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub(crate) struct JoinEdge {
    pub sources: Vec<String>,
    pub target: String,
}

pub(crate) struct GraphInner {
    pub name: String,
    pub schema: Arc<StateSchema>,
    pub nodes: HashMap<String, NodeSpec>,
    /// Registration order
    pub node_order: Vec<String>,
    /// Static edges, targets in registration order
    pub edges: HashMap<String, Vec<String>>,
    pub routers: HashMap<String, ConditionalEdge>,
    pub joins: Vec<JoinEdge>,
    pub checkpointer: Option<Arc<dyn Checkpointer>>,
    pub interrupt_before: HashSet<String>,
    pub max_concurrency: usize,
}

/// A validated graph, ready to run. Cloning is cheap.
#[derive(Clone)]
pub struct CompiledGraph {
    pub(crate) inner: Arc<GraphInner>,
}

/// Read-only description of a compiled graph's structure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphView {
    pub name: String,
    pub nodes: Vec<String>,
    pub edges: Vec<EdgeView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeView {
    pub from: String,
    pub to: String,
    /// Router key when the edge is conditional
    pub label: Option<String>,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Static,
    Conditional,
    Join,
}

impl std::fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("name", &self.inner.name)
            .field("nodes", &self.inner.node_order)
            .field("checkpointer", &self.inner.checkpointer.is_some())
            .finish()
    }
}

impl CompiledGraph {
    pub(crate) fn new(inner: GraphInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn schema(&self) -> &StateSchema {
        &self.inner.schema
    }

    pub fn checkpointer(&self) -> Option<&Arc<dyn Checkpointer>> {
        self.inner.checkpointer.as_ref()
    }

    /// Describe nodes and edges, in registration order
    pub fn get_graph(&self) -> GraphView {
        let inner = &self.inner;
        let sources = std::iter::once(START.to_string()).chain(inner.node_order.iter().cloned());

        let mut edges = Vec::new();
        for from in sources {
            for to in inner.edges.get(&from).into_iter().flatten() {
                edges.push(EdgeView {
                    from: from.clone(),
                    to: to.clone(),
                    label: None,
                    kind: EdgeKind::Static,
                });
            }
            if let Some(router) = inner.routers.get(&from) {
                for (key, to) in &router.path_map {
                    edges.push(EdgeView {
                        from: from.clone(),
                        to: to.clone(),
                        label: Some(key.clone()),
                        kind: EdgeKind::Conditional,
                    });
                }
            }
        }
        for join in &inner.joins {
            for source in &join.sources {
                edges.push(EdgeView {
                    from: source.clone(),
                    to: join.target.clone(),
                    label: None,
                    kind: EdgeKind::Join,
                });
            }
        }

        GraphView {
            name: inner.name.clone(),
            nodes: inner.node_order.clone(),
            edges,
        }
    }
}

impl GraphView {
    /// Render as a Mermaid flowchart
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");
        let id = |name: &str| match name {
            START => "__start__((start))".to_string(),
            END => "__end__((end))".to_string(),
            other => other.to_string(),
        };
        for edge in &self.edges {
            let arrow = match (edge.kind, &edge.label) {
                (EdgeKind::Static, _) => "-->".to_string(),
                (EdgeKind::Conditional, Some(label)) if label != &edge.to => {
                    format!("-.->|{label}|")
                }
                (EdgeKind::Conditional, _) => "-.->".to_string(),
                (EdgeKind::Join, _) => "==>".to_string(),
            };
            let _ = writeln!(out, "    {} {} {}", id(&edge.from), arrow, id(&edge.to));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use crate::weft::graph::{CompileOptions, StateGraph, END, START};
    use crate::weft::state::{PartialState, StateSchema, WorkflowState};

    #[test]
    fn test_get_graph_and_mermaid() {
        let mut graph = StateGraph::new(StateSchema::default());
        graph
            .add_node_fn("route", |_s, _c| async { Ok(PartialState::new()) })
            .add_node_fn("respond", |_s, _c| async { Ok(PartialState::new()) })
            .set_entry_point("route")
            .add_conditional_edges(
                "route",
                |_s: &WorkflowState| "chat",
                [("chat", "respond"), ("done", END)],
            )
            .set_finish_point("respond");

        let compiled = graph
            .compile(CompileOptions::default().with_name("demo"))
            .unwrap();
        assert_eq!(
            format!("{compiled:?}"),
            r#"CompiledGraph { name: "demo", nodes: ["route", "respond"], checkpointer: false }"#
        );
        let view = compiled.get_graph();
        assert_eq!(view.name, "demo");
        assert_eq!(view.nodes, vec!["route".to_string(), "respond".to_string()]);
        assert_eq!(view.edges[0].from, START);
        assert_eq!(view.edges.len(), 4);

        let mermaid = view.to_mermaid();
        assert!(mermaid.starts_with("graph TD\n"));
        assert!(mermaid.contains("route -.->|chat| respond"));
        assert!(mermaid.contains("respond --> __end__((end))"));
    }
}
