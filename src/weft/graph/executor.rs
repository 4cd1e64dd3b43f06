// SPDX-License-Identifier: MIT

//! Graph executor
//!
//! Runs a compiled graph in supersteps. Every node of the frontier sees the
//! same snapshot; their partials are merged in frontier order once all of
//! them have finished, and the next frontier is computed from the merged
//! state. A checkpoint is written after the input is merged and after every
//! superstep.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use log::{debug, error, info};

use crate::adk::error::{CheckpointError, GraphError, StepError};
use crate::weft::checkpoint::{
    Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointSource, Checkpointer,
};
use crate::weft::state::{PartialState, WorkflowState};

use super::compiled::{CompiledGraph, GraphInner};
use super::interrupt::{Interrupted, RunOutcome};
use super::types::{RunConfig, RunContext, StreamEvent, END, START};

enum Phase {
    Start(Option<PartialState>),
    Running,
    Done,
}

/// Result of advancing a run by one unit of work
pub(crate) enum Progress {
    Events(Vec<StreamEvent>),
    Finished(RunOutcome),
}

/// One in-flight invocation
pub(crate) struct Run {
    graph: Arc<GraphInner>,
    config: RunConfig,
    phase: Phase,
    state: WorkflowState,
    frontier: Vec<String>,
    pending_joins: BTreeMap<String, BTreeSet<String>>,
    /// Most recent checkpoint written or loaded by this run
    last: Option<Checkpoint>,
    /// Step number of the thread's latest state; -1 before the first input
    step: i64,
    supersteps: usize,
    skip_interrupt: bool,
}

impl Run {
    pub(crate) fn new(graph: Arc<GraphInner>, input: Option<PartialState>, config: RunConfig) -> Self {
        Self {
            graph,
            config,
            phase: Phase::Start(input),
            state: WorkflowState::new(),
            frontier: Vec::new(),
            pending_joins: BTreeMap::new(),
            last: None,
            step: -1,
            supersteps: 0,
            skip_interrupt: false,
        }
    }

    pub(crate) async fn advance(&mut self) -> Result<Progress, GraphError> {
        match std::mem::replace(&mut self.phase, Phase::Running) {
            Phase::Start(input) => self.start(input).await,
            Phase::Running => self.superstep().await,
            Phase::Done => {
                self.phase = Phase::Done;
                Ok(Progress::Finished(RunOutcome::Completed(self.state.clone())))
            }
        }
    }

    /// Checkpointer and address for this run, if persistence is enabled
    fn saver(&self) -> Result<Option<(Arc<dyn Checkpointer>, CheckpointConfig)>, GraphError> {
        match (&self.graph.checkpointer, self.config.checkpoint_config()) {
            (Some(saver), Some(address)) => Ok(Some((saver.clone(), address))),
            (Some(_), None) => Err(GraphError::MissingThread),
            (None, _) => Ok(None),
        }
    }

    async fn start(&mut self, input: Option<PartialState>) -> Result<Progress, GraphError> {
        let saver = self.saver()?;
        let saved = match &saver {
            Some((checkpointer, address)) => {
                let tuple = checkpointer.get_tuple(address).await?;
                if let (None, Some(id)) = (&tuple, &address.checkpoint_id) {
                    return Err(CheckpointError::NotFound {
                        thread_id: address.thread_id.clone(),
                        checkpoint_id: id.clone(),
                    }
                    .into());
                }
                tuple.map(|t| t.checkpoint)
            }
            None => None,
        };

        match (input, saved) {
            (None, Some(checkpoint)) => {
                info!(
                    "Resuming thread {:?} at {:?}",
                    self.config.thread_id, checkpoint.next
                );
                self.state = checkpoint.values.clone();
                self.frontier = checkpoint.next.clone();
                self.pending_joins = checkpoint.pending_joins.clone();
                self.step = checkpoint.step;
                self.last = Some(checkpoint);
                self.skip_interrupt = true;
                if self.frontier.is_empty() {
                    return Ok(self.finish());
                }
                Ok(Progress::Events(Vec::new()))
            }
            (input, saved) => {
                let input = input.unwrap_or_default();
                let base = saved
                    .as_ref()
                    .map(|cp| cp.values.clone())
                    .unwrap_or_else(|| self.graph.schema.defaults());
                self.state = base
                    .merge(&self.graph.schema, &input)
                    .map_err(GraphError::InvalidInput)?;
                self.pending_joins.clear();
                self.frontier = self.successors(&[START.to_string()])?;
                self.step = saved.as_ref().map(|cp| cp.step + 1).unwrap_or(-1);
                self.last = saved;

                let writes = BTreeMap::from([(START.to_string(), input)]);
                self.save(CheckpointSource::Input, writes).await?;
                Ok(Progress::Events(Vec::new()))
            }
        }
    }

    async fn superstep(&mut self) -> Result<Progress, GraphError> {
        if self.frontier.is_empty() {
            return Ok(self.finish());
        }

        if !self.skip_interrupt {
            if let Some(node) = self
                .frontier
                .iter()
                .find(|n| self.graph.interrupt_before.contains(*n))
            {
                info!("Interrupting before node {}", node);
                return self.pause();
            }
        }
        self.skip_interrupt = false;

        if self.supersteps >= self.config.recursion_limit {
            error!(
                "Recursion limit {} reached with {:?} still pending",
                self.config.recursion_limit, self.frontier
            );
            return Err(GraphError::RecursionLimit {
                limit: self.config.recursion_limit,
            });
        }
        self.supersteps += 1;

        self.step += 1;
        let step = self.step;
        info!("Superstep {}: executing {:?}", step, self.frontier);

        let snapshot = Arc::new(self.state.clone());
        let graph = self.graph.clone();
        let config = &self.config;
        let outputs: Vec<(String, PartialState)> = stream::iter(self.frontier.clone())
            .map(|name| {
                let snapshot = snapshot.clone();
                let graph = graph.clone();
                async move {
                    let Some(node) = graph.nodes.get(&name) else {
                        return Err((name, StepError::from("node is not registered")));
                    };
                    let ctx = RunContext::for_node(config, &name, step, &node.options);
                    match node.step.run(&snapshot, &ctx).await {
                        Ok(partial) => Ok((name, partial)),
                        Err(e) => Err((name, e)),
                    }
                }
            })
            .buffered(self.graph.max_concurrency)
            .try_collect()
            .await
            .map_err(|(node, source)| self.step_failed(node, source))?;

        let mut merged = self.state.clone();
        for (node, partial) in &outputs {
            merged = merged
                .merge(&self.graph.schema, partial)
                .map_err(|e| self.step_failed(node.clone(), Box::new(e)))?;
        }
        self.state = merged;

        let completed: Vec<String> = outputs.iter().map(|(n, _)| n.clone()).collect();
        self.frontier = self.successors(&completed)?;

        let events = outputs
            .iter()
            .map(|(node, update)| StreamEvent::Update {
                node: node.clone(),
                update: update.clone(),
            })
            .collect();
        self.save(CheckpointSource::Loop, outputs.into_iter().collect())
            .await?;
        Ok(Progress::Events(events))
    }

    fn step_failed(&self, node: String, source: StepError) -> GraphError {
        error!("Node {} failed: {}", node, source);
        GraphError::StepFailed {
            node,
            source,
            state: Box::new(self.state.clone()),
        }
    }

    /// Next frontier after `completed` ran: static edges, then the router,
    /// then any join whose sources are now all complete. Deduplicated, END
    /// dropped.
    fn successors(&mut self, completed: &[String]) -> Result<Vec<String>, GraphError> {
        let mut next: Vec<String> = Vec::new();
        let push = |target: &String, next: &mut Vec<String>| {
            if target != END && !next.contains(target) {
                next.push(target.clone());
            }
        };

        for node in completed {
            for target in self.graph.edges.get(node).into_iter().flatten() {
                push(target, &mut next);
            }
            if let Some(edge) = self.graph.routers.get(node) {
                for key in (edge.router)(&self.state).into_keys() {
                    let target = edge.path_map.get(&key).ok_or_else(|| {
                        error!("Router on {} returned unknown key {}", node, key);
                        GraphError::InvalidRoute {
                            node: node.clone(),
                            target: key.clone(),
                        }
                    })?;
                    push(target, &mut next);
                }
            }
            for join in &self.graph.joins {
                if !join.sources.contains(node) {
                    continue;
                }
                let done = self.pending_joins.entry(join.target.clone()).or_default();
                done.insert(node.clone());
                if join.sources.iter().all(|s| done.contains(s)) {
                    self.pending_joins.remove(&join.target);
                    push(&join.target, &mut next);
                }
            }
        }
        Ok(next)
    }

    async fn save(
        &mut self,
        source: CheckpointSource,
        writes: BTreeMap<String, PartialState>,
    ) -> Result<(), GraphError> {
        let Some((checkpointer, address)) = self.saver()? else {
            return Ok(());
        };
        let mut checkpoint = Checkpoint::child_of(self.last.as_ref(), self.state.clone());
        checkpoint.step = self.step;
        checkpoint.next = self.frontier.clone();
        checkpoint.pending_joins = self.pending_joins.clone();
        let metadata = CheckpointMetadata {
            source,
            step: checkpoint.step,
            writes,
            extra: self.config.metadata.clone(),
        };
        let thread = CheckpointConfig::latest(address.thread_id);
        checkpointer
            .put(&thread, checkpoint.clone(), metadata)
            .await?;
        debug!(
            "Saved checkpoint {} (step {}) for thread {}",
            checkpoint.id, checkpoint.step, thread.thread_id
        );
        self.last = Some(checkpoint);
        Ok(())
    }

    fn pause(&mut self) -> Result<Progress, GraphError> {
        let (Some(thread_id), Some(checkpoint)) = (&self.config.thread_id, &self.last) else {
            return Err(GraphError::MissingThread);
        };
        self.phase = Phase::Done;
        Ok(Progress::Finished(RunOutcome::Paused(Interrupted {
            next: self.frontier.clone(),
            state: self.state.clone(),
            config: CheckpointConfig::at(thread_id, checkpoint.id.clone()),
        })))
    }

    fn finish(&mut self) -> Progress {
        info!("Run finished after {} supersteps", self.supersteps);
        self.phase = Phase::Done;
        Progress::Finished(RunOutcome::Completed(self.state.clone()))
    }
}

impl CompiledGraph {
    /// Run the graph to completion or to an interrupt.
    ///
    /// `Some(input)` starts a new run at START on top of the thread's latest
    /// state (or the schema defaults). `None` resumes whatever the latest
    /// checkpoint left pending, running the blocked node without
    /// re-checking the interrupt.
    pub async fn invoke(
        &self,
        input: Option<PartialState>,
        config: &RunConfig,
    ) -> Result<RunOutcome, GraphError> {
        let mut run = Run::new(self.inner.clone(), input, config.clone());
        loop {
            if let Progress::Finished(outcome) = run.advance().await? {
                return Ok(outcome);
            }
        }
    }

    /// Like [`invoke`](Self::invoke), but yields each node's update as its
    /// superstep completes. Nothing runs until the stream is polled.
    pub fn stream(
        &self,
        input: Option<PartialState>,
        config: &RunConfig,
    ) -> BoxStream<'static, Result<StreamEvent, GraphError>> {
        let run = Run::new(self.inner.clone(), input, config.clone());
        stream::unfold(Some((run, VecDeque::new())), |slot| async move {
            let (mut run, mut queue) = slot?;
            loop {
                if let Some(event) = queue.pop_front() {
                    return Some((Ok(event), Some((run, queue))));
                }
                match run.advance().await {
                    Ok(Progress::Events(events)) => queue.extend(events),
                    Ok(Progress::Finished(RunOutcome::Paused(interrupted))) => {
                        return Some((Ok(StreamEvent::Interrupted(interrupted)), None));
                    }
                    Ok(Progress::Finished(RunOutcome::Completed(_))) => return None,
                    Err(e) => return Some((Err(e), None)),
                }
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::weft::checkpoint::{InMemoryCheckpointer, ListOptions};
    use crate::weft::graph::{CompileOptions, StateGraph};
    use crate::weft::state::{FieldDef, FieldType, StateSchema, StateValue};

    fn schema() -> StateSchema {
        StateSchema::builder()
            .field("query", FieldDef::overwrite(FieldType::String))
            .field("log", FieldDef::append())
            .field("count", FieldDef::overwrite(FieldType::Number))
            .build()
            .unwrap()
    }

    fn logger(graph: &mut StateGraph, name: &'static str) {
        graph.add_node_fn(name, move |_s, _c| async move {
            Ok(PartialState::new().with("log", name))
        });
    }

    fn log_of(state: &WorkflowState) -> Vec<String> {
        state
            .get_list("log")
            .unwrap_or_default()
            .iter()
            .map(|v| v.to_text())
            .collect()
    }

    #[tokio::test]
    async fn test_linear_run() {
        let mut graph = StateGraph::new(schema());
        logger(&mut graph, "a");
        logger(&mut graph, "b");
        graph.set_entry_point("a").add_edge("a", "b").set_finish_point("b");
        let app = graph.compile(CompileOptions::default()).unwrap();

        let outcome = app
            .invoke(Some(PartialState::new().with("query", "hi")), &RunConfig::new())
            .await
            .unwrap();
        assert!(!outcome.is_paused());
        assert_eq!(log_of(outcome.state()), vec!["a", "b"]);
        assert_eq!(outcome.state().get_str("query"), Some("hi"));
    }

    fn step_recorder(graph: &mut StateGraph, name: &'static str) {
        graph.add_node_fn(name, move |_s, ctx| async move {
            Ok(PartialState::new().with("log", format!("{name}@{}", ctx.step)))
        });
    }

    #[tokio::test]
    async fn test_step_numbers_advance_without_checkpointer() {
        let mut graph = StateGraph::new(schema());
        for name in ["a", "b", "c"] {
            step_recorder(&mut graph, name);
        }
        graph
            .set_entry_point("a")
            .add_edge("a", "b")
            .add_edge("b", "c")
            .set_finish_point("c");
        let app = graph.compile(CompileOptions::default()).unwrap();

        let state = app
            .invoke(Some(PartialState::new()), &RunConfig::new())
            .await
            .unwrap()
            .into_state();
        assert_eq!(log_of(&state), vec!["a@0", "b@1", "c@2"]);
    }

    #[tokio::test]
    async fn test_step_numbers_continue_across_thread_runs() {
        let mut graph = StateGraph::new(schema());
        step_recorder(&mut graph, "a");
        graph.set_entry_point("a").set_finish_point("a");
        let app = graph
            .compile(
                CompileOptions::default().with_checkpointer(Arc::new(InMemoryCheckpointer::new())),
            )
            .unwrap();
        let config = RunConfig::for_thread("steps");

        app.invoke(Some(PartialState::new()), &config).await.unwrap();
        let state = app
            .invoke(Some(PartialState::new()), &config)
            .await
            .unwrap()
            .into_state();
        // first run: input -1, a 0; second run: input 1, a 2
        assert_eq!(log_of(&state), vec!["a@0", "a@2"]);

        let history = app
            .get_state_history(&config, ListOptions::default())
            .await
            .unwrap();
        let steps: Vec<i64> = history.iter().map(|s| s.metadata.step).collect();
        assert_eq!(steps, vec![2, 1, 0, -1]);
    }

    #[tokio::test]
    async fn test_unknown_input_field() {
        let mut graph = StateGraph::new(schema());
        logger(&mut graph, "a");
        graph.set_entry_point("a").set_finish_point("a");
        let app = graph.compile(CompileOptions::default()).unwrap();

        let err = app
            .invoke(Some(PartialState::new().with("nope", 1)), &RunConfig::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_step_failure_reports_node_and_prior_state() {
        let mut graph = StateGraph::new(schema());
        logger(&mut graph, "a");
        graph.add_node_fn("boom", |_s, _c| async { Err("kaboom".into()) });
        logger(&mut graph, "sibling");
        graph
            .set_entry_point("a")
            .add_router("a", |_s: &WorkflowState| vec!["sibling", "boom"], ["sibling", "boom"])
            .set_finish_point("boom")
            .set_finish_point("sibling");
        let app = graph.compile(CompileOptions::default()).unwrap();

        let err = app
            .invoke(Some(PartialState::new()), &RunConfig::new())
            .await
            .unwrap_err();
        match err {
            GraphError::StepFailed { node, source, state } => {
                assert_eq!(node, "boom");
                assert_eq!(source.to_string(), "kaboom");
                // sibling succeeded but nothing from the failed superstep is merged
                assert_eq!(log_of(&state), vec!["a"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_partial_with_bad_field_fails_step() {
        let mut graph = StateGraph::new(schema());
        graph.add_node_fn("bad", |_s, _c| async {
            Ok(PartialState::new().with("undeclared", true))
        });
        graph.set_entry_point("bad").set_finish_point("bad");
        let app = graph.compile(CompileOptions::default()).unwrap();

        let err = app.invoke(None, &RunConfig::new()).await.unwrap_err();
        assert_eq!(err.node(), Some("bad"));
    }

    #[tokio::test]
    async fn test_recursion_limit() {
        let mut graph = StateGraph::new(schema());
        logger(&mut graph, "spin");
        graph.set_entry_point("spin").add_edge("spin", "spin");
        let app = graph.compile(CompileOptions::default()).unwrap();

        let err = app
            .invoke(Some(PartialState::new()), &RunConfig::new().with_recursion_limit(5))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::RecursionLimit { limit: 5 }));
    }

    #[tokio::test]
    async fn test_cycle_terminates_through_router() {
        let mut graph = StateGraph::new(schema());
        graph.add_node_fn("inc", |s, _c| async move {
            let n = s.get("count").and_then(StateValue::as_f64).unwrap_or(0.0) as i64;
            Ok(PartialState::new().with("count", n + 1))
        });
        graph.set_entry_point("inc").add_conditional_edges(
            "inc",
            |s: &WorkflowState| {
                if s.get("count").and_then(StateValue::as_f64).unwrap_or(0.0) < 3.0 {
                    "again"
                } else {
                    "stop"
                }
            },
            [("again", "inc"), ("stop", END)],
        );
        let app = graph.compile(CompileOptions::default()).unwrap();

        let outcome = app.invoke(None, &RunConfig::new()).await.unwrap();
        assert_eq!(outcome.state().get("count"), Some(&StateValue::Int(3)));
    }

    #[tokio::test]
    async fn test_router_unknown_key() {
        let mut graph = StateGraph::new(schema());
        logger(&mut graph, "a");
        graph
            .set_entry_point("a")
            .add_conditional_edges("a", |_s: &WorkflowState| "mystery", [("known", END)]);
        let app = graph.compile(CompileOptions::default()).unwrap();

        let err = app.invoke(None, &RunConfig::new()).await.unwrap_err();
        assert!(matches!(
            err,
            GraphError::InvalidRoute { ref node, ref target } if node == "a" && target == "mystery"
        ));
    }

    #[tokio::test]
    async fn test_fan_out_runs_concurrently_and_joins_once() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut graph = StateGraph::new(schema());
        for name in ["left", "right"] {
            let (running, peak) = (running.clone(), peak.clone());
            graph.add_node_fn(name, move |_s, _c| {
                let (running, peak) = (running.clone(), peak.clone());
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(PartialState::new().with("log", name))
                }
            });
        }
        logger(&mut graph, "extra");
        logger(&mut graph, "join");
        graph
            .add_router(START, |_s: &WorkflowState| vec!["left", "right"], ["left", "right"])
            .add_edge("right", "extra")
            .add_join_edge(["left", "extra"], "join")
            .set_finish_point("join");
        let app = graph.compile(CompileOptions::default()).unwrap();

        let outcome = app.invoke(None, &RunConfig::new()).await.unwrap();
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(log_of(outcome.state()), vec!["left", "right", "extra", "join"]);
    }

    #[tokio::test]
    async fn test_max_concurrency_bounds_siblings() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut graph = StateGraph::new(schema());
        for name in ["a", "b", "c"] {
            let (running, peak) = (running.clone(), peak.clone());
            graph.add_node_fn(name, move |_s, _c| {
                let (running, peak) = (running.clone(), peak.clone());
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(PartialState::new())
                }
            });
            graph.set_finish_point(name);
        }
        graph.add_router(START, |_s: &WorkflowState| vec!["a", "b", "c"], ["a", "b", "c"]);
        let app = graph
            .compile(CompileOptions::default().with_max_concurrency(1))
            .unwrap();

        app.invoke(None, &RunConfig::new()).await.unwrap();
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stream_yields_updates_in_order() {
        let mut graph = StateGraph::new(schema());
        logger(&mut graph, "a");
        logger(&mut graph, "b");
        graph.set_entry_point("a").add_edge("a", "b").set_finish_point("b");
        let app = graph.compile(CompileOptions::default()).unwrap();

        let events: Vec<StreamEvent> = app
            .stream(None, &RunConfig::new())
            .try_collect()
            .await
            .unwrap();
        let nodes: Vec<&str> = events
            .iter()
            .map(|e| match e {
                StreamEvent::Update { node, .. } => node.as_str(),
                StreamEvent::Interrupted(_) => "interrupt",
            })
            .collect();
        assert_eq!(nodes, vec!["a", "b"]);
        assert_eq!(
            events[0],
            StreamEvent::Update {
                node: "a".to_string(),
                update: PartialState::new().with("log", "a"),
            }
        );
    }

    #[tokio::test]
    async fn test_stream_is_lazy() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut graph = StateGraph::new(schema());
        graph.add_node_fn("a", move |_s, _c| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(PartialState::new()) }
        });
        graph.set_entry_point("a").set_finish_point("a");
        let app = graph.compile(CompileOptions::default()).unwrap();

        let stream = app.stream(None, &RunConfig::new());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        drop(stream);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_checkpoints_written_per_superstep() {
        let saver = Arc::new(InMemoryCheckpointer::new());
        let mut graph = StateGraph::new(schema());
        logger(&mut graph, "a");
        logger(&mut graph, "b");
        graph.set_entry_point("a").add_edge("a", "b").set_finish_point("b");
        let app = graph
            .compile(CompileOptions::default().with_checkpointer(saver.clone()))
            .unwrap();

        let config = RunConfig::for_thread("t").with_metadata("user", "sam");
        app.invoke(Some(PartialState::new().with("query", "x")), &config)
            .await
            .unwrap();

        let history = saver.list("t", ListOptions::default()).await.unwrap();
        let sources: Vec<CheckpointSource> =
            history.iter().map(|t| t.metadata.source).collect();
        assert_eq!(
            sources,
            vec![CheckpointSource::Loop, CheckpointSource::Loop, CheckpointSource::Input]
        );
        assert_eq!(history[2].checkpoint.next, vec!["a".to_string()]);
        assert!(history[0].checkpoint.next.is_empty());
        assert_eq!(history[0].checkpoint.step, 1);
        assert_eq!(
            history[0].metadata.extra.get("user"),
            Some(&StateValue::from("sam"))
        );
        assert_eq!(
            history[1].parent_config.as_ref().and_then(|c| c.checkpoint_id.clone()),
            Some(history[2].checkpoint.id.clone())
        );
    }

    #[tokio::test]
    async fn test_second_input_builds_on_thread_state() {
        let saver = Arc::new(InMemoryCheckpointer::new());
        let mut graph = StateGraph::new(schema());
        logger(&mut graph, "a");
        graph.set_entry_point("a").set_finish_point("a");
        let app = graph
            .compile(CompileOptions::default().with_checkpointer(saver))
            .unwrap();

        let config = RunConfig::for_thread("t");
        app.invoke(Some(PartialState::new()), &config).await.unwrap();
        let outcome = app.invoke(Some(PartialState::new()), &config).await.unwrap();
        assert_eq!(log_of(outcome.state()), vec!["a", "a"]);

        // nothing pending, resuming is a no-op
        let outcome = app.invoke(None, &config).await.unwrap();
        assert_eq!(log_of(outcome.state()), vec!["a", "a"]);
    }

    #[tokio::test]
    async fn test_checkpointer_requires_thread() {
        let mut graph = StateGraph::new(schema());
        logger(&mut graph, "a");
        graph.set_entry_point("a").set_finish_point("a");
        let app = graph
            .compile(CompileOptions::default().with_checkpointer(Arc::new(InMemoryCheckpointer::new())))
            .unwrap();

        let err = app.invoke(None, &RunConfig::new()).await.unwrap_err();
        assert!(matches!(err, GraphError::MissingThread));
    }

    #[tokio::test]
    async fn test_unknown_checkpoint_id() {
        let mut graph = StateGraph::new(schema());
        logger(&mut graph, "a");
        graph.set_entry_point("a").set_finish_point("a");
        let app = graph
            .compile(CompileOptions::default().with_checkpointer(Arc::new(InMemoryCheckpointer::new())))
            .unwrap();

        let err = app
            .invoke(None, &RunConfig::for_thread("t").with_checkpoint("000"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::Checkpoint(CheckpointError::NotFound { .. })
        ));
    }
}
