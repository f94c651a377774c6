use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use touchline_core::error::{Result, TouchlineError};
use touchline_core::event::EventBus;
use touchline_core::types::{RunId, WorkflowEvent};

use super::definition::WorkflowGraph;
use super::state::SharedState;
use super::step::{NavigationDirective, Step, StepId, StepResult};

/// Timing record for one executed step.
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// Which step was executed.
    pub step: StepId,
    /// The step that fanned out to this one, if it ran as a branch.
    pub branch_of: Option<StepId>,
    /// Execution time in milliseconds.
    pub elapsed_ms: u64,
}

/// Result of executing a whole run.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub run_id: RunId,
    /// Final merged state; `final_answer` is always set.
    pub state: SharedState,
    /// Per-step records. Fan-out branches appear in completion order.
    pub step_records: Vec<StepRecord>,
    /// Total execution time in milliseconds.
    pub total_elapsed_ms: u64,
}

/// Drives one workflow instance per call from the entry step to a halt.
///
/// `GoTo` transitions run sequentially. `FanOut` launches every branch as
/// its own task on the same snapshot and waits for all of them before
/// merging (in completion order) and moving on to the barrier step.
pub struct WorkflowExecutor {
    graph: Arc<WorkflowGraph>,
    event_bus: Option<Arc<EventBus>>,
}

impl WorkflowExecutor {
    pub fn new(graph: WorkflowGraph) -> Self {
        Self {
            graph: Arc::new(graph),
            event_bus: None,
        }
    }

    /// Publish [`WorkflowEvent`]s for every run on this bus.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    /// Run one instance and return the final state.
    pub async fn run(&self, initial: SharedState, cancel: CancellationToken) -> Result<SharedState> {
        self.run_traced(initial, cancel).await.map(|r| r.state)
    }

    /// Run one instance and return the final state with step timings.
    pub async fn run_traced(
        &self,
        initial: SharedState,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult> {
        let run_id = RunId::new();
        let start = Instant::now();

        info!(run_id = %run_id, entry = %self.graph.entry(), "Workflow run started");
        self.publish(WorkflowEvent::RunStarted {
            run_id: run_id.clone(),
        });

        let result = self.drive(&run_id, initial, &cancel).await;
        let total_elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok((state, step_records)) => {
                info!(run_id = %run_id, total_elapsed_ms, "Workflow run completed");
                self.publish(WorkflowEvent::RunCompleted {
                    run_id: run_id.clone(),
                    elapsed_ms: total_elapsed_ms,
                });
                Ok(ExecutionResult {
                    run_id,
                    state,
                    step_records,
                    total_elapsed_ms,
                })
            }
            Err(TouchlineError::Cancelled) => {
                warn!(run_id = %run_id, "Workflow run cancelled");
                self.publish(WorkflowEvent::RunCancelled { run_id });
                Err(TouchlineError::Cancelled)
            }
            Err(e) => {
                error!(
                    run_id = %run_id,
                    error = %e,
                    internal_defect = e.is_internal_defect(),
                    "Workflow run failed"
                );
                self.publish(WorkflowEvent::RunFailed {
                    run_id,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        run_id: &RunId,
        initial: SharedState,
        cancel: &CancellationToken,
    ) -> Result<(SharedState, Vec<StepRecord>)> {
        if initial.is_complete() {
            return Err(TouchlineError::InvariantViolation(
                "initial state already carries a final answer".to_string(),
            ));
        }

        let mut state = initial;
        let mut records = Vec::new();
        let mut visited: HashSet<StepId> = HashSet::new();
        let mut current = self.graph.entry().clone();

        loop {
            if cancel.is_cancelled() {
                return Err(TouchlineError::Cancelled);
            }
            enter(&mut visited, &current)?;

            let (result, elapsed_ms) = self.execute_step(run_id, &current, &state, cancel).await?;
            records.push(StepRecord {
                step: current.clone(),
                branch_of: None,
                elapsed_ms,
            });

            if !self.graph.permits(&current, &result.next) {
                return Err(TouchlineError::InvariantViolation(format!(
                    "step '{}' returned undeclared transition {:?}",
                    current, result.next
                )));
            }
            self.check_answer_owner(&current, &result)?;
            if let Some(decision) = result.update.route_decision {
                self.publish(WorkflowEvent::RouteDecided {
                    run_id: run_id.clone(),
                    decision,
                });
            }
            state = state.apply(result.update).map_err(|e| blame(&current, e))?;

            match result.next {
                NavigationDirective::GoTo(next) => {
                    debug!(run_id = %run_id, from = %current, to = %next, "Advancing");
                    current = next;
                }
                NavigationDirective::FanOut { branches, barrier } => {
                    for branch in &branches {
                        enter(&mut visited, branch)?;
                    }
                    state = self
                        .fan_out(run_id, &current, &branches, &barrier, state, cancel, &mut records)
                        .await?;
                    current = barrier;
                }
                NavigationDirective::Halt => {
                    if !state.is_complete() {
                        return Err(TouchlineError::InvariantViolation(format!(
                            "step '{current}' halted without a final answer"
                        )));
                    }
                    return Ok((state, records));
                }
            }
        }
    }

    /// Run one step, abandoning it if the run is cancelled.
    async fn execute_step(
        &self,
        run_id: &RunId,
        id: &StepId,
        state: &SharedState,
        cancel: &CancellationToken,
    ) -> Result<(StepResult, u64)> {
        let step = self.lookup(id)?;

        info!(run_id = %run_id, step = %id, label = step.label(), "Executing step");
        self.publish(WorkflowEvent::StepStarted {
            run_id: run_id.clone(),
            step: id.to_string(),
        });

        let start = Instant::now();
        let result = tokio::select! {
            result = step.run(state) => result,
            _ = cancel.cancelled() => return Err(TouchlineError::Cancelled),
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let result = result.inspect_err(|e| {
            error!(run_id = %run_id, step = %id, error = %e, "Step failed");
        })?;

        debug!(run_id = %run_id, step = %id, elapsed_ms, "Step complete");
        self.publish(WorkflowEvent::StepCompleted {
            run_id: run_id.clone(),
            step: id.to_string(),
            elapsed_ms,
        });
        Ok((result, elapsed_ms))
    }

    /// Run `branches` concurrently and merge their updates once all finish.
    #[allow(clippy::too_many_arguments)]
    async fn fan_out(
        &self,
        run_id: &RunId,
        origin: &StepId,
        branches: &[StepId],
        barrier: &StepId,
        state: SharedState,
        cancel: &CancellationToken,
        records: &mut Vec<StepRecord>,
    ) -> Result<SharedState> {
        info!(
            run_id = %run_id,
            from = %origin,
            branches = ?branches.iter().map(StepId::as_str).collect::<Vec<_>>(),
            barrier = %barrier,
            "Fanning out"
        );
        self.publish(WorkflowEvent::FanOutStarted {
            run_id: run_id.clone(),
            branches: branches.iter().map(ToString::to_string).collect(),
            barrier: barrier.to_string(),
        });

        let snapshot = Arc::new(state);
        let mut tasks = JoinSet::new();
        for branch in branches {
            let step = Arc::clone(self.lookup(branch)?);
            let snapshot = Arc::clone(&snapshot);
            let id = branch.clone();
            self.publish(WorkflowEvent::StepStarted {
                run_id: run_id.clone(),
                step: id.to_string(),
            });
            tasks.spawn(async move {
                let start = Instant::now();
                let result = step.run(&snapshot).await;
                (id, start.elapsed().as_millis() as u64, result)
            });
        }

        // Barrier: nothing is merged until every branch has finished.
        let mut completed = Vec::with_capacity(branches.len());
        loop {
            let joined = tokio::select! {
                joined = tasks.join_next() => joined,
                // Dropping the set aborts every in-flight branch.
                _ = cancel.cancelled() => return Err(TouchlineError::Cancelled),
            };
            let Some(joined) = joined else { break };
            let (id, elapsed_ms, result) = joined.map_err(|e| TouchlineError::Step {
                step: origin.to_string(),
                message: format!("fan-out branch task failed: {e}"),
            })?;
            debug!(run_id = %run_id, step = %id, elapsed_ms, "Branch complete");
            self.publish(WorkflowEvent::StepCompleted {
                run_id: run_id.clone(),
                step: id.to_string(),
                elapsed_ms,
            });
            completed.push((id, elapsed_ms, result));
        }

        self.publish(WorkflowEvent::BarrierReached {
            run_id: run_id.clone(),
            barrier: barrier.to_string(),
        });

        let mut merged = Arc::try_unwrap(snapshot).unwrap_or_else(|shared| (*shared).clone());
        for (id, elapsed_ms, result) in completed {
            let result = result.inspect_err(|e| {
                error!(run_id = %run_id, step = %id, error = %e, "Branch failed");
            })?;
            if !self.graph.permits(&id, &result.next) {
                return Err(TouchlineError::InvariantViolation(format!(
                    "fan-out branch '{id}' returned undeclared transition {:?}",
                    result.next
                )));
            }
            self.check_answer_owner(&id, &result)?;
            merged = merged.apply(result.update).map_err(|e| blame(&id, e))?;
            records.push(StepRecord {
                step: id,
                branch_of: Some(origin.clone()),
                elapsed_ms,
            });
        }

        Ok(merged)
    }

    fn lookup(&self, id: &StepId) -> Result<&Arc<dyn Step>> {
        self.graph.step(id).ok_or_else(|| {
            TouchlineError::InvariantViolation(format!("step '{id}' not found in graph"))
        })
    }

    /// Only terminal steps may assign the final answer.
    fn check_answer_owner(&self, id: &StepId, result: &StepResult) -> Result<()> {
        if result.update.final_answer.is_some() && !self.graph.is_terminal(id) {
            return Err(TouchlineError::InvariantViolation(format!(
                "non-terminal step '{id}' assigned the final answer"
            )));
        }
        Ok(())
    }

    fn publish(&self, event: WorkflowEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

fn enter(visited: &mut HashSet<StepId>, id: &StepId) -> Result<()> {
    if visited.insert(id.clone()) {
        Ok(())
    } else {
        Err(TouchlineError::InvariantViolation(format!(
            "step '{id}' re-entered within one run"
        )))
    }
}

fn blame(step: &StepId, err: TouchlineError) -> TouchlineError {
    match err {
        TouchlineError::InvariantViolation(msg) => {
            TouchlineError::InvariantViolation(format!("step '{step}': {msg}"))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::future::BoxFuture;
    use touchline_core::types::ContextItem;

    use crate::graph::edge::Edge;
    use crate::graph::state::StateUpdate;

    /// A step returning a fixed result after an optional delay.
    struct Scripted {
        result: StepResult,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(result: StepResult) -> Self {
            Self {
                result,
                delay: Duration::ZERO,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    impl Step for Scripted {
        fn label(&self) -> &str {
            "scripted"
        }

        fn run<'a>(&'a self, _state: &'a SharedState) -> BoxFuture<'a, Result<StepResult>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                Ok(self.result.clone())
            })
        }
    }

    struct Panicking;

    impl Step for Panicking {
        fn label(&self) -> &str {
            "panicking"
        }

        fn run<'a>(&'a self, _state: &'a SharedState) -> BoxFuture<'a, Result<StepResult>> {
            fn boom() -> Result<StepResult> {
                panic!("branch bug")
            }
            Box::pin(async { boom() })
        }
    }

    fn item(tag: &str) -> StateUpdate {
        StateUpdate::new().with_context_item(ContextItem::tool(tag))
    }

    fn fan_graph(fast_first: bool) -> WorkflowGraph {
        let (a_delay, b_delay) = if fast_first {
            (Duration::from_millis(5), Duration::from_millis(40))
        } else {
            (Duration::from_millis(40), Duration::from_millis(5))
        };
        WorkflowGraph::builder()
            .step(
                "start",
                Arc::new(Scripted::new(StepResult::new(
                    StateUpdate::new(),
                    NavigationDirective::fan_out(["a", "b"], "end"),
                ))),
            )
            .step(
                "a",
                Arc::new(Scripted::new(StepResult::goto(item("from-a"), "end")).delayed(a_delay)),
            )
            .step(
                "b",
                Arc::new(Scripted::new(StepResult::goto(item("from-b"), "end")).delayed(b_delay)),
            )
            .step(
                "end",
                Arc::new(Scripted::new(StepResult::halt(
                    StateUpdate::new().with_final_answer("done"),
                ))),
            )
            .entry("start")
            .terminal("end")
            .edge(Edge::fan_out("start", ["a", "b"], "end"))
            .edge(Edge::goto("a", "end"))
            .edge(Edge::goto("b", "end"))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_fan_out_merges_every_branch_regardless_of_order() {
        for fast_first in [true, false] {
            let executor = WorkflowExecutor::new(fan_graph(fast_first));
            let result = executor
                .run_traced(SharedState::new("q"), CancellationToken::new())
                .await
                .unwrap();

            let contents: Vec<&str> = result
                .state
                .collected_context()
                .iter()
                .map(|i| i.content.as_str())
                .collect();
            assert_eq!(contents.len(), 2);
            assert!(contents.contains(&"from-a"));
            assert!(contents.contains(&"from-b"));
            assert_eq!(result.state.final_answer(), Some("done"));

            let first_branch = &result.step_records[1];
            let expected = if fast_first { "a" } else { "b" };
            assert_eq!(first_branch.step.as_str(), expected);
            assert_eq!(first_branch.branch_of, Some(StepId::from("start")));
        }
    }

    #[tokio::test]
    async fn test_barrier_step_runs_once_after_both_branches() {
        let end = Arc::new(Scripted::new(StepResult::halt(
            StateUpdate::new().with_final_answer("done"),
        )));
        let end_calls = Arc::clone(&end.calls);
        let graph = WorkflowGraph::builder()
            .step(
                "start",
                Arc::new(Scripted::new(StepResult::new(
                    StateUpdate::new(),
                    NavigationDirective::fan_out(["a", "b"], "end"),
                ))),
            )
            .step("a", Arc::new(Scripted::new(StepResult::goto(item("a"), "end"))))
            .step("b", Arc::new(Scripted::new(StepResult::goto(item("b"), "end"))))
            .step("end", end)
            .entry("start")
            .terminal("end")
            .edge(Edge::fan_out("start", ["a", "b"], "end"))
            .edge(Edge::goto("a", "end"))
            .edge(Edge::goto("b", "end"))
            .build()
            .unwrap();

        let result = WorkflowExecutor::new(graph)
            .run_traced(SharedState::new("q"), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(end_calls.load(Ordering::SeqCst), 1);
        let order: Vec<&str> = result.step_records.iter().map(|r| r.step.as_str()).collect();
        assert_eq!(order.len(), 4);
        assert_eq!(order[0], "start");
        assert_eq!(order[3], "end");
    }

    #[tokio::test]
    async fn test_halt_without_answer_is_invariant_violation() {
        let graph = WorkflowGraph::builder()
            .step("only", Arc::new(Scripted::new(StepResult::halt(StateUpdate::new()))))
            .entry("only")
            .terminal("only")
            .build()
            .unwrap();

        let err = WorkflowExecutor::new(graph)
            .run(SharedState::new("q"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TouchlineError::InvariantViolation(_)));
    }

    #[tokio::test]
    async fn test_undeclared_transition_is_invariant_violation() {
        let graph = WorkflowGraph::builder()
            .step(
                "start",
                Arc::new(Scripted::new(StepResult::goto(StateUpdate::new(), "elsewhere"))),
            )
            .step(
                "end",
                Arc::new(Scripted::new(StepResult::halt(
                    StateUpdate::new().with_final_answer("x"),
                ))),
            )
            .entry("start")
            .terminal("end")
            .edge(Edge::goto("start", "end"))
            .build()
            .unwrap();

        let err = WorkflowExecutor::new(graph)
            .run(SharedState::new("q"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_internal_defect());
        assert!(err.to_string().contains("undeclared transition"));
    }

    #[tokio::test]
    async fn test_non_terminal_answer_is_rejected() {
        let graph = WorkflowGraph::builder()
            .step(
                "start",
                Arc::new(Scripted::new(StepResult::goto(
                    StateUpdate::new().with_final_answer("early"),
                    "end",
                ))),
            )
            .step(
                "end",
                Arc::new(Scripted::new(StepResult::halt(
                    StateUpdate::new().with_final_answer("late"),
                ))),
            )
            .entry("start")
            .terminal("end")
            .edge(Edge::goto("start", "end"))
            .build()
            .unwrap();

        let err = WorkflowExecutor::new(graph)
            .run(SharedState::new("q"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TouchlineError::InvariantViolation(_)));
    }

    #[tokio::test]
    async fn test_branch_undeclared_transition_is_invariant_violation() {
        let end = Arc::new(Scripted::new(StepResult::halt(
            StateUpdate::new().with_final_answer("done"),
        )));
        let end_calls = Arc::clone(&end.calls);
        let graph = WorkflowGraph::builder()
            .step(
                "start",
                Arc::new(Scripted::new(StepResult::new(
                    StateUpdate::new(),
                    NavigationDirective::fan_out(["a", "b"], "end"),
                ))),
            )
            .step("a", Arc::new(Scripted::new(StepResult::goto(item("a"), "ghost"))))
            .step("b", Arc::new(Scripted::new(StepResult::goto(item("b"), "end"))))
            .step("end", end)
            .entry("start")
            .terminal("end")
            .edge(Edge::fan_out("start", ["a", "b"], "end"))
            .edge(Edge::goto("a", "end"))
            .edge(Edge::goto("b", "end"))
            .build()
            .unwrap();

        let err = WorkflowExecutor::new(graph)
            .run(SharedState::new("q"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TouchlineError::InvariantViolation(_)));
        assert!(err.to_string().contains("branch 'a'"));
        assert_eq!(end_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_panicking_branch_is_internal_defect() {
        let graph = WorkflowGraph::builder()
            .step(
                "start",
                Arc::new(Scripted::new(StepResult::new(
                    StateUpdate::new(),
                    NavigationDirective::fan_out(["a", "b"], "end"),
                ))),
            )
            .step("a", Arc::new(Panicking))
            .step("b", Arc::new(Scripted::new(StepResult::goto(item("b"), "end"))))
            .step(
                "end",
                Arc::new(Scripted::new(StepResult::halt(
                    StateUpdate::new().with_final_answer("done"),
                ))),
            )
            .entry("start")
            .terminal("end")
            .edge(Edge::fan_out("start", ["a", "b"], "end"))
            .edge(Edge::goto("a", "end"))
            .edge(Edge::goto("b", "end"))
            .build()
            .unwrap();

        let err = WorkflowExecutor::new(graph)
            .run(SharedState::new("q"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TouchlineError::Step { .. }));
        assert!(err.is_internal_defect());
    }

    #[tokio::test]
    async fn test_cancellation_abandons_run() {
        let graph = WorkflowGraph::builder()
            .step(
                "slow",
                Arc::new(
                    Scripted::new(StepResult::halt(StateUpdate::new().with_final_answer("late")))
                        .delayed(Duration::from_secs(30)),
                ),
            )
            .entry("slow")
            .terminal("slow")
            .build()
            .unwrap();

        let executor = WorkflowExecutor::new(graph);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = executor.run(SharedState::new("q"), cancel).await.unwrap_err();
        assert!(matches!(err, TouchlineError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancellation_during_fan_out() {
        let graph = WorkflowGraph::builder()
            .step(
                "start",
                Arc::new(Scripted::new(StepResult::new(
                    StateUpdate::new(),
                    NavigationDirective::fan_out(["a", "b"], "end"),
                ))),
            )
            .step(
                "a",
                Arc::new(
                    Scripted::new(StepResult::goto(item("a"), "end"))
                        .delayed(Duration::from_secs(30)),
                ),
            )
            .step("b", Arc::new(Scripted::new(StepResult::goto(item("b"), "end"))))
            .step(
                "end",
                Arc::new(Scripted::new(StepResult::halt(
                    StateUpdate::new().with_final_answer("done"),
                ))),
            )
            .entry("start")
            .terminal("end")
            .edge(Edge::fan_out("start", ["a", "b"], "end"))
            .edge(Edge::goto("a", "end"))
            .edge(Edge::goto("b", "end"))
            .build()
            .unwrap();

        let bus = Arc::new(EventBus::default());
        let mut events = bus.subscribe();
        let executor = WorkflowExecutor::new(graph).with_event_bus(bus);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = executor.run(SharedState::new("q"), cancel).await.unwrap_err();
        assert!(matches!(err, TouchlineError::Cancelled));

        let mut saw_barrier = false;
        let mut saw_cancelled = false;
        while let Ok(event) = events.try_recv() {
            match event {
                WorkflowEvent::BarrierReached { .. } => saw_barrier = true,
                WorkflowEvent::RunCancelled { .. } => saw_cancelled = true,
                _ => {}
            }
        }
        assert!(!saw_barrier);
        assert!(saw_cancelled);
    }

    #[tokio::test]
    async fn test_pre_cancelled_run_never_starts_a_step() {
        let step = Arc::new(Scripted::new(StepResult::halt(
            StateUpdate::new().with_final_answer("x"),
        )));
        let calls = Arc::clone(&step.calls);
        let graph = WorkflowGraph::builder()
            .step("only", step)
            .entry("only")
            .terminal("only")
            .build()
            .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = WorkflowExecutor::new(graph)
            .run(SharedState::new("q"), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, TouchlineError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
