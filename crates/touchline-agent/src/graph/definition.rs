use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Write as _;
use std::sync::Arc;

use touchline_core::error::{Result, TouchlineError};

use super::edge::{Edge, Transition};
use super::step::{NavigationDirective, Step, StepId};

/// A validated, immutable workflow graph.
///
/// Built through [`WorkflowGraphBuilder`]; a graph that exists has passed
/// every structural check, so the executor never sees a dangling target,
/// a cycle or a dead end.
pub struct WorkflowGraph {
    steps: HashMap<StepId, Arc<dyn Step>>,
    /// Declaration order, used for stable diagrams.
    order: Vec<StepId>,
    edges: Vec<Edge>,
    entry: StepId,
    terminals: HashSet<StepId>,
}

impl std::fmt::Debug for WorkflowGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowGraph")
            .field("steps", &self.order)
            .field("edges", &self.edges)
            .field("entry", &self.entry)
            .field("terminals", &self.terminals)
            .finish()
    }
}

impl WorkflowGraph {
    pub fn builder() -> WorkflowGraphBuilder {
        WorkflowGraphBuilder::default()
    }

    pub fn entry(&self) -> &StepId {
        &self.entry
    }

    pub fn step(&self, id: &StepId) -> Option<&Arc<dyn Step>> {
        self.steps.get(id)
    }

    pub fn step_ids(&self) -> &[StepId] {
        &self.order
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn is_terminal(&self, id: &StepId) -> bool {
        self.terminals.contains(id)
    }

    /// Whether `from` may hand off with `directive`.
    pub fn permits(&self, from: &StepId, directive: &NavigationDirective) -> bool {
        match directive {
            NavigationDirective::Halt => self.is_terminal(from),
            _ => self
                .edges
                .iter()
                .filter(|e| &e.from == from)
                .any(|e| e.permits(directive)),
        }
    }

    /// Render the graph as a Mermaid flowchart.
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("flowchart TD\n");
        let _ = writeln!(out, "    __start__([start]) --> {}", self.entry);
        for id in &self.order {
            let label = self
                .steps
                .get(id)
                .map(|s| s.label().to_string())
                .unwrap_or_else(|| id.to_string());
            let _ = writeln!(out, "    {id}[\"{label}\"]");
        }
        for edge in &self.edges {
            match &edge.transition {
                Transition::GoTo { to } => {
                    let _ = writeln!(out, "    {} --> {}", edge.from, to);
                }
                Transition::FanOut { branches, barrier } => {
                    for branch in branches {
                        let _ = writeln!(out, "    {} -->|fan-out| {}", edge.from, branch);
                    }
                    let joined = branches
                        .iter()
                        .map(StepId::as_str)
                        .collect::<Vec<_>>()
                        .join(" & ");
                    let _ = writeln!(out, "    {joined} -.->|barrier| {barrier}");
                }
            }
        }
        for id in &self.order {
            if self.terminals.contains(id) {
                let _ = writeln!(out, "    {id} --> __end__([end])");
            }
        }
        out
    }

    fn successors(&self, id: &StepId) -> Vec<&StepId> {
        self.edges
            .iter()
            .filter(|e| &e.from == id)
            .flat_map(|e| e.targets())
            .collect()
    }
}

/// Collects steps and edges, then validates them into a [`WorkflowGraph`].
#[derive(Default)]
pub struct WorkflowGraphBuilder {
    steps: Vec<(StepId, Arc<dyn Step>)>,
    edges: Vec<Edge>,
    entries: Vec<StepId>,
    terminals: Vec<StepId>,
}

impl WorkflowGraphBuilder {
    /// Declare a step.
    pub fn step(mut self, id: impl Into<StepId>, step: Arc<dyn Step>) -> Self {
        self.steps.push((id.into(), step));
        self
    }

    /// Mark the entry step.
    pub fn entry(mut self, id: impl Into<StepId>) -> Self {
        self.entries.push(id.into());
        self
    }

    /// Mark a step as terminal (it halts the run).
    pub fn terminal(mut self, id: impl Into<StepId>) -> Self {
        self.terminals.push(id.into());
        self
    }

    pub fn edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    /// Validate and freeze the graph.
    pub fn build(self) -> Result<WorkflowGraph> {
        let mut steps = HashMap::new();
        let mut order = Vec::with_capacity(self.steps.len());
        for (id, step) in self.steps {
            if steps.contains_key(&id) {
                return Err(invalid(format!("step '{id}' declared more than once")));
            }
            order.push(id.clone());
            steps.insert(id, step);
        }

        let entry = match self.entries.as_slice() {
            [entry] => entry.clone(),
            [] => return Err(invalid("no entry step declared")),
            many => {
                return Err(invalid(format!(
                    "exactly one entry step allowed, found {}",
                    many.len()
                )))
            }
        };
        if !steps.contains_key(&entry) {
            return Err(invalid(format!("entry step '{entry}' is not declared")));
        }

        if self.terminals.is_empty() {
            return Err(invalid("no terminal step declared"));
        }
        let mut terminals = HashSet::new();
        for id in self.terminals {
            if !steps.contains_key(&id) {
                return Err(invalid(format!("terminal step '{id}' is not declared")));
            }
            terminals.insert(id);
        }

        for edge in &self.edges {
            if !steps.contains_key(&edge.from) {
                return Err(invalid(format!(
                    "edge source '{}' is not declared",
                    edge.from
                )));
            }
            if terminals.contains(&edge.from) {
                return Err(invalid(format!(
                    "terminal step '{}' cannot have outgoing edges",
                    edge.from
                )));
            }
            for target in edge.targets() {
                if !steps.contains_key(target) {
                    return Err(invalid(format!(
                        "edge from '{}' targets undeclared step '{}'",
                        edge.from, target
                    )));
                }
            }
            if let Transition::FanOut { branches, barrier } = &edge.transition {
                validate_fan_out(&edge.from, branches, barrier, &terminals)?;
            }
        }

        let graph = WorkflowGraph {
            steps,
            order,
            edges: self.edges,
            entry,
            terminals,
        };
        check_acyclic(&graph)?;
        check_terminal_reachable(&graph)?;
        check_branch_hand_offs(&graph)?;
        Ok(graph)
    }
}

fn invalid(message: impl Into<String>) -> TouchlineError {
    TouchlineError::InvalidGraph(message.into())
}

fn validate_fan_out(
    from: &StepId,
    branches: &[StepId],
    barrier: &StepId,
    terminals: &HashSet<StepId>,
) -> Result<()> {
    if branches.is_empty() {
        return Err(invalid(format!("fan-out from '{from}' has no branches")));
    }
    let unique: HashSet<&StepId> = branches.iter().collect();
    if unique.len() != branches.len() {
        return Err(invalid(format!("fan-out from '{from}' repeats a branch")));
    }
    if branches.contains(barrier) {
        return Err(invalid(format!(
            "fan-out from '{from}' uses branch '{barrier}' as its barrier"
        )));
    }
    if let Some(branch) = branches.iter().find(|b| terminals.contains(*b)) {
        return Err(invalid(format!(
            "fan-out from '{from}' cannot run terminal step '{branch}' as a branch"
        )));
    }
    Ok(())
}

fn check_acyclic(graph: &WorkflowGraph) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'g>(
        graph: &'g WorkflowGraph,
        id: &'g StepId,
        marks: &mut HashMap<&'g StepId, Mark>,
    ) -> Result<()> {
        match marks.get(id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(invalid(format!("cycle detected through step '{id}'")))
            }
            None => {}
        }
        marks.insert(id, Mark::Visiting);
        for next in graph.successors(id) {
            visit(graph, next, marks)?;
        }
        marks.insert(id, Mark::Done);
        Ok(())
    }

    let mut marks = HashMap::new();
    for id in &graph.order {
        visit(graph, id, &mut marks)?;
    }
    Ok(())
}

/// Every declared step must be able to reach some terminal step.
fn check_terminal_reachable(graph: &WorkflowGraph) -> Result<()> {
    let mut predecessors: HashMap<&StepId, Vec<&StepId>> = HashMap::new();
    for id in &graph.order {
        for next in graph.successors(id) {
            predecessors.entry(next).or_default().push(id);
        }
    }

    let mut reaches_terminal: HashSet<&StepId> = graph.terminals.iter().collect();
    let mut queue: VecDeque<&StepId> = graph.terminals.iter().collect();
    while let Some(id) = queue.pop_front() {
        for &prev in predecessors.get(id).into_iter().flatten() {
            if reaches_terminal.insert(prev) {
                queue.push_back(prev);
            }
        }
    }

    match graph.order.iter().find(|id| !reaches_terminal.contains(id)) {
        Some(stuck) => Err(invalid(format!(
            "step '{stuck}' cannot reach a terminal step"
        ))),
        None => Ok(()),
    }
}

/// A fan-out branch may only hand off to its barrier.
fn check_branch_hand_offs(graph: &WorkflowGraph) -> Result<()> {
    for edge in &graph.edges {
        let Transition::FanOut { branches, barrier } = &edge.transition else {
            continue;
        };
        for branch in branches {
            for out in graph.edges.iter().filter(|e| &e.from == branch) {
                match &out.transition {
                    Transition::GoTo { to } if to == barrier => {}
                    _ => {
                        return Err(invalid(format!(
                            "fan-out branch '{branch}' must hand off only to barrier '{barrier}'"
                        )))
                    }
                }
            }
        }
    }
    Ok(())
}
