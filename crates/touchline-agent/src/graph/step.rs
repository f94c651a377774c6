use std::fmt;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use touchline_core::error::Result;

use super::state::{SharedState, StateUpdate};

/// Identifier of a step in a workflow graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepId(String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StepId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StepId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the executor goes after a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDirective {
    /// Exactly one successor.
    GoTo(StepId),
    /// Run `branches` concurrently on the same snapshot, then continue at
    /// `barrier` once all of them finished.
    FanOut {
        branches: Vec<StepId>,
        barrier: StepId,
    },
    /// The run is complete.
    Halt,
}

impl NavigationDirective {
    pub fn goto(step: impl Into<StepId>) -> Self {
        Self::GoTo(step.into())
    }

    pub fn fan_out<I, S>(branches: I, barrier: impl Into<StepId>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StepId>,
    {
        Self::FanOut {
            branches: branches.into_iter().map(Into::into).collect(),
            barrier: barrier.into(),
        }
    }
}

/// What a step hands back to the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub update: StateUpdate,
    pub next: NavigationDirective,
}

impl StepResult {
    pub fn new(update: StateUpdate, next: NavigationDirective) -> Self {
        Self { update, next }
    }

    pub fn goto(update: StateUpdate, step: impl Into<StepId>) -> Self {
        Self::new(update, NavigationDirective::goto(step))
    }

    pub fn halt(update: StateUpdate) -> Self {
        Self::new(update, NavigationDirective::Halt)
    }
}

/// A unit of work in the graph.
///
/// Steps read the snapshot and return a delta; they never mutate state in
/// place. Calls to external collaborators happen inside `run` and are
/// awaited by the executor without retry.
pub trait Step: Send + Sync + 'static {
    /// Human-readable label for logs and diagrams.
    fn label(&self) -> &str;

    fn run<'a>(&'a self, state: &'a SharedState) -> BoxFuture<'a, Result<StepResult>>;
}
