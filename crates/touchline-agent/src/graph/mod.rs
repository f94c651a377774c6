//! Workflow graph engine: steps, declared transitions and the executor.
//!
//! A workflow is a directed acyclic graph of [`Step`]s. Each step reads a
//! snapshot of [`SharedState`] and returns a [`StateUpdate`] plus a
//! [`NavigationDirective`]: go to one successor, fan out to several steps
//! that run concurrently and meet at a barrier, or halt.
//!
//! [`WorkflowGraph`] validates the declaration up front (dangling targets,
//! cycles, dead ends). [`WorkflowExecutor`] drives one run per call and
//! applies the merge policy in [`state`].

pub mod definition;
pub mod edge;
pub mod executor;
pub mod state;
pub mod step;

pub use definition::{WorkflowGraph, WorkflowGraphBuilder};
pub use edge::{Edge, Transition};
pub use executor::{ExecutionResult, StepRecord, WorkflowExecutor};
pub use state::{merge, SharedState, StateUpdate};
pub use step::{NavigationDirective, Step, StepId, StepResult};
