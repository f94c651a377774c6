//! Question-answering workflow for Touchline.
//!
//! [`graph`] is the generic engine (state, steps, validated graphs and the
//! executor). [`steps`] holds the four concrete steps and [`workflow`]
//! wires them into the football question graph.

pub mod graph;
pub mod steps;
pub mod workflow;

pub use graph::{
    merge, Edge, ExecutionResult, NavigationDirective, SharedState, StateUpdate, Step, StepId,
    StepRecord, StepResult, Transition, WorkflowExecutor, WorkflowGraph, WorkflowGraphBuilder,
};
pub use steps::{DomainDataStep, ResponderStep, RouteTargets, RouterStep, WebSearchStep};
pub use workflow::{answer_question, ids, Collaborators, QuestionWorkflow};
