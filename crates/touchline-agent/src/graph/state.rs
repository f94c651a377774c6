use serde::{Deserialize, Serialize};

use touchline_core::error::{Result, TouchlineError};
use touchline_core::types::{ContextItem, RouteDecision};

/// State threaded through every step of one workflow run.
///
/// Steps only ever see it by shared reference; all changes go through
/// a [`StateUpdate`] merged by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedState {
    question: String,
    route_decision: Option<RouteDecision>,
    collected_context: Vec<ContextItem>,
    final_answer: Option<String>,
}

impl SharedState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            route_decision: None,
            collected_context: Vec::new(),
            final_answer: None,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn route_decision(&self) -> Option<RouteDecision> {
        self.route_decision
    }

    pub fn collected_context(&self) -> &[ContextItem] {
        &self.collected_context
    }

    pub fn final_answer(&self) -> Option<&str> {
        self.final_answer.as_deref()
    }

    /// True once the terminal step has assigned the answer.
    pub fn is_complete(&self) -> bool {
        self.final_answer.is_some()
    }

    /// Merge an update, rejecting a second assignment to a scalar field.
    pub fn apply(self, update: StateUpdate) -> Result<Self> {
        if let (Some(existing), Some(incoming)) = (self.route_decision, update.route_decision) {
            return Err(TouchlineError::InvariantViolation(format!(
                "route decision already set to '{existing}', refusing reassignment to '{incoming}'"
            )));
        }
        if self.final_answer.is_some() && update.final_answer.is_some() {
            return Err(TouchlineError::InvariantViolation(
                "final answer assigned more than once".to_string(),
            ));
        }
        Ok(merge(self, update))
    }
}

/// Partial state returned by a step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub route_decision: Option<RouteDecision>,
    /// Appended to `collected_context` in order.
    pub context: Vec<ContextItem>,
    pub final_answer: Option<String>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route_decision(mut self, decision: RouteDecision) -> Self {
        self.route_decision = Some(decision);
        self
    }

    pub fn with_context_item(mut self, item: ContextItem) -> Self {
        self.context.push(item);
        self
    }

    pub fn with_final_answer(mut self, answer: impl Into<String>) -> Self {
        self.final_answer = Some(answer.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.route_decision.is_none() && self.context.is_empty() && self.final_answer.is_none()
    }
}

/// Pure per-field merge.
///
/// Scalars are last-assignment-wins, `collected_context` is concatenation.
/// Single assignment is enforced separately by [`SharedState::apply`].
pub fn merge(base: SharedState, update: StateUpdate) -> SharedState {
    let StateUpdate {
        route_decision,
        context,
        final_answer,
    } = update;

    let mut next = base;
    if route_decision.is_some() {
        next.route_decision = route_decision;
    }
    next.collected_context.extend(context);
    if final_answer.is_some() {
        next.final_answer = final_answer;
    }
    next
}
