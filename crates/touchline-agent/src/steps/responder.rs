use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use touchline_core::config::NOT_RELEVANT_ANSWER;
use touchline_core::error::{Result, TouchlineError};
use touchline_core::traits::AnswerGenerator;

use crate::graph::{SharedState, StateUpdate, Step, StepResult};

/// Terminal step: writes the final answer.
///
/// With no collected context the question is treated as out of scope and
/// the fixed answer is returned without calling the generator.
pub struct ResponderStep {
    generator: Arc<dyn AnswerGenerator>,
    not_relevant_answer: String,
}

impl ResponderStep {
    pub fn new(generator: Arc<dyn AnswerGenerator>) -> Self {
        Self {
            generator,
            not_relevant_answer: NOT_RELEVANT_ANSWER.to_string(),
        }
    }

    pub fn with_not_relevant_answer(mut self, answer: impl Into<String>) -> Self {
        self.not_relevant_answer = answer.into();
        self
    }
}

impl Step for ResponderStep {
    fn label(&self) -> &str {
        "Responder"
    }

    fn run<'a>(&'a self, state: &'a SharedState) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            let context = state.collected_context();
            let answer = if context.is_empty() {
                debug!("No context collected, answering as not relevant");
                self.not_relevant_answer.clone()
            } else {
                self.generator
                    .generate(state.question(), context)
                    .await
                    .map_err(|e| match e {
                        TouchlineError::Generation(_) | TouchlineError::Cancelled => e,
                        other => TouchlineError::Generation(other.to_string()),
                    })?
            };
            Ok(StepResult::halt(StateUpdate::new().with_final_answer(answer)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NavigationDirective;
    use touchline_core::types::ContextItem;
    use touchline_test_utils::MockGenerator;

    fn with_context(question: &str, items: usize) -> SharedState {
        let mut update = StateUpdate::new();
        for i in 0..items {
            update = update.with_context_item(ContextItem::tool(format!("{{\"n\":{i}}}")));
        }
        SharedState::new(question).apply(update).unwrap()
    }

    #[tokio::test]
    async fn test_empty_context_skips_generator() {
        let generator = Arc::new(MockGenerator::new());
        let step = ResponderStep::new(generator.clone());

        let result = step
            .run(&SharedState::new("What is the capital of France?"))
            .await
            .unwrap();

        assert_eq!(result.next, NavigationDirective::Halt);
        assert_eq!(result.update.final_answer.as_deref(), Some(NOT_RELEVANT_ANSWER));
        assert_eq!(generator.calls.count(), 0);
    }

    #[tokio::test]
    async fn test_custom_not_relevant_answer() {
        let step = ResponderStep::new(Arc::new(MockGenerator::new()))
            .with_not_relevant_answer("Ask me about football.");
        let result = step.run(&SharedState::new("hi")).await.unwrap();
        assert_eq!(
            result.update.final_answer.as_deref(),
            Some("Ask me about football.")
        );
    }

    #[tokio::test]
    async fn test_generator_sees_all_context() {
        let generator = Arc::new(MockGenerator::new());
        let step = ResponderStep::new(generator.clone());
        let result = step.run(&with_context("Who won?", 2)).await.unwrap();

        assert_eq!(
            result.update.final_answer,
            Some(MockGenerator::answer_for("Who won?", 2))
        );
        assert_eq!(generator.context_sizes(), vec![2]);
    }

    #[tokio::test]
    async fn test_generator_failure_is_generation_fault() {
        let step = ResponderStep::new(Arc::new(MockGenerator::failing("rate limited")));
        let err = step.run(&with_context("q", 1)).await.unwrap_err();
        assert!(matches!(err, TouchlineError::Generation(_)));
    }
}
