use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use touchline_core::error::{Result, TouchlineError};
use touchline_core::traits::Classifier;
use touchline_core::types::RouteDecision;

use crate::graph::{NavigationDirective, SharedState, StateUpdate, Step, StepId, StepResult};

/// The steps a route decision can dispatch to.
#[derive(Debug, Clone)]
pub struct RouteTargets {
    pub web_search: StepId,
    pub domain_data: StepId,
    pub responder: StepId,
}

impl RouteTargets {
    pub fn directive(&self, decision: RouteDecision) -> NavigationDirective {
        match decision {
            RouteDecision::ConversationOnly => NavigationDirective::GoTo(self.responder.clone()),
            RouteDecision::WebSearch => NavigationDirective::GoTo(self.web_search.clone()),
            RouteDecision::DomainData => NavigationDirective::GoTo(self.domain_data.clone()),
            RouteDecision::Both => NavigationDirective::FanOut {
                branches: vec![self.web_search.clone(), self.domain_data.clone()],
                barrier: self.responder.clone(),
            },
        }
    }
}

/// Entry step: classifies the question and dispatches.
pub struct RouterStep {
    classifier: Arc<dyn Classifier>,
    targets: RouteTargets,
}

impl RouterStep {
    pub fn new(classifier: Arc<dyn Classifier>, targets: RouteTargets) -> Self {
        Self {
            classifier,
            targets,
        }
    }

    async fn decide(&self, question: &str) -> Result<RouteDecision> {
        let token = self.classifier.classify(question).await.map_err(|e| match e {
            TouchlineError::Routing(_) | TouchlineError::Cancelled => e,
            other => TouchlineError::Routing(format!("classifier failed: {other}")),
        })?;
        token.parse::<RouteDecision>().inspect_err(|_| {
            warn!(token = %token.trim(), "Classifier returned an unknown route");
        })
    }
}

impl Step for RouterStep {
    fn label(&self) -> &str {
        "Supervisor"
    }

    fn run<'a>(&'a self, state: &'a SharedState) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            let decision = self.decide(state.question()).await?;
            debug!(%decision, "Question routed");
            Ok(StepResult::new(
                StateUpdate::new().with_route_decision(decision),
                self.targets.directive(decision),
            ))
        })
    }
}
