use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use touchline_core::error::Result;
use touchline_core::traits::WebSearchProvider;
use touchline_core::types::ContextItem;

use crate::graph::{SharedState, StateUpdate, Step, StepId, StepResult};

/// Retrieval step backed by a web search provider.
///
/// Always contributes exactly one context item. A provider failure becomes
/// an error marker instead of failing the run.
pub struct WebSearchStep {
    provider: Arc<dyn WebSearchProvider>,
    query_prefix: String,
    next: StepId,
}

impl WebSearchStep {
    pub fn new(provider: Arc<dyn WebSearchProvider>, next: impl Into<StepId>) -> Self {
        Self {
            provider,
            query_prefix: String::new(),
            next: next.into(),
        }
    }

    /// Words prepended to every query to keep results on topic.
    pub fn with_query_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.query_prefix = prefix.into();
        self
    }

    fn query_for(&self, question: &str) -> String {
        format!("{} {}", self.query_prefix, question)
            .trim()
            .to_string()
    }
}

impl Step for WebSearchStep {
    fn label(&self) -> &str {
        "Web search"
    }

    fn run<'a>(&'a self, state: &'a SharedState) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            let query = self.query_for(state.question());
            let item = match self.provider.search(&query).await {
                Ok(raw) => {
                    debug!(provider = self.provider.name(), "Web search returned");
                    ContextItem::tool(raw.to_string())
                }
                Err(e) => {
                    warn!(provider = self.provider.name(), error = %e, "Web search failed");
                    ContextItem::error_marker(self.provider.name(), &e.to_string())
                }
            };
            Ok(StepResult::goto(
                StateUpdate::new().with_context_item(item),
                self.next.clone(),
            ))
        })
    }
}
