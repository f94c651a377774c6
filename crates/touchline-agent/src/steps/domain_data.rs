use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use touchline_core::error::Result;
use touchline_core::traits::{DomainDataProvider, LookupPlanner};
use touchline_core::types::{ContextItem, DomainQuery, TeamRecord};

use crate::graph::{SharedState, StateUpdate, Step, StepId, StepResult};

/// Retrieval step backed by the team data provider.
///
/// A planner picks the lookup (by name or by id), the provider runs it.
/// Like web search, any failure is absorbed into an error marker.
pub struct DomainDataStep {
    provider: Arc<dyn DomainDataProvider>,
    planner: Arc<dyn LookupPlanner>,
    next: StepId,
}

impl DomainDataStep {
    pub fn new(
        provider: Arc<dyn DomainDataProvider>,
        planner: Arc<dyn LookupPlanner>,
        next: impl Into<StepId>,
    ) -> Self {
        Self {
            provider,
            planner,
            next: next.into(),
        }
    }

    async fn lookup(&self, question: &str) -> Result<(DomainQuery, Vec<TeamRecord>)> {
        let query = self.planner.plan(question).await?;
        let teams = match &query {
            DomainQuery::ByName { name } => self.provider.find_by_name(name).await?,
            DomainQuery::ById { id } => self.provider.get_by_id(id).await?.into_iter().collect(),
        };
        Ok((query, teams))
    }
}

impl Step for DomainDataStep {
    fn label(&self) -> &str {
        "Team data"
    }

    fn run<'a>(&'a self, state: &'a SharedState) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            let item = match self.lookup(state.question()).await {
                Ok((query, teams)) => {
                    debug!(provider = self.provider.name(), found = teams.len(), "Team lookup returned");
                    let payload = serde_json::json!({ "query": query, "teams": teams });
                    ContextItem::tool(payload.to_string())
                }
                Err(e) => {
                    warn!(provider = self.provider.name(), error = %e, "Team lookup failed");
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
