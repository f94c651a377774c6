//! Scripted collaborators for exercising the workflow without network calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;

use touchline_core::error::{Result, TouchlineError};
use touchline_core::traits::{
    AnswerGenerator, Classifier, DomainDataProvider, LookupPlanner, WebSearchProvider,
};
use touchline_core::types::{ContextItem, DomainQuery, TeamRecord};

/// Shared call counter.
#[derive(Debug, Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn provider_error(provider: &str, message: &str) -> TouchlineError {
    TouchlineError::Provider {
        provider: provider.to_string(),
        message: message.to_string(),
    }
}

/// Classifier that always answers with the same token (or error).
pub struct ScriptedClassifier {
    outcome: std::result::Result<String, String>,
    pub calls: Calls,
}

impl ScriptedClassifier {
    pub fn returning(token: &str) -> Self {
        Self {
            outcome: Ok(token.to_string()),
            calls: Calls::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            calls: Calls::default(),
        }
    }
}

impl Classifier for ScriptedClassifier {
    fn classify<'a>(&'a self, _question: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.calls.hit();
            self.outcome
                .clone()
                .map_err(TouchlineError::LlmRequest)
        })
    }
}

/// Web search double returning a fixed payload.
pub struct MockSearch {
    response: std::result::Result<serde_json::Value, String>,
    delay: Duration,
    queries: Mutex<Vec<String>>,
    pub calls: Calls,
}

impl MockSearch {
    pub fn returning(payload: serde_json::Value) -> Self {
        Self {
            response: Ok(payload),
            delay: Duration::ZERO,
            queries: Mutex::new(Vec::new()),
            calls: Calls::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            delay: Duration::ZERO,
            queries: Mutex::new(Vec::new()),
            calls: Calls::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queries received so far.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

impl WebSearchProvider for MockSearch {
    fn name(&self) -> &str {
        "mock-search"
    }

    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<serde_json::Value>> {
        Box::pin(async move {
            self.calls.hit();
            if let Ok(mut q) = self.queries.lock() {
                q.push(query.to_string());
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.response
                .clone()
                .map_err(|m| provider_error("mock-search", &m))
        })
    }
}

/// Domain data double backed by an in-memory team list.
pub struct MockDomainData {
    teams: Vec<TeamRecord>,
    failure: Option<String>,
    delay: Duration,
    pub calls: Calls,
}

impl MockDomainData {
    pub fn with_teams(teams: Vec<TeamRecord>) -> Self {
        Self {
            teams,
            failure: None,
            delay: Duration::ZERO,
            calls: Calls::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            teams: Vec::new(),
            failure: Some(message.to_string()),
            delay: Duration::ZERO,
            calls: Calls::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn pause(&self) -> Result<()> {
        self.calls.hit();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(message) => Err(provider_error("mock-sportsdb", message)),
            None => Ok(()),
        }
    }
}

impl DomainDataProvider for MockDomainData {
    fn name(&self) -> &str {
        "mock-sportsdb"
    }

    fn find_by_name<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Vec<TeamRecord>>> {
        Box::pin(async move {
            self.pause().await?;
            let needle = name.to_lowercase();
            Ok(self
                .teams
                .iter()
                .filter(|t| t.team_name.to_lowercase().contains(&needle))
                .cloned()
                .collect())
        })
    }

    fn get_by_id<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<TeamRecord>>> {
        Box::pin(async move {
            self.pause().await?;
            Ok(self.teams.iter().find(|t| t.team_id == id).cloned())
        })
    }
}

/// Planner that always picks the same lookup.
pub struct FixedPlanner {
    query: std::result::Result<DomainQuery, String>,
}

impl FixedPlanner {
    pub fn by_name(name: &str) -> Self {
        Self {
            query: Ok(DomainQuery::ByName {
                name: name.to_string(),
            }),
        }
    }

    pub fn by_id(id: &str) -> Self {
        Self {
            query: Ok(DomainQuery::ById { id: id.to_string() }),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            query: Err(message.to_string()),
        }
    }
}

impl LookupPlanner for FixedPlanner {
    fn plan<'a>(&'a self, _question: &'a str) -> BoxFuture<'a, Result<DomainQuery>> {
        Box::pin(async move { self.query.clone().map_err(TouchlineError::LlmRequest) })
    }
}

/// Generator that reports how much context it saw.
pub struct MockGenerator {
    failure: Option<String>,
    seen: Mutex<Vec<usize>>,
    pub calls: Calls,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            failure: None,
            seen: Mutex::new(Vec::new()),
            calls: Calls::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            seen: Mutex::new(Vec::new()),
            calls: Calls::default(),
        }
    }

    /// Context sizes passed to each `generate` call.
    pub fn context_sizes(&self) -> Vec<usize> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// The answer produced for a question and a number of context items.
    pub fn answer_for(question: &str, items: usize) -> String {
        format!("answer to '{question}' from {items} item(s)")
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl AnswerGenerator for MockGenerator {
    fn generate<'a>(
        &'a self,
        question: &'a str,
        context: &'a [ContextItem],
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.calls.hit();
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(context.len());
            }
            match &self.failure {
                Some(message) => Err(TouchlineError::LlmRequest(message.clone())),
                None => Ok(Self::answer_for(question, context.len())),
            }
        })
    }
}

/// A couple of teams for lookups.
pub fn sample_teams() -> Vec<TeamRecord> {
    let mut arsenal = TeamRecord::new("133604", "Arsenal");
    arsenal.league_name = Some("English Premier League".to_string());
    arsenal.stadium_name = Some("Emirates Stadium".to_string());
    arsenal.formation_year = Some("1892".to_string());

    let mut barcelona = TeamRecord::new("133739", "Barcelona");
    barcelona.league_name = Some("Spanish La Liga".to_string());
    barcelona.stadium_name = Some("Camp Nou".to_string());

    vec![arsenal, barcelona]
}
