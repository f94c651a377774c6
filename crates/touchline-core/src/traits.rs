use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::types::*;

/// LLM client for streaming chat completions.
pub trait LlmClient: Send + Sync + 'static {
    /// Send a chat request and receive a stream of deltas.
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>>;
}

/// Intent classifier used by the router step.
///
/// Returns the raw decision token; decoding into a [`RouteDecision`] is the
/// router's job so that unknown tokens surface as routing faults.
pub trait Classifier: Send + Sync + 'static {
    fn classify<'a>(&'a self, question: &'a str) -> BoxFuture<'a, Result<String>>;
}

/// Web search provider.
pub trait WebSearchProvider: Send + Sync + 'static {
    /// Provider name, used in logs and error markers.
    fn name(&self) -> &str;

    /// Run a search and return the raw result payload.
    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<serde_json::Value>>;
}

/// Domain (football team) data provider.
pub trait DomainDataProvider: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Find teams by full or partial name.
    fn find_by_name<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Vec<TeamRecord>>>;

    /// Look up one team by id. `Ok(None)` means not found.
    fn get_by_id<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<TeamRecord>>>;
}

/// Chooses which domain data lookup answers a question.
pub trait LookupPlanner: Send + Sync + 'static {
    fn plan<'a>(&'a self, question: &'a str) -> BoxFuture<'a, Result<DomainQuery>>;
}

/// Synthesizes the final answer from retrieved context.
pub trait AnswerGenerator: Send + Sync + 'static {
    fn generate<'a>(
        &'a self,
        question: &'a str,
        context: &'a [ContextItem],
    ) -> BoxFuture<'a, Result<String>>;
}
