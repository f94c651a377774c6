use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use touchline_core::config::ModelConfig;
use touchline_core::error::Result;
use touchline_core::traits::{Classifier, LlmClient};
use touchline_core::types::ChatMessage;

use crate::response;

/// Routes questions by asking the model for a single decision token.
pub struct LlmClassifier {
    client: Arc<dyn LlmClient>,
    config: ModelConfig,
}

impl LlmClassifier {
    pub fn new(client: Arc<dyn LlmClient>, config: ModelConfig) -> Self {
        Self { client, config }
    }
}

pub(crate) fn routing_prompt(question: &str) -> String {
    format!(
        "You route questions for a football (soccer) assistant. Decide whether the \
user's question is about football and which sources should answer it.\n\n\
FOOTBALL TOPICS include teams, players, matches, scores, leagues, transfers, \
statistics, fixtures, results and standings.\n\n\
User question: \"{question}\"\n\n\
Available tokens:\n\
conversation - the question is NOT about football\n\
search - football question best answered by a web search\n\
stats - football question about a specific team's details (stadium, league, founding year)\n\
both - football question that needs both sources\n\n\
Output ONLY the token, nothing else:"
    )
}

impl Classifier for LlmClassifier {
    fn classify<'a>(&'a self, question: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let messages = vec![ChatMessage::user(routing_prompt(question))];
            let stream = self.client.chat_stream(&self.config, messages, &[]).await?;
            let token = response::collect(stream).await?.text.trim().to_lowercase();
            debug!(token = %token, "Classifier answered");
            Ok(token)
        })
    }
}
