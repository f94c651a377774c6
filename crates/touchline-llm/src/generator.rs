use std::sync::Arc;

use futures::future::BoxFuture;

use touchline_core::config::ModelConfig;
use touchline_core::error::{Result, TouchlineError};
use touchline_core::traits::{AnswerGenerator, LlmClient};
use touchline_core::types::{ChatMessage, ContextItem};

use crate::response;

/// Writes the final answer from the collected context.
pub struct LlmAnswerGenerator {
    client: Arc<dyn LlmClient>,
    config: ModelConfig,
}

impl LlmAnswerGenerator {
    pub fn new(client: Arc<dyn LlmClient>, config: ModelConfig) -> Self {
        Self { client, config }
    }
}

fn render_context(context: &[ContextItem]) -> String {
    let items: Vec<serde_json::Value> = context
        .iter()
        .map(|item| {
            let content = serde_json::from_str::<serde_json::Value>(&item.content)
                .unwrap_or_else(|_| serde_json::Value::String(item.content.clone()));
            serde_json::json!({
                "role": item.role,
                "content": content,
                "tool_call_id": item.correlation_id,
            })
        })
        .collect();
    serde_json::Value::Array(items).to_string()
}

pub(crate) fn response_prompt(question: &str, context: &[ContextItem]) -> String {
    format!(
        "You are a football assistant.\n\n\
RULES:\n\
- Use the context data to give a concise, helpful answer to the user question.\n\
- Entries with an \"error\" field are sources that failed; ignore them.\n\
- If the context does not contain the answer, say so instead of guessing.\n\n\
User question: {question}\n\
Context data: {}\n\n\
Response:",
        render_context(context)
    )
}

impl AnswerGenerator for LlmAnswerGenerator {
    fn generate<'a>(
        &'a self,
        question: &'a str,
        context: &'a [ContextItem],
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let messages = vec![ChatMessage::user(response_prompt(question, context))];
            let stream = self.client.chat_stream(&self.config, messages, &[]).await?;
            let answer = response::collect(stream).await?.text.trim().to_string();
            if answer.is_empty() {
                return Err(TouchlineError::Generation("model returned an empty answer".into()));
            }
            Ok(answer)
        })
    }
}
