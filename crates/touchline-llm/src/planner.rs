use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use touchline_core::config::ModelConfig;
use touchline_core::error::{Result, TouchlineError};
use touchline_core::traits::{LlmClient, LookupPlanner};
use touchline_core::types::{ChatMessage, DomainQuery, ToolDefinition};

use crate::response::{self, ToolCall};

pub const SEARCH_TEAMS_TOOL: &str = "search_teams_by_name";
pub const TEAM_DETAILS_TOOL: &str = "get_team_details_by_id";

const PLANNER_PROMPT: &str = "You pick the football team lookup that answers the user's question. \
Call exactly one tool. Use search_teams_by_name with the team's name unless the question \
gives a numeric team id. Do not answer the question yourself.";

/// Chooses a team lookup by letting the model call one of two tools.
pub struct LlmLookupPlanner {
    client: Arc<dyn LlmClient>,
    config: ModelConfig,
    tools: Vec<ToolDefinition>,
}

impl LlmLookupPlanner {
    pub fn new(client: Arc<dyn LlmClient>, config: ModelConfig) -> Self {
        Self {
            client,
            config,
            tools: lookup_tools(),
        }
    }
}

pub fn lookup_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: SEARCH_TEAMS_TOOL.to_string(),
            description: "Search for soccer teams by full or partial name".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "team_name": {
                        "type": "string",
                        "description": "Full or partial team name, e.g. Arsenal"
                    }
                },
                "required": ["team_name"]
            }),
        },
        ToolDefinition {
            name: TEAM_DETAILS_TOOL.to_string(),
            description: "Get detailed information for a soccer team by its id".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "team_id": {
                        "type": "string",
                        "description": "TheSportsDB team id, e.g. 133604"
                    }
                },
                "required": ["team_id"]
            }),
        },
    ]
}

fn string_arg(call: &ToolCall, key: &str) -> Result<String> {
    call.input
        .get(key)
        .and_then(|v| match v {
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            TouchlineError::LlmParse(format!("'{}' call is missing '{key}'", call.name))
        })
}

pub(crate) fn query_from_call(call: &ToolCall) -> Result<DomainQuery> {
    match call.name.as_str() {
        SEARCH_TEAMS_TOOL => Ok(DomainQuery::ByName {
            name: string_arg(call, "team_name")?,
        }),
        TEAM_DETAILS_TOOL => Ok(DomainQuery::ById {
            id: string_arg(call, "team_id")?,
        }),
        other => Err(TouchlineError::LlmParse(format!("unknown lookup tool '{other}'"))),
    }
}

impl LookupPlanner for LlmLookupPlanner {
    fn plan<'a>(&'a self, question: &'a str) -> BoxFuture<'a, Result<DomainQuery>> {
        Box::pin(async move {
            let messages = vec![ChatMessage::system(PLANNER_PROMPT), ChatMessage::user(question)];
            let stream = self
                .client
                .chat_stream(&self.config, messages, &self.tools)
                .await?;
            let completed = response::collect(stream).await?;
            let call = completed.tool_calls.first().ok_or_else(|| {
                TouchlineError::LlmParse("model did not call a lookup tool".into())
            })?;
            let query = query_from_call(call)?;
            debug!(?query, "Lookup planned");
            Ok(query)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{model_config, ScriptedLlm};

    fn call(name: &str, input: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "c1".into(),
            name: name.into(),
            input,
        }
    }

    #[test]
    fn test_query_from_calls() {
        assert_eq!(
            query_from_call(&call(SEARCH_TEAMS_TOOL, serde_json::json!({"team_name": " Arsenal "})))
                .unwrap(),
            DomainQuery::ByName {
                name: "Arsenal".into()
            }
        );
        assert_eq!(
            query_from_call(&call(TEAM_DETAILS_TOOL, serde_json::json!({"team_id": 133604})))
                .unwrap(),
            DomainQuery::ById {
                id: "133604".into()
            }
        );
        assert!(query_from_call(&call(SEARCH_TEAMS_TOOL, serde_json::json!({}))).is_err());
        assert!(query_from_call(&call("get_weather", serde_json::json!({}))).is_err());
    }

    #[tokio::test]
    async fn test_plan_sends_tools_and_reads_call() {
        let llm = Arc::new(ScriptedLlm::tool_call(
            SEARCH_TEAMS_TOOL,
            r#"{"team_name":"Barcelona"}"#,
        ));
        let planner = LlmLookupPlanner::new(llm.clone(), model_config());

        let query = planner.plan("When was Barcelona founded?").await.unwrap();

        assert_eq!(
            query,
            DomainQuery::ByName {
                name: "Barcelona".into()
            }
        );
        assert_eq!(llm.tool_counts(), vec![2]);
    }

    #[tokio::test]
    async fn test_plan_without_tool_call_fails() {
        let planner = LlmLookupPlanner::new(Arc::new(ScriptedLlm::text("Arsenal")), model_config());
        let err = planner.plan("q").await.unwrap_err();
        assert!(matches!(err, TouchlineError::LlmParse(_)));
    }
}
