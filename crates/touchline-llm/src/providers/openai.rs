use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

use touchline_core::config::ModelConfig;
use touchline_core::error::{Result, TouchlineError};
use touchline_core::traits::LlmClient;
use touchline_core::types::*;

use crate::streaming::{SseEvent, SseStream};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible client. Works with OpenAI, Ollama, vLLM, Groq, OpenRouter, etc.
pub struct OpenAiClient {
    http: Client,
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

// Request types
#[derive(Serialize)]
pub(crate) struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<OaiMessage>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OaiTool>,
}

impl ChatRequest {
    /// Streaming request body. `model` is omitted for deployment-addressed
    /// endpoints such as Azure.
    pub(crate) fn new(
        config: &ModelConfig,
        model: Option<String>,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> Self {
        Self {
            model,
            messages: convert_messages(messages),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            stream: true,
            tools: convert_tools(tools),
        }
    }
}

#[derive(Serialize, Debug)]
pub(crate) struct OaiMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OaiToolCall>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct OaiToolCall {
    #[serde(default)]
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    r#type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function: Option<OaiFunction>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct OaiFunction {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    arguments: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct OaiTool {
    r#type: &'static str,
    function: OaiToolDef,
}

#[derive(Serialize)]
pub(crate) struct OaiToolDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

// Response types
#[derive(Deserialize, Debug)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<StreamUsage>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDeltaContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamDeltaContent {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OaiToolCall>>,
}

#[derive(Deserialize, Debug)]
struct StreamUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

pub(crate) fn convert_tools(tools: &[ToolDefinition]) -> Vec<OaiTool> {
    tools
        .iter()
        .map(|t| OaiTool {
            r#type: "function",
            function: OaiToolDef {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.input_schema.clone(),
            },
        })
        .collect()
}

pub(crate) fn convert_messages(messages: Vec<ChatMessage>) -> Vec<OaiMessage> {
    messages
        .into_iter()
        .map(|msg| {
            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            let calls: Vec<OaiToolCall> = msg
                .content
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolUse { id, name, input } => Some((id, name, input)),
                    ContentBlock::Text { .. } => None,
                })
                .enumerate()
                .map(|(i, (id, name, input))| OaiToolCall {
                    index: i,
                    id: Some(id.clone()),
                    r#type: Some("function".to_string()),
                    function: Some(OaiFunction {
                        name: Some(name.clone()),
                        arguments: Some(input.to_string()),
                    }),
                })
                .collect();
            let text = msg.text();
            OaiMessage {
                role,
                content: if text.is_empty() && !calls.is_empty() {
                    None
                } else {
                    Some(text)
                },
                tool_calls: if calls.is_empty() { None } else { Some(calls) },
            }
        })
        .collect()
}

pub(crate) fn parse_chunk(event: SseEvent) -> Vec<Result<StreamDelta>> {
    if event.data.trim() == "[DONE]" {
        return vec![];
    }

    let chunk: StreamChunk = match serde_json::from_str(&event.data) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!(data = %event.data, error = %e, "Failed to parse chat completion chunk");
            return vec![];
        }
    };

    let mut deltas = Vec::new();
    if let Some(usage) = chunk.usage {
        deltas.push(Ok(StreamDelta::Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }));
    }

    // Azure sends a leading chunk with only content-filter results.
    let Some(choice) = chunk.choices.into_iter().next() else {
        return deltas;
    };

    if let Some(delta) = choice.delta {
        if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
            deltas.push(Ok(StreamDelta::TextDelta(text)));
        }
        // Some providers send name and arguments in the same chunk.
        for tc in delta.tool_calls.unwrap_or_default() {
            let Some(func) = tc.function else { continue };
            if let Some(name) = func.name {
                deltas.push(Ok(StreamDelta::ToolUseStart {
                    index: tc.index,
                    id: tc.id.unwrap_or_default(),
                    name,
                }));
            }
            if let Some(args) = func.arguments.filter(|a| !a.is_empty()) {
                deltas.push(Ok(StreamDelta::ToolInputDelta {
                    index: tc.index,
                    delta: args,
                }));
            }
        }
    }

    if let Some(reason) = choice.finish_reason {
        let stop = match reason.as_str() {
            "tool_calls" | "function_call" => StopReason::ToolUse,
            "length" => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        };
        deltas.push(Ok(StreamDelta::Stop(stop)));
    }

    deltas
}

/// Send a prepared request and turn the SSE body into deltas.
pub(crate) async fn send_streaming<'a>(
    request: RequestBuilder,
) -> Result<BoxStream<'a, Result<StreamDelta>>> {
    let response = request
        .send()
        .await
        .map_err(|e| TouchlineError::LlmRequest(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        return Err(TouchlineError::LlmRequest(format!("HTTP {}: {}", status, body)));
    }

    let delta_stream = SseStream::new(response.bytes_stream())
        .map(|event| match event {
            Ok(event) => futures::stream::iter(parse_chunk(event)),
            Err(e) => futures::stream::iter(vec![Err(e)]),
        })
        .flatten();

    Ok(Box::pin(delta_stream))
}

impl LlmClient for OpenAiClient {
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let body = ChatRequest::new(config, Some(config.model_id.clone()), messages, tools);
        let url = config
            .base_url
            .clone()
            .unwrap_or_else(|| OPENAI_API_URL.to_string());
        let api_key = config.api_key.clone();

        Box::pin(async move {
            let mut req = self.http.post(&url).json(&body);
            if let Some(api_key) = api_key {
                req = req.header("Authorization", format!("Bearer {}", api_key));
            }
            send_streaming(req).await
        })
    }
}
