use std::collections::BTreeMap;

use futures::stream::{BoxStream, StreamExt};
use tracing::debug;

use touchline_core::error::{Result, TouchlineError};
use touchline_core::types::{StopReason, StreamDelta};

/// A tool call assembled from streamed fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// A fully drained chat completion.
#[derive(Debug, Clone, Default)]
pub struct CompletedResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: Option<StopReason>,
}

#[derive(Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Drain a delta stream into text and tool calls.
///
/// Tool arguments are buffered per call index and parsed once the stream
/// ends; empty arguments decode to `{}`.
pub async fn collect(mut stream: BoxStream<'_, Result<StreamDelta>>) -> Result<CompletedResponse> {
    let mut response = CompletedResponse::default();
    let mut calls: BTreeMap<usize, PartialCall> = BTreeMap::new();

    while let Some(delta) = stream.next().await {
        match delta? {
            StreamDelta::TextDelta(text) => response.text.push_str(&text),
            StreamDelta::ToolUseStart { index, id, name } => {
                let call = calls.entry(index).or_default();
                call.id = id;
                call.name = name;
            }
            StreamDelta::ToolInputDelta { index, delta } => {
                calls.entry(index).or_default().arguments.push_str(&delta);
            }
            StreamDelta::Stop(reason) => response.stop_reason = Some(reason),
            StreamDelta::Usage {
                input_tokens,
                output_tokens,
            } => debug!(input_tokens, output_tokens, "Completion usage"),
        }
    }

    for (index, call) in calls {
        if call.name.is_empty() {
            return Err(TouchlineError::LlmParse(format!(
                "tool call {index} has arguments but no name"
            )));
        }
        let input = if call.arguments.trim().is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str(&call.arguments).map_err(|e| {
                TouchlineError::LlmParse(format!("arguments for '{}': {e}", call.name))
            })?
        };
        response.tool_calls.push(ToolCall {
            id: call.id,
            name: call.name,
            input,
        });
    }

    Ok(response)
}
