use futures::future::BoxFuture;
use futures::stream::BoxStream;
use reqwest::Client;

use touchline_core::config::ModelConfig;
use touchline_core::error::{Result, TouchlineError};
use touchline_core::traits::LlmClient;
use touchline_core::types::*;

use super::openai::{send_streaming, ChatRequest};

const DEFAULT_API_VERSION: &str = "2024-06-01";

/// Azure OpenAI client. Uses the same wire format as OpenAI but different
/// endpoint structure and `api-key` header instead of Bearer token.
pub struct AzureClient {
    http: Client,
}

impl AzureClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for AzureClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Chat completions URL for a config. `base_url` overrides the resource
/// host; the deployment falls back to `model_id`.
pub(crate) fn endpoint(config: &ModelConfig) -> Result<String> {
    let deployment = config
        .azure_deployment
        .as_deref()
        .unwrap_or(config.model_id.as_str());
    let api_version = config
        .azure_api_version
        .as_deref()
        .unwrap_or(DEFAULT_API_VERSION);

    let host = match (&config.base_url, &config.azure_resource) {
        (Some(base), _) => base.trim_end_matches('/').to_string(),
        (None, Some(resource)) => format!("https://{resource}.openai.azure.com"),
        (None, None) => {
            return Err(TouchlineError::Config(
                "Azure: azure_resource or base_url is required".into(),
            ))
        }
    };

    Ok(format!(
        "{host}/openai/deployments/{deployment}/chat/completions?api-version={api_version}"
    ))
}

impl LlmClient for AzureClient {
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let url = endpoint(config);
        let api_key = config.api_key.clone();
        let body = ChatRequest::new(config, None, messages, tools);

        Box::pin(async move {
            let url = url?;
            let api_key = api_key
                .ok_or_else(|| TouchlineError::Config("Azure: api_key is required".into()))?;

            let req = self
                .http
                .post(&url)
                .header("api-key", api_key)
                .json(&body);
            send_streaming(req).await
        })
    }
}
