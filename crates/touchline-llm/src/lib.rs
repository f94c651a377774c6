pub mod classifier;
pub mod generator;
pub mod planner;
pub mod providers;
pub mod response;
pub mod retry;
pub mod streaming;

use std::sync::Arc;

use touchline_core::config::{AppConfig, ModelConfig};
use touchline_core::traits::LlmClient;

pub use classifier::LlmClassifier;
pub use generator::LlmAnswerGenerator;
pub use planner::LlmLookupPlanner;
pub use providers::{AzureClient, OpenAiClient};
pub use retry::RetryingClient;

/// Create an LLM client based on the provider name.
pub fn create_client(config: &ModelConfig) -> Box<dyn LlmClient> {
    match config.provider.as_str() {
        "azure" | "azure-openai" => Box::new(AzureClient::new()),
        // Everything else uses the OpenAI-compatible client
        _ => Box::new(OpenAiClient::new()),
    }
}

/// Client for the configured model, wrapped with retries and fallbacks
/// when either is configured.
pub fn build_client(config: &AppConfig) -> Arc<dyn LlmClient> {
    let primary = create_client(&config.model);
    if config.model.retry.is_none() && config.fallback_models.is_empty() {
        return Arc::from(primary);
    }
    let fallbacks = config
        .fallback_models
        .iter()
        .map(|m| (m.clone(), create_client(m)))
        .collect();
    Arc::new(RetryingClient::new(
        primary,
        fallbacks,
        config.model.retry.clone().unwrap_or_default(),
    ))
}
