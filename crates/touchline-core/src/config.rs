use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TouchlineError};

/// Top-level Touchline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub fallback_models: Vec<ModelConfig>,
    pub web_search: WebSearchConfig,
    #[serde(default)]
    pub sports_data: SportsDataConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Azure resource name (`<resource>.openai.azure.com`).
    #[serde(default)]
    pub azure_resource: Option<String>,
    /// Azure deployment name. Falls back to `model_id`.
    #[serde(default)]
    pub azure_deployment: Option<String>,
    #[serde(default)]
    pub azure_api_version: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

fn default_provider() -> String { "azure".to_string() }
fn default_max_tokens() -> u32 { 200 }
fn default_temperature() -> f32 { 0.15 }
fn default_top_p() -> f32 { 0.9 }

/// Retry configuration for LLM requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

/// Web search provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default = "default_search_provider")]
    pub provider: String,
    pub api_key: String,
    #[serde(default = "default_search_topic")]
    pub topic: String,
    /// Prepended to every question before searching.
    #[serde(default = "default_query_prefix")]
    pub query_prefix: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

fn default_search_provider() -> String { "tavily".to_string() }
fn default_search_topic() -> String { "general".to_string() }
fn default_query_prefix() -> String { "football soccer".to_string() }
fn default_max_results() -> u32 { 5 }

/// TheSportsDB client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SportsDataConfig {
    #[serde(default = "default_sports_base_url")]
    pub base_url: String,
    #[serde(default = "default_sports_api_key")]
    pub api_key: String,
    #[serde(default = "default_sports_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_sports_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for SportsDataConfig {
    fn default() -> Self {
        Self {
            base_url: default_sports_base_url(),
            api_key: default_sports_api_key(),
            timeout_secs: default_sports_timeout(),
            connect_timeout_secs: default_sports_connect_timeout(),
        }
    }
}

fn default_sports_base_url() -> String { "https://www.thesportsdb.com/api/v1/json".to_string() }
fn default_sports_api_key() -> String { "3".to_string() }
fn default_sports_timeout() -> u64 { 10 }
fn default_sports_connect_timeout() -> u64 { 5 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String { "127.0.0.1:8000".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Answer returned when no context was collected.
    #[serde(default = "default_not_relevant_answer")]
    pub not_relevant_answer: String,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            not_relevant_answer: default_not_relevant_answer(),
            event_capacity: default_event_capacity(),
        }
    }
}

pub const NOT_RELEVANT_ANSWER: &str = "This question is not relevant to the system.";

fn default_not_relevant_answer() -> String { NOT_RELEVANT_ANSWER.to_string() }
fn default_event_capacity() -> usize { 256 }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| TouchlineError::ConfigNotFound(path.display().to_string()))?;

        Self::parse(&content)
    }

    /// Parse config from TOML text, expanding `${ENV_VAR}` references first.
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);

        toml::from_str(&expanded)
            .map_err(|e| TouchlineError::Config(e.to_string()))
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}
