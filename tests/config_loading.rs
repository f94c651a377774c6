use std::io::Write;
use std::path::Path;

use touchline_core::config::{AppConfig, NOT_RELEVANT_ANSWER};
use touchline_core::error::TouchlineError;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(content.as_bytes()).expect("write config");
    tmp
}

#[test]
fn test_load_full_config_from_file() {
    let tmp = write_config(
        r#"
[model]
provider = "azure"
model_id = "gpt-4o"
api_key = "az-test-key"
azure_resource = "touchline-dev"
azure_deployment = "gpt-4o-prod"
azure_api_version = "2024-12-01-preview"
max_tokens = 512
temperature = 0.3
top_p = 0.8

[model.retry]
max_retries = 5
initial_backoff_ms = 200

[[fallback_models]]
provider = "openai"
model_id = "gpt-4o-mini"
api_key = "sk-fallback"

[web_search]
api_key = "tvly-test"
topic = "news"
query_prefix = "premier league"
max_results = 3

[sports_data]
base_url = "http://localhost:9000/api/v1/json"
api_key = "123"
timeout_secs = 4

[gateway]
bind = "0.0.0.0:9999"

[workflow]
not_relevant_answer = "Ask me about football."
event_capacity = 64
"#,
    );

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.model_id, "gpt-4o");
    assert_eq!(config.model.azure_resource.as_deref(), Some("touchline-dev"));
    assert_eq!(config.model.azure_deployment.as_deref(), Some("gpt-4o-prod"));
    assert_eq!(config.model.max_tokens, 512);
    let retry = config.model.retry.as_ref().expect("retry section");
    assert_eq!(retry.max_retries, 5);
    assert_eq!(retry.initial_backoff_ms, 200);
    assert_eq!(retry.max_backoff_ms, 30000);

    assert_eq!(config.fallback_models.len(), 1);
    assert_eq!(config.fallback_models[0].provider, "openai");

    assert_eq!(config.web_search.topic, "news");
    assert_eq!(config.web_search.query_prefix, "premier league");
    assert_eq!(config.web_search.max_results, 3);

    assert_eq!(config.sports_data.base_url, "http://localhost:9000/api/v1/json");
    assert_eq!(config.sports_data.timeout_secs, 4);
    assert_eq!(config.sports_data.connect_timeout_secs, 5);

    assert_eq!(config.gateway.bind, "0.0.0.0:9999");
    assert_eq!(config.workflow.not_relevant_answer, "Ask me about football.");
    assert_eq!(config.workflow.event_capacity, 64);
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("TOUCHLINE_TEST_TAVILY_KEY", "tvly-from-env");
    let tmp = write_config(
        r#"
[model]
model_id = "gpt-35-turbo"

[web_search]
api_key = "${TOUCHLINE_TEST_TAVILY_KEY}"
"#,
    );

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.web_search.api_key, "tvly-from-env");
    std::env::remove_var("TOUCHLINE_TEST_TAVILY_KEY");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let tmp = write_config(
        r#"
[model]
model_id = "gpt-35-turbo"

[web_search]
api_key = "tvly-test"
"#,
    );

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.model.provider, "azure");
    assert!(config.model.retry.is_none());
    assert!(config.fallback_models.is_empty());
    assert_eq!(config.web_search.topic, "general");
    assert_eq!(config.web_search.max_results, 5);
    assert_eq!(config.sports_data.base_url, "https://www.thesportsdb.com/api/v1/json");
    assert_eq!(config.workflow.not_relevant_answer, NOT_RELEVANT_ANSWER);
    assert_eq!(config.workflow.event_capacity, 256);
}

#[test]
fn test_missing_file_is_config_not_found() {
    let err = AppConfig::load(Path::new("/nonexistent/touchline.toml")).unwrap_err();
    assert!(matches!(err, TouchlineError::ConfigNotFound(_)));
}

#[test]
fn test_invalid_toml_is_config_error() {
    let tmp = write_config("[model\nmodel_id = ");
    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert!(matches!(err, TouchlineError::Config(_)));
}

#[test]
fn test_config_roundtrips_through_pretty_toml() {
    let tmp = write_config(
        r#"
[model]
model_id = "gpt-35-turbo"
azure_resource = "touchline"

[web_search]
api_key = "tvly-test"
"#,
    );
    let config = AppConfig::load(tmp.path()).expect("load config");

    let rendered = toml::to_string_pretty(&config).expect("render config");
    let reparsed = AppConfig::parse(&rendered).expect("reparse config");
    assert_eq!(reparsed.model.azure_resource.as_deref(), Some("touchline"));
    assert_eq!(reparsed.gateway.bind, config.gateway.bind);
}

#[test]
fn test_example_config_parses() {
    let config = AppConfig::parse(include_str!("../touchline.toml.example"))
        .expect("example config parses");
    assert_eq!(config.model.azure_resource.as_deref(), Some("my-resource"));
    assert_eq!(config.web_search.query_prefix, "football soccer");
    assert_eq!(config.workflow.not_relevant_answer, NOT_RELEVANT_ANSWER);
}
