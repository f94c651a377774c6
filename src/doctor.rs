use std::net::SocketAddr;

use touchline_core::config::AppConfig;

struct CheckResult {
    label: &'static str,
    ok: bool,
    detail: String,
}

impl CheckResult {
    fn pass(label: &'static str, detail: impl Into<String>) -> Self {
        Self {
            label,
            ok: true,
            detail: detail.into(),
        }
    }

    fn fail(label: &'static str, detail: impl Into<String>) -> Self {
        Self {
            label,
            ok: false,
            detail: detail.into(),
        }
    }
}

/// Print configuration checks. Returns the number of issues found.
pub fn run_doctor(config: &AppConfig) -> usize {
    let checks = run_checks(config);

    let mut fail_count = 0;
    for check in &checks {
        let icon = if check.ok { "[OK]" } else { "[!!]" };
        println!("  {} {}: {}", icon, check.label, check.detail);
        if !check.ok {
            fail_count += 1;
        }
    }

    println!();
    println!("  {} passed, {} issues found", checks.len() - fail_count, fail_count);
    fail_count
}

fn run_checks(config: &AppConfig) -> Vec<CheckResult> {
    vec![
        check_api_key(config),
        check_model_endpoint(config),
        check_web_search(config),
        check_sports_data(config),
        check_gateway(config),
        check_retry(config),
    ]
}

/// A secret that is set and not an unexpanded `${VAR}` reference.
fn is_set(value: &str) -> bool {
    !value.trim().is_empty() && !value.starts_with("${")
}

fn check_api_key(config: &AppConfig) -> CheckResult {
    let provider = &config.model.provider;
    let needs_key = provider != "ollama";
    let has_key = config.model.api_key.as_deref().is_some_and(is_set);

    if !needs_key || has_key {
        CheckResult::pass(
            "API Key",
            format!("Configured for {} ({})", config.model.model_id, provider),
        )
    } else {
        CheckResult::fail("API Key", format!("No API key set for provider '{provider}'"))
    }
}

fn check_model_endpoint(config: &AppConfig) -> CheckResult {
    let model = &config.model;
    if model.provider.starts_with("azure") {
        match (&model.azure_resource, &model.base_url) {
            (_, Some(url)) => CheckResult::pass("Model Endpoint", url.clone()),
            (Some(resource), None) => CheckResult::pass(
                "Model Endpoint",
                format!(
                    "https://{resource}.openai.azure.com (deployment '{}')",
                    model.azure_deployment.as_deref().unwrap_or(&model.model_id)
                ),
            ),
            (None, None) => CheckResult::fail(
                "Model Endpoint",
                "Azure provider needs azure_resource or base_url",
            ),
        }
    } else {
        CheckResult::pass(
            "Model Endpoint",
            model
                .base_url
                .clone()
                .unwrap_or_else(|| "default OpenAI endpoint".to_string()),
        )
    }
}

fn check_web_search(config: &AppConfig) -> CheckResult {
    let search = &config.web_search;
    if search.provider != "tavily" {
        return CheckResult::fail(
            "Web Search",
            format!("Unknown provider '{}'", search.provider),
        );
    }
    if !is_set(&search.api_key) {
        return CheckResult::fail("Web Search", "Tavily api_key is empty or unexpanded");
    }
    CheckResult::pass(
        "Web Search",
        format!("tavily, topic '{}', {} results", search.topic, search.max_results),
    )
}

fn check_sports_data(config: &AppConfig) -> CheckResult {
    let data = &config.sports_data;
    if !(data.base_url.starts_with("http://") || data.base_url.starts_with("https://")) {
        return CheckResult::fail(
            "Sports Data",
            format!("base_url '{}' is not an http(s) URL", data.base_url),
        );
    }
    if data.timeout_secs == 0 {
        return CheckResult::fail("Sports Data", "timeout_secs must be positive");
    }
    CheckResult::pass("Sports Data", data.base_url.clone())
}

fn check_gateway(config: &AppConfig) -> CheckResult {
    match config.gateway.bind.parse::<SocketAddr>() {
        Ok(addr) => CheckResult::pass("Gateway", format!("binds {addr}")),
        Err(e) => CheckResult::fail(
            "Gateway",
            format!("invalid bind '{}': {e}", config.gateway.bind),
        ),
    }
}

fn check_retry(config: &AppConfig) -> CheckResult {
    match &config.model.retry {
        None => CheckResult::pass(
            "Retry",
            format!("disabled, {} fallback model(s)", config.fallback_models.len()),
        ),
        Some(retry) if retry.initial_backoff_ms > retry.max_backoff_ms => CheckResult::fail(
            "Retry",
            "initial_backoff_ms is larger than max_backoff_ms",
        ),
        Some(retry) => CheckResult::pass(
            "Retry",
            format!(
                "{} retries, {} fallback model(s)",
                retry.max_retries,
                config.fallback_models.len()
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(extra: &str) -> AppConfig {
        let base = r#"
[model]
model_id = "gpt-35-turbo"
api_key = "k"
azure_resource = "touchline"

[web_search]
api_key = "tvly-k"
"#;
        AppConfig::parse(&format!("{base}\n{extra}")).unwrap()
    }

    fn failed(config: &AppConfig) -> Vec<&'static str> {
        run_checks(config)
            .into_iter()
            .filter(|c| !c.ok)
            .map(|c| c.label)
            .collect()
    }

    #[test]
    fn test_minimal_config_passes() {
        assert!(failed(&config("")).is_empty());
    }

    #[test]
    fn test_bad_gateway_and_sports_url_flagged() {
        let cfg = config(
            r#"
[gateway]
bind = "localhost"

[sports_data]
base_url = "ftp://example"
"#,
        );
        assert_eq!(failed(&cfg), vec!["Sports Data", "Gateway"]);
    }

    #[test]
    fn test_unexpanded_key_flagged() {
        let mut cfg = config("");
        cfg.web_search.api_key = "${TAVILY_API_KEY_THAT_IS_NOT_SET}".into();
        cfg.model.azure_resource = None;
        assert_eq!(failed(&cfg), vec!["Model Endpoint", "Web Search"]);
    }
}
