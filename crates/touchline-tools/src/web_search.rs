use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::json;
use tracing::debug;

use touchline_core::config::WebSearchConfig;
use touchline_core::error::{Result, TouchlineError};
use touchline_core::traits::WebSearchProvider;

const TAVILY_URL: &str = "https://api.tavily.com/search";
const TIMEOUT_SECS: u64 = 20;

/// Tavily web search. Returns the raw response body.
pub struct TavilySearch {
    api_key: String,
    topic: String,
    max_results: u32,
    url: String,
    http: reqwest::Client,
}

impl TavilySearch {
    pub fn new(config: &WebSearchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .map_err(|e| TouchlineError::Config(format!("web search client: {e}")))?;
        Ok(Self {
            api_key: config.api_key.clone(),
            topic: config.topic.clone(),
            max_results: config.max_results,
            url: TAVILY_URL.to_string(),
            http,
        })
    }

    /// Point at a different endpoint (tests, proxies).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    fn request_body(&self, query: &str) -> serde_json::Value {
        json!({
            "api_key": self.api_key,
            "query": query,
            "topic": self.topic,
            "max_results": self.max_results,
        })
    }

    fn fault(&self, message: impl Into<String>) -> TouchlineError {
        TouchlineError::Provider {
            provider: self.name().to_string(),
            message: message.into(),
        }
    }
}

impl WebSearchProvider for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<serde_json::Value>> {
        Box::pin(async move {
            debug!(query, "Searching the web");
            let resp = self
                .http
                .post(&self.url)
                .json(&self.request_body(query))
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        TouchlineError::ProviderTimeout {
                            provider: self.name().to_string(),
                            timeout_secs: TIMEOUT_SECS,
                        }
                    } else {
                        self.fault(e.to_string())
                    }
                })?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(self.fault(format!("HTTP {status}: {body}")));
            }

            resp.json().await.map_err(|e| self.fault(e.to_string()))
        })
    }
}
