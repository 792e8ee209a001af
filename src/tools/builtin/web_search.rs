//! Web search through the Tavily API.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::tools::tool::{Tool, ToolError, require_str};
use crate::util::truncate;

const NAME: &str = "web_search";
const TAVILY_URL: &str = "https://api.tavily.com/search";
const MAX_RESULTS: u32 = 5;
/// Characters of each hit's content kept in the tool output.
const SNIPPET_CHARS: usize = 300;

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    max_results: u32,
    include_answer: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// Tavily-backed web search.
pub struct WebSearchTool {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
    timeout: Duration,
}

impl WebSearchTool {
    pub fn new(api_key: SecretString, timeout: Duration) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::ExecutionFailed {
                name: NAME.to_string(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            api_key,
            endpoint: TAVILY_URL.to_string(),
            timeout,
        })
    }

    /// Point the tool at a different endpoint (tests, proxies).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Search the web for current information and return a short answer plus top results."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let query = require_str(NAME, &params, "query")?;

        let body = SearchRequest {
            api_key: self.api_key.expose_secret(),
            query,
            search_depth: "basic",
            max_results: MAX_RESULTS,
            include_answer: true,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout {
                        name: NAME.to_string(),
                        timeout: self.timeout,
                    }
                } else {
                    ToolError::ExecutionFailed {
                        name: NAME.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::ExecutionFailed {
                name: NAME.to_string(),
                reason: format!("search API returned HTTP {status}"),
            });
        }

        let parsed: SearchResponse =
            response
                .json()
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    name: NAME.to_string(),
                    reason: format!("invalid search response: {e}"),
                })?;

        Ok(to_output(parsed))
    }

    fn execution_timeout(&self) -> Duration {
        self.timeout
    }
}

fn to_output(response: SearchResponse) -> serde_json::Value {
    let results: Vec<serde_json::Value> = response
        .results
        .iter()
        .map(|hit| {
            serde_json::json!({
                "title": hit.title,
                "url": hit.url,
                "content": truncate(&hit.content, SNIPPET_CHARS),
            })
        })
        .collect();

    serde_json::json!({
        "answer": response.answer,
        "results": results,
    })
}

/// Render a `web_search` output as prompt text.
pub fn format_results(output: &serde_json::Value) -> String {
    let mut text = String::new();
    if let Some(answer) = output["answer"].as_str().filter(|a| !a.is_empty()) {
        text.push_str(&format!("Quick answer: {answer}\n\n"));
    }
    if let Some(results) = output["results"].as_array() {
        let hits: Vec<String> = results
            .iter()
            .map(|r| {
                format!(
                    "- {}\n  URL: {}\n  {}",
                    r["title"].as_str().unwrap_or_default(),
                    r["url"].as_str().unwrap_or_default(),
                    r["content"].as_str().unwrap_or_default(),
                )
            })
            .collect();
        text.push_str(&hits.join("\n\n"));
    }
    text
}
