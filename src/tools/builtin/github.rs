//! GitHub repository listing.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::tools::tool::{Tool, ToolError};

const NAME: &str = "github_list_repos";
const GITHUB_API: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct Repo {
    full_name: String,
    description: Option<String>,
}

/// Lists the authenticated user's most recently updated repositories.
pub struct GithubReposTool {
    client: reqwest::Client,
    token: SecretString,
    api_base: String,
    timeout: Duration,
}

impl GithubReposTool {
    pub fn new(token: SecretString, timeout: Duration) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("agent-office/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ToolError::ExecutionFailed {
                name: NAME.to_string(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            token,
            api_base: GITHUB_API.to_string(),
            timeout,
        })
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

#[async_trait]
impl Tool for GithubReposTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "List the user's most recently updated GitHub repositories."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "limit": { "type": "integer", "description": "How many repositories (default 10)" }
            }
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let limit = params
            .get("limit")
            .and_then(|v| v.as_u64())
            .unwrap_or(10)
            .clamp(1, 100);

        let url = format!(
            "{}/user/repos?per_page={limit}&sort=updated",
            self.api_base.trim_end_matches('/')
        );
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("token {}", self.token.expose_secret()))
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                name: NAME.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::ExecutionFailed {
                name: NAME.to_string(),
                reason: format!("GitHub API returned HTTP {status}"),
            });
        }

        let repos: Vec<Repo> = response.json().await.map_err(|e| ToolError::ExecutionFailed {
            name: NAME.to_string(),
            reason: format!("invalid GitHub response: {e}"),
        })?;

        Ok(to_output(&repos))
    }

    fn execution_timeout(&self) -> Duration {
        self.timeout
    }
}

fn to_output(repos: &[Repo]) -> serde_json::Value {
    serde_json::json!({
        "count": repos.len(),
        "repos": repos
            .iter()
            .map(|r| serde_json::json!({
                "full_name": r.full_name,
                "description": r.description,
            }))
            .collect::<Vec<_>>(),
    })
}

/// Comma-separated repository names, as stored in the shared fact.
pub fn repo_names(output: &serde_json::Value) -> String {
    output["repos"]
        .as_array()
        .map(|repos| {
            repos
                .iter()
                .filter_map(|r| r["full_name"].as_str())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}

/// Markdown list for the worker's reply.
pub fn format_repos(output: &serde_json::Value) -> String {
    let lines: Vec<String> = output["repos"]
        .as_array()
        .map(|repos| {
            repos
                .iter()
                .map(|r| {
                    format!(
                        "- **{}** - {}",
                        r["full_name"].as_str().unwrap_or_default(),
                        r["description"].as_str().unwrap_or("No description"),
                    )
                })
                .collect()
        })
        .unwrap_or_default();
    format!("Your GitHub repos (most recent):\n{}", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> serde_json::Value {
        let repos: Vec<Repo> = serde_json::from_value(serde_json::json!([
            {"full_name": "octo/alpha", "description": "First", "private": false},
            {"full_name": "octo/beta", "description": null}
        ]))
        .unwrap();
        to_output(&repos)
    }

    #[test]
    fn output_shape() {
        let out = sample();
        assert_eq!(out["count"], 2);
        assert_eq!(out["repos"][0]["full_name"], "octo/alpha");
    }

    #[test]
    fn repo_names_joined() {
        assert_eq!(repo_names(&sample()), "octo/alpha, octo/beta");
    }

    #[test]
    fn format_uses_placeholder_for_missing_description() {
        let text = format_repos(&sample());
        assert!(text.contains("- **octo/alpha** - First"));
        assert!(text.contains("- **octo/beta** - No description"));
    }
}
