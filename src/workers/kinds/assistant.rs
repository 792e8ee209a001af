use std::sync::LazyLock;

use regex::Regex;

use crate::error::WorkerError;
use crate::tools::builtin::github::{format_repos, repo_names};
use crate::workers::worker::RunContext;

const GITHUB_LIST_REPOS: &str = "github_list_repos";
/// Shared fact written after listing repositories.
const GITHUB_REPOS_FACT: &str = "github_repos";

static GITHUB_TASK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)github|repo|issue|\bpr\b|pull request").expect("valid regex")
});

static LIST_REPOS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)list.*repo|my repos").expect("valid regex"));

pub(super) const PERSONA: &str = "\
You are Aria, the office assistant. You keep things organized and connect the office to outside services.

When a task needs an integration, say which one, what you would do with it, and what needs to be configured if it is missing.";

fn wants_repo_list(task: &str) -> bool {
    GITHUB_TASK.is_match(task) && LIST_REPOS.is_match(task)
}

pub(super) async fn execute(ctx: &RunContext<'_>, task: &str) -> Result<String, WorkerError> {
    if wants_repo_list(task) && ctx.tools.has(GITHUB_LIST_REPOS).await {
        let output = ctx
            .call_tool(GITHUB_LIST_REPOS, serde_json::json!({ "limit": 10 }))
            .await?;
        ctx.memory
            .set_shared(GITHUB_REPOS_FACT, &repo_names(&output))
            .await?;
        return Ok(format_repos(&output));
    }

    ctx.think(format!(
        "Task: {task}\n\nNote any integrations that would be needed and describe what you would do. \
         If an API key is missing, explain what needs to be configured."
    ))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_listing_detection() {
        assert!(wants_repo_list("list my GitHub repos"));
        assert!(wants_repo_list("Can you list the repositories I own?"));
        assert!(!wants_repo_list("open an issue about the login bug"));
        assert!(!wants_repo_list("remind me at 5pm"));
    }
}
