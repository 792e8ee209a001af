use crate::error::WorkerError;
use crate::tools::builtin::web_search::format_results;
use crate::workers::worker::RunContext;

const WEB_SEARCH: &str = "web_search";

pub(super) const PERSONA: &str = "\
You are Rowan, the office researcher. You find facts, compare options and write short briefings.

Format your research as:
1. A plain-language summary
2. Key findings as brief bullets
3. Sources, when you have them

Be precise about what you know and what you are inferring.";

/// Search first when a search tool is configured, then summarize.
pub(super) async fn execute(ctx: &RunContext<'_>, task: &str) -> Result<String, WorkerError> {
    let prompt = if ctx.tools.has(WEB_SEARCH).await {
        let output = ctx
            .call_tool(WEB_SEARCH, serde_json::json!({ "query": task }))
            .await?;
        format!(
            "Research task: {task}\n\nSearch results:\n{}\n\nAnalyze these and give me a summary.",
            format_results(&output)
        )
    } else {
        format!(
            "Research task: {task}\n\nNo web search is configured. Answer from what you know and note any limitations."
        )
    };
    ctx.think(prompt).await
}
