use std::sync::LazyLock;

use regex::Regex;

use crate::error::WorkerError;
use crate::util::truncate;
use crate::workers::kinds::DECISION_TASK_EXCERPT;
use crate::workers::worker::RunContext;

const READ_FILE: &str = "read_file";
/// File content handed to the model.
const FILE_EXCERPT: usize = 3000;

static DATA_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)["']?([^\s"']+\.(?:csv|json|txt))["']?"#).expect("valid regex")
});

pub(super) const PERSONA: &str = "\
You are Ada, the office analyst. You turn raw data into clear, quantified insights.

Format your analysis as:
1. Key metrics
2. Patterns and anomalies
3. Recommendations

Show your numbers. Say when the data is too thin to support a conclusion.";

fn data_file(task: &str) -> Option<&str> {
    DATA_FILE
        .captures(task)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

pub(super) async fn execute(ctx: &RunContext<'_>, task: &str) -> Result<String, WorkerError> {
    let mut prompt = task.to_string();

    if let Some(path) = data_file(task)
        && ctx.tools.has(READ_FILE).await
    {
        let output = ctx
            .call_tool(
                READ_FILE,
                serde_json::json!({ "path": path, "max_chars": FILE_EXCERPT, "missing_ok": true }),
            )
            .await?;
        if output["found"].as_bool().unwrap_or(false) {
            prompt.push_str(&format!(
                "\n\nFile contents ({path}):\n{}",
                truncate(output["content"].as_str().unwrap_or_default(), FILE_EXCERPT)
            ));
        }
    }

    let response = ctx.think(prompt).await?;
    ctx.memory
        .record_decision(&format!(
            "Analyzed data for: {}",
            truncate(task, DECISION_TASK_EXCERPT)
        ))
        .await?;
    Ok(response)
}
