//! Code generation, with optional shell commands.
//!
//! Lines of the task starting with `$ ` are run through the `shell` tool
//! before the model is asked, and their output is appended to the prompt.

use crate::error::WorkerError;
use crate::util::truncate;
use crate::workers::kinds::DECISION_TASK_EXCERPT;
use crate::workers::worker::RunContext;

const SHELL: &str = "shell";
const COMMAND_PREFIX: &str = "$ ";
/// Command output kept in the prompt.
const COMMAND_OUTPUT_EXCERPT: usize = 2000;

pub(super) const PERSONA: &str = "\
You are Dev, the office developer. You write clean, working code and explain it briefly.

Format your response as:
- A short explanation of the approach
- The code, in a fenced block with a language tag
- Setup or usage notes if needed

Note any assumptions you made.";

fn commands(task: &str) -> Vec<&str> {
    task.lines()
        .filter_map(|line| line.trim_start().strip_prefix(COMMAND_PREFIX))
        .map(str::trim)
        .filter(|cmd| !cmd.is_empty())
        .collect()
}

pub(super) async fn execute(ctx: &RunContext<'_>, task: &str) -> Result<String, WorkerError> {
    let mut prompt = task.to_string();

    let commands = commands(task);
    if !commands.is_empty() && ctx.tools.has(SHELL).await {
        for command in commands {
            let output = ctx
                .call_tool(SHELL, serde_json::json!({ "command": command }))
                .await?;
            prompt.push_str(&format!(
                "\n\nOutput of `{command}` (exit {}):\n{}",
                output["exit_code"],
                truncate(output["output"].as_str().unwrap_or_default(), COMMAND_OUTPUT_EXCERPT)
            ));
        }
    }

    let response = ctx.think(prompt).await?;
    ctx.memory
        .record_decision(&format!(
            "Generated code solution for: {}",
            truncate(task, DECISION_TASK_EXCERPT)
        ))
        .await?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_prefixed_commands() {
        let task = "Why does the build fail?\n$ cargo --version\n  $ ls src\n$   \nplain line";
        assert_eq!(commands(task), vec!["cargo --version", "ls src"]);
    }

    #[test]
    fn no_commands_in_plain_task() {
        assert!(commands("write a binary search in Go").is_empty());
    }
}
