//! Shell execution tool for running commands.
//!
//! Commands run through `sh -c` in a fixed working directory with captured
//! output. The child is killed if the hard timeout fires.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::tools::tool::{DEFAULT_TOOL_TIMEOUT, Tool, ToolError, require_str};

const NAME: &str = "shell";

/// Maximum output size before truncation (64KB).
const MAX_OUTPUT_SIZE: usize = 64 * 1024;

/// Patterns that are never executed.
static BLOCKED_PATTERNS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    vec![
        "rm -rf /",
        ":(){ :|:& };:",
        "dd if=/dev/zero",
        "mkfs",
        "chmod -r 777 /",
        "> /dev/sda",
        "sudo ",
        "doas ",
        " | sh",
        " | bash",
        "$(curl",
        "$(wget",
        "/etc/shadow",
        "~/.ssh",
        "id_rsa",
        "shutdown",
        "reboot",
    ]
});

/// Shell command execution tool.
#[derive(Debug)]
pub struct ShellTool {
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl ShellTool {
    pub fn new() -> Self {
        Self {
            working_dir: None,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the offending pattern if the command is blocked.
    fn blocked_pattern(cmd: &str) -> Option<&'static str> {
        let normalized = cmd.to_lowercase();
        BLOCKED_PATTERNS
            .iter()
            .copied()
            .find(|p| normalized.contains(p))
    }

    async fn run(&self, cmd: &str) -> Result<(String, i32), ToolError> {
        let cwd = self
            .working_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        let mut command = Command::new("sh");
        command
            .args(["-c", cmd])
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| ToolError::ExecutionFailed {
            name: NAME.to_string(),
            reason: format!("Failed to spawn command: {e}"),
        })?;

        // On timeout the child is dropped, and kill_on_drop reaps it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ToolError::ExecutionFailed {
                    name: NAME.to_string(),
                    reason: format!("Command execution failed: {e}"),
                });
            }
            Err(_) => {
                return Err(ToolError::Timeout {
                    name: NAME.to_string(),
                    timeout: self.timeout,
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = if stderr.is_empty() {
            stdout.into_owned()
        } else if stdout.is_empty() {
            stderr.into_owned()
        } else {
            format!("{stdout}\n\n--- stderr ---\n{stderr}")
        };

        Ok((truncate_output(&combined), output.status.code().unwrap_or(-1)))
    }
}

impl Default for ShellTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Execute a shell command in the office working directory and capture its output."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let command = require_str(NAME, &params, "command")?;

        if let Some(pattern) = Self::blocked_pattern(command) {
            return Err(ToolError::Disabled {
                name: NAME.to_string(),
                reason: format!("command contains blocked pattern '{}'", pattern.trim()),
            });
        }

        let (output, exit_code) = self.run(command).await?;
        Ok(serde_json::json!({
            "output": output,
            "exit_code": exit_code,
            "success": exit_code == 0,
        }))
    }

    fn execution_timeout(&self) -> Duration {
        self.timeout
    }
}

/// Keep the head and tail of oversized output (UTF-8 safe).
fn truncate_output(s: &str) -> String {
    if s.len() <= MAX_OUTPUT_SIZE {
        return s.to_string();
    }
    let half = MAX_OUTPUT_SIZE / 2;
    let head_end = floor_char_boundary(s, half);
    let tail_start = floor_char_boundary(s, s.len() - half);
    format!(
        "{}\n\n... [truncated {} bytes] ...\n\n{}",
        &s[..head_end],
        s.len() - MAX_OUTPUT_SIZE,
        &s[tail_start..]
    )
}

/// Largest byte index <= `i` that is a char boundary.
fn floor_char_boundary(s: &str, i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    let mut pos = i;
    while pos > 0 && !s.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}
