//! Read-only file access for data-analysis tasks.
//!
//! Paths are validated against an optional base directory so a task cannot
//! read outside the office workspace through `..` segments or absolute paths.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::tools::tool::{Tool, ToolError, require_str};

const NAME: &str = "read_file";

/// Maximum file size for reading (1MB).
const MAX_READ_SIZE: u64 = 1024 * 1024;

/// Default number of characters returned.
const DEFAULT_MAX_CHARS: usize = 3000;

fn failed(reason: impl Into<String>) -> ToolError {
    ToolError::ExecutionFailed {
        name: NAME.to_string(),
        reason: reason.into(),
    }
}

/// Resolve `.` and `..` lexically (no filesystem access).
fn normalize_lexical(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                if components
                    .last()
                    .is_some_and(|c| matches!(c, std::path::Component::Normal(_)))
                {
                    components.pop();
                }
            }
            std::path::Component::CurDir => {}
            other => components.push(other),
        }
    }
    components.iter().collect()
}

/// Resolve `path_str` and, when a base is set, ensure it stays inside it.
fn validate_path(path_str: &str, base_dir: Option<&Path>) -> Result<PathBuf, ToolError> {
    let path = PathBuf::from(path_str);

    let joined = match (path.is_absolute(), base_dir) {
        (true, _) => path,
        (false, Some(base)) => base.join(&path),
        (false, None) => std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(&path),
    };
    let normalized = normalize_lexical(&joined);
    let resolved = normalized.canonicalize().unwrap_or_else(|_| {
        // Missing file: canonicalize the directory it would live in.
        match (normalized.parent(), normalized.file_name()) {
            (Some(parent), Some(name)) => parent
                .canonicalize()
                .map(|p| p.join(name))
                .unwrap_or_else(|_| normalized.clone()),
            _ => normalized.clone(),
        }
    });

    if let Some(base) = base_dir {
        let base_canonical = base
            .canonicalize()
            .unwrap_or_else(|_| normalize_lexical(base));
        if !resolved.starts_with(&base_canonical) {
            return Err(ToolError::Disabled {
                name: NAME.to_string(),
                reason: format!("path escapes workspace: {path_str}"),
            });
        }
    }

    Ok(resolved)
}

/// Read file contents tool.
#[derive(Debug, Default)]
pub struct ReadFileTool {
    base_dir: Option<PathBuf>,
}

impl ReadFileTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(mut self, dir: PathBuf) -> Self {
        self.base_dir = Some(dir);
        self
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Read a text file (CSV, JSON, plain text) and return its leading content."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to read"
                },
                "max_chars": {
                    "type": "integer",
                    "description": "Maximum characters to return (default 3000)"
                },
                "missing_ok": {
                    "type": "boolean",
                    "description": "Report a missing file as found=false instead of failing"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let path_str = require_str(NAME, &params, "path")?;
        let max_chars = params
            .get("max_chars")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_CHARS);
        let missing_ok = params
            .get("missing_ok")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let path = validate_path(path_str, self.base_dir.as_deref())?;

        let metadata = match fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(failed(format!("Not a regular file: {path_str}"))),
            Err(e) if missing_ok && e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(serde_json::json!({ "path": path_str, "found": false }));
            }
            Err(e) => return Err(failed(format!("Cannot access file: {e}"))),
        };
        if metadata.len() > MAX_READ_SIZE {
            return Err(failed(format!(
                "File too large ({} bytes). Maximum is {MAX_READ_SIZE} bytes.",
                metadata.len()
            )));
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| failed(format!("Failed to read file: {e}")))?;

        let shown = crate::util::truncate(&content, max_chars);
        Ok(serde_json::json!({
            "path": path.display().to_string(),
            "found": true,
            "content": shown,
            "lines": content.lines().count(),
            "truncated": shown.len() < content.len(),
        }))
    }
}
