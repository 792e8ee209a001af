//! The `Tool` trait: an external capability a worker can invoke by name.

use std::time::Duration;

use async_trait::async_trait;

pub use crate::error::ToolError;

/// Timeout applied when a tool does not choose its own.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// An external capability. Input and output are both JSON so every call can
/// be recorded verbatim as a tool_call observation.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(&self, params: serde_json::Value) -> Result<serde_json::Value, ToolError>;

    /// Hard limit enforced by the runner around `execute`.
    fn execution_timeout(&self) -> Duration {
        DEFAULT_TOOL_TIMEOUT
    }
}

/// Fetch a required string parameter.
pub fn require_str<'a>(
    tool: &str,
    params: &'a serde_json::Value,
    key: &str,
) -> Result<&'a str, ToolError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidParameters {
            name: tool.to_string(),
            reason: format!("missing string parameter '{key}'"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_str_present() {
        let params = serde_json::json!({"path": "data.csv"});
        assert_eq!(require_str("read_file", &params, "path").unwrap(), "data.csv");
    }

    #[test]
    fn require_str_missing_or_wrong_type() {
        let params = serde_json::json!({"path": 7});
        let err = require_str("read_file", &params, "path").unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters { ref name, .. } if name == "read_file"));
        assert!(require_str("read_file", &params, "other").is_err());
    }
}
