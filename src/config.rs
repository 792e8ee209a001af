//! Configuration types.
//!
//! Everything is read from the environment with sane defaults so the office
//! can boot with nothing but `DEEPSEEK_API_KEY` set.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Worker that receives the whole task when the routing plan is unusable.
pub const DEFAULT_FALLBACK_WORKER: &str = "researcher";

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct OfficeConfig {
    /// Path to the libSQL database file.
    pub db_path: PathBuf,
    /// Port for the HTTP viewer API.
    pub http_port: u16,
    /// Worker id used by the fallback routing plan.
    pub fallback_worker: String,
    /// Directory for rolling log files. Logs go to stderr only when unset.
    pub log_dir: Option<PathBuf>,
    pub memory: MemoryConfig,
    pub tools: ToolConfig,
}

impl Default for OfficeConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/agent-office.db"),
            http_port: 8080,
            fallback_worker: DEFAULT_FALLBACK_WORKER.to_string(),
            log_dir: None,
            memory: MemoryConfig::default(),
            tools: ToolConfig::default(),
        }
    }
}

impl OfficeConfig {
    /// Build configuration from `OFFICE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            db_path: env_or("OFFICE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            http_port: parse_env("OFFICE_HTTP_PORT")?.unwrap_or(defaults.http_port),
            fallback_worker: env_or("OFFICE_FALLBACK_WORKER").unwrap_or(defaults.fallback_worker),
            log_dir: env_or("OFFICE_LOG_DIR").map(PathBuf::from),
            memory: MemoryConfig::from_env()?,
            tools: ToolConfig::from_env()?,
        })
    }
}

/// Memory subsystem tuning.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// How many recent summaries `build_context` injects.
    pub summary_limit: usize,
    /// Token cap for a compression request.
    pub compress_max_tokens: u32,
    /// Sampling temperature for compression.
    pub compress_temperature: f32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            summary_limit: 8,
            compress_max_tokens: 400,
            compress_temperature: 0.3,
        }
    }
}

impl MemoryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            summary_limit: parse_env("OFFICE_SUMMARY_LIMIT")?.unwrap_or(defaults.summary_limit),
            ..defaults
        })
    }
}

/// External tool settings.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Hard timeout for subprocess-style tools.
    pub timeout: Duration,
    /// Hard timeout for web search.
    pub web_search_timeout: Duration,
    pub tavily_api_key: Option<SecretString>,
    pub github_token: Option<SecretString>,
    /// Base directory for file reads and shell commands.
    pub workdir: Option<PathBuf>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            web_search_timeout: Duration::from_secs(15),
            tavily_api_key: None,
            github_token: None,
            workdir: None,
        }
    }
}

impl ToolConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            timeout: parse_env::<u64>("OFFICE_TOOL_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            web_search_timeout: defaults.web_search_timeout,
            tavily_api_key: env_or("TAVILY_API_KEY").map(SecretString::from),
            github_token: env_or("GITHUB_TOKEN").map(SecretString::from),
            workdir: env_or("OFFICE_WORKDIR").map(PathBuf::from),
        })
    }
}

/// Build the LLM configuration from `DEEPSEEK_*` variables.
pub fn llm_config_from_env() -> Result<LlmConfig, ConfigError> {
    let api_key = env_or("DEEPSEEK_API_KEY")
        .ok_or_else(|| ConfigError::MissingEnvVar("DEEPSEEK_API_KEY".to_string()))?;
    let request_timeout = parse_env::<u64>("DEEPSEEK_TIMEOUT_SECS")?
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(60));

    Ok(LlmConfig {
        backend: LlmBackend::DeepSeek,
        api_key: SecretString::from(api_key),
        base_url: env_or("DEEPSEEK_BASE_URL")
            .unwrap_or_else(|| "https://api.deepseek.com".to_string()),
        model: env_or("DEEPSEEK_MODEL").unwrap_or_else(|| "deepseek-chat".to_string()),
        request_timeout,
    })
}

/// Read a non-empty environment variable.
fn env_or(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an optional environment variable, rejecting malformed values.
fn parse_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_or(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = OfficeConfig::default();
        assert_eq!(config.fallback_worker, "researcher");
        assert_eq!(config.memory.summary_limit, 8);
        assert_eq!(config.memory.compress_max_tokens, 400);
        assert_eq!(config.tools.timeout, Duration::from_secs(30));
        assert_eq!(config.tools.web_search_timeout, Duration::from_secs(15));
        assert!(config.tools.tavily_api_key.is_none());
    }

    #[test]
    fn parse_env_reports_bad_values() {
        // SAFETY: test-only variable name, not read concurrently elsewhere.
        unsafe { std::env::set_var("OFFICE_TEST_BAD_PORT", "not-a-port") };
        let result = parse_env::<u16>("OFFICE_TEST_BAD_PORT");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
        unsafe { std::env::remove_var("OFFICE_TEST_BAD_PORT") };
    }

    #[test]
    fn parse_env_missing_is_none() {
        let result = parse_env::<u16>("OFFICE_TEST_DEFINITELY_UNSET").unwrap();
        assert!(result.is_none());
    }
}
