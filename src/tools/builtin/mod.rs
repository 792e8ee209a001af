//! Built-in tools: shell execution, file reads, web search and GitHub.

pub mod file;
pub mod github;
pub mod shell;
pub mod web_search;

pub use file::ReadFileTool;
pub use github::GithubReposTool;
pub use shell::ShellTool;
pub use web_search::WebSearchTool;
