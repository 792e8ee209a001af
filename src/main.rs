use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::task::TaskTracker;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use agent_office::cli::run_repl;
use agent_office::config::{OfficeConfig, ToolConfig, llm_config_from_env};
use agent_office::llm::create_provider;
use agent_office::router::Router;
use agent_office::server::{AppState, office_routes};
use agent_office::store::{Database, LibSqlBackend};
use agent_office::tools::ToolRegistry;
use agent_office::tools::builtin::{GithubReposTool, ReadFileTool, ShellTool, WebSearchTool};
use agent_office::workers::{BroadcastObserver, WorkerDeps, WorkerRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = OfficeConfig::from_env().context("invalid configuration")?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    let llm_config = llm_config_from_env().context("LLM configuration")?;

    eprintln!("Agent Office v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", llm_config.model);

    // ── Database ─────────────────────────────────────────────────────────
    let store: Option<Arc<dyn Database>> = match LibSqlBackend::new_local(&config.db_path).await {
        Ok(db) => {
            eprintln!("   Database: {}", config.db_path.display());
            Some(Arc::new(db))
        }
        Err(e) => {
            tracing::error!(error = %e, "Database unavailable, running without memory");
            eprintln!("   Database: unavailable ({e}), memory disabled");
            None
        }
    };

    let llm = create_provider(&llm_config)?;

    // ── Tools ────────────────────────────────────────────────────────────
    let tools = Arc::new(register_tools(&config.tools).await?);
    eprintln!("   Tools: {}", tools.list().await.join(", "));

    // ── Workers & router ─────────────────────────────────────────────────
    let status = Arc::new(BroadcastObserver::new());
    let tracker = TaskTracker::new();
    let deps = WorkerDeps::new(store.clone(), llm, Arc::clone(&tools), config.memory.clone())
        .with_tracker(tracker.clone())
        .with_observer(status.clone());
    let workers = Arc::new(WorkerRegistry::with_all(deps.clone()));
    if !workers.contains(&config.fallback_worker) {
        anyhow::bail!(
            "OFFICE_FALLBACK_WORKER={} is not a registered worker (known: {})",
            config.fallback_worker,
            workers.ids().join(", ")
        );
    }
    let router = Arc::new(Router::new(workers, deps, config.fallback_worker.clone()));

    // ── HTTP viewer ──────────────────────────────────────────────────────
    let app = office_routes(AppState {
        router: Arc::clone(&router),
        store,
        status,
    });
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port))
        .await
        .with_context(|| format!("failed to bind port {}", config.http_port))?;
    eprintln!("   Viewer API: http://0.0.0.0:{}/api", config.http_port);
    eprintln!("   Status WS: ws://0.0.0.0:{}/ws/status", config.http_port);
    eprintln!("   Type a task and press Enter. /quit to exit.\n");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "HTTP server stopped");
        }
    });

    // ── REPL ─────────────────────────────────────────────────────────────
    run_repl(router, tokio::io::stdin()).await;

    tracker.close();
    if !tracker.is_empty() {
        eprintln!("Waiting for {} memory compression task(s)...", tracker.len());
    }
    tracker.wait().await;
    Ok(())
}

/// stderr logging, plus a daily-rolling file when `log_dir` is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "agent-office.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .init();

    guard
}

async fn register_tools(config: &ToolConfig) -> anyhow::Result<ToolRegistry> {
    let tools = ToolRegistry::new();

    let mut shell = ShellTool::new().with_timeout(config.timeout);
    let mut files = ReadFileTool::new();
    if let Some(dir) = &config.workdir {
        shell = shell.with_working_dir(dir.clone());
        files = files.with_base_dir(dir.clone());
    }
    tools.register(Arc::new(shell)).await;
    tools.register(Arc::new(files)).await;

    if let Some(key) = &config.tavily_api_key {
        tools
            .register(Arc::new(WebSearchTool::new(key.clone(), config.web_search_timeout)?))
            .await;
    }
    if let Some(token) = &config.github_token {
        tools
            .register(Arc::new(GithubReposTool::new(token.clone(), config.timeout)?))
            .await;
    }

    Ok(tools)
}
