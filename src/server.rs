//! HTTP viewer API and the live status WebSocket.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::router::ROUTER_ID;
use crate::store::{Database, HISTORY_LIMIT, SEARCH_LIMIT};
use crate::workers::BroadcastObserver;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<crate::router::Router>,
    /// None when the office runs without persistence.
    pub store: Option<Arc<dyn Database>>,
    pub status: Arc<BroadcastObserver>,
}

/// Build the Axum router with the viewer API and status WebSocket.
pub fn office_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws/status", get(ws_handler))
        .route("/api/jobs", post(submit_job))
        .route("/api/jobs/history", get(job_history))
        .route("/api/workers", get(list_workers))
        .route("/api/memory/{worker_id}", get(worker_memory))
        .route("/api/memory/{worker_id}/search", get(search_memory))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

fn store_unavailable() -> (StatusCode, Json<serde_json::Value>) {
    error(StatusCode::SERVICE_UNAVAILABLE, "Memory store is not available")
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "agent-office",
        "store": state.store.is_some(),
        "workers": state.router.workers().len(),
    }))
}

// ── Jobs ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct JobRequest {
    task: String,
}

async fn submit_job(
    State(state): State<AppState>,
    Json(body): Json<JobRequest>,
) -> impl IntoResponse {
    let task = body.task.trim();
    if task.is_empty() {
        return error(StatusCode::BAD_REQUEST, "Task must not be empty");
    }

    match state.router.handle(task).await {
        Ok(response) => (StatusCode::OK, Json(serde_json::json!(response))),
        Err(e) => {
            warn!(error = %e, "Job failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn job_history(State(state): State<AppState>) -> impl IntoResponse {
    let Some(store) = &state.store else {
        return store_unavailable();
    };
    match store.session_history(HISTORY_LIMIT).await {
        Ok(history) => (StatusCode::OK, Json(serde_json::json!(history))),
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

// ── Workers & memory ────────────────────────────────────────────────────

async fn list_workers(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.router.workers().profiles())
}

fn known_worker(state: &AppState, worker_id: &str) -> bool {
    worker_id == ROUTER_ID || state.router.workers().contains(worker_id)
}

async fn worker_memory(
    State(state): State<AppState>,
    Path(worker_id): Path<String>,
) -> impl IntoResponse {
    if !known_worker(&state, &worker_id) {
        return error(StatusCode::NOT_FOUND, format!("Unknown worker: {worker_id}"));
    }
    let Some(store) = &state.store else {
        return store_unavailable();
    };
    match store.worker_memory(&worker_id).await {
        Ok(view) => (StatusCode::OK, Json(serde_json::json!(view))),
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

async fn search_memory(
    State(state): State<AppState>,
    Path(worker_id): Path<String>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    if !known_worker(&state, &worker_id) {
        return error(StatusCode::NOT_FOUND, format!("Unknown worker: {worker_id}"));
    }
    if params.q.trim().is_empty() {
        return error(StatusCode::BAD_REQUEST, "Query parameter q is required");
    }
    let Some(store) = &state.store else {
        return store_unavailable();
    };

    let observations = store
        .search_observations(&worker_id, &params.q, SEARCH_LIMIT)
        .await;
    let summaries = store
        .search_summaries(&worker_id, &params.q, SEARCH_LIMIT)
        .await;
    match (observations, summaries) {
        (Ok(observations), Ok(summaries)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "observations": observations,
                "summaries": summaries,
            })),
        ),
        (Err(e), _) | (_, Err(e)) => error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

// ── WebSocket ───────────────────────────────────────────────────────────

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.status))
}

async fn handle_socket(mut socket: WebSocket, status: Arc<BroadcastObserver>) {
    info!("Status client connected");
    let mut rx = status.subscribe();

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if let Ok(json) = serde_json::to_string(&event)
                            && socket.send(Message::Text(json.into())).await.is_err()
                        {
                            debug!("Client disconnected during send");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(missed = n, "Status client lagged behind broadcast");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("Status client disconnected");
}
