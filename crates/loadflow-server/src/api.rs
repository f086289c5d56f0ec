use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use loadflow_core::models::{TaskId, TaskOutcome, TaskStatus};
use loadflow_core::orchestration::{TaskHandle, TaskStatusResponse};
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::state::AppState;

// ── Health & Stats ────────────────────────────────────────────────

pub async fn hello() -> &'static str {
    "Hello, world!"
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub size: usize,
    pub running: usize,
    pub max_running_tasks: usize,
    pub retention_seconds: u64,
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>, ApiError> {
    let manager = state.runner.manager();
    let config = manager.config();
    Ok(Json(StatsResponse {
        size: manager.size()?,
        running: manager.num_running()?,
        max_running_tasks: config.max_running_tasks,
        retention_seconds: config.retention.as_secs(),
    }))
}

pub async fn list_computations(State(state): State<Arc<AppState>>) -> Json<Vec<&'static str>> {
    Json(state.computations.names())
}

// ── Tasks ─────────────────────────────────────────────────────────

/// POST /tasks/{computation}: start a computation and answer with its handle.
pub async fn submit_task(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<TaskHandle>), ApiError> {
    let computation = state
        .computations
        .get(&name)
        .ok_or_else(|| ApiError::unknown_computation(&name))?;
    let input = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&body).map_err(ApiError::invalid_body)?
    };

    let handle = state
        .runner
        .submit(move || computation.run(input))?;
    tracing::info!(task_id = %handle.id, computation = %name, "submitted task");
    Ok((StatusCode::ACCEPTED, Json(handle)))
}

/// GET /status/{id}
pub async fn task_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskStatusResponse>, ApiError> {
    let task_id = parse_task_id(&id)?;
    Ok(Json(state.runner.manager().status(task_id)?))
}

#[derive(Serialize)]
struct FailedResultResponse {
    status: TaskStatus,
    message: String,
}

/// GET /result/{id}: hands out the result once, then the task is gone.
pub async fn task_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let task_id = parse_task_id(&id)?;
    let response = match state.runner.manager().fetch_result(task_id)? {
        TaskOutcome::Finished(result) => Json(result).into_response(),
        TaskOutcome::Failed(failure) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(FailedResultResponse {
                status: TaskStatus::Failed,
                message: failure.message,
            }),
        )
            .into_response(),
    };
    Ok(response)
}

fn parse_task_id(raw: &str) -> Result<TaskId, ApiError> {
    raw.parse().map_err(|_| ApiError::unknown_task_id(raw))
}
