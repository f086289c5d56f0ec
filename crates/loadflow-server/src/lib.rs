pub mod api;
pub mod computations;
pub mod config;
pub mod error;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

use crate::computations::ComputationRegistry;
use crate::config::ServerConfig;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/", get(api::hello))
        .route("/health", get(api::health))
        .route("/stats", get(api::stats))
        .route("/computations", get(api::list_computations))
        .route("/tasks/{computation}", post(api::submit_task))
        .route("/status/{id}", get(api::task_status))
        .route("/result/{id}", get(api::task_result))
        .layer(cors)
        .with_state(state)
}

/// Install the global subscriber; `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(
        config.task_manager_config(),
        ComputationRegistry::with_builtins()?,
    ));

    let sweeper = config
        .sweep_interval()
        .map(|interval| state.runner.manager().spawn_sweeper(interval));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        addr = %addr,
        max_running_tasks = config.max_running_tasks,
        task_retention_secs = config.task_retention_secs,
        "loadflow server listening"
    );
    let served = axum::serve(listener, router(state)).await;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    served.map_err(Into::into)
}
