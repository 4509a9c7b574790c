//! HTTP control plane: status, history, manual triggers and the worker endpoint.

use crate::config::Config;
use crate::dashboard::render_dashboard;
use crate::dispatch::{DispatchError, WORKER_PATH};
use crate::models::{HistoryReport, RunMode, RunResult, StatusReport};
use crate::orchestration::{error_chain, wait_for_shutdown, CycleError, WarmingCycle};
use crate::state::StateError;
use crate::warmer::WarmJob;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone)]
pub struct AppState {
    cycle: Arc<WarmingCycle>,
}

impl AppState {
    pub fn new(cycle: Arc<WarmingCycle>) -> Self {
        Self { cycle }
    }
}

/// 500 response carrying the error message and its rendered source chain.
#[derive(Debug, Serialize)]
pub struct ApiError {
    error: String,
    stack: String,
}

impl ApiError {
    fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        Self {
            error: err.to_string(),
            stack: error_chain(err),
        }
    }
}

impl From<CycleError> for ApiError {
    fn from(err: CycleError) -> Self {
        Self::from_error(&err)
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        Self::from_error(&err)
    }
}

impl From<StateError> for ApiError {
    fn from(err: StateError) -> Self {
        Self::from_error(&err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    region: Option<String>,
    limit: Option<usize>,
}

/// A bare `/trigger` is a smoke run; `?test=false` warms a full page.
#[derive(Debug, Deserialize)]
pub struct TriggerParams {
    #[serde(default = "default_test_mode")]
    test: bool,
}

fn default_test_mode() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct Message {
    message: &'static str,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/status", get(status))
        .route("/history", get(history))
        .route("/trigger", get(trigger))
        .route("/reset-region", get(reset_region))
        .route(WORKER_PATH, post(internal_warm))
        .with_state(state)
}

/// Serve the control plane until shutdown is requested.
pub async fn serve(
    state: AppState,
    addr: SocketAddr,
    shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Control plane listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(wait_for_shutdown(shutdown))
        .await
}

async fn dashboard(State(state): State<AppState>) -> Html<String> {
    let results = state.cycle.results();
    let status = results.get_status();
    let history = results.get_history(None, Config::HISTORY_DEFAULT_LIMIT);
    let errors = results.recent_errors(Config::HISTORY_DEFAULT_LIMIT);
    Html(render_dashboard(&status, &history, &errors))
}

async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.cycle.results().get_status())
}

async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Json<HistoryReport> {
    let limit = params.limit.unwrap_or(Config::HISTORY_DEFAULT_LIMIT);
    Json(
        state
            .cycle
            .results()
            .get_history(params.region.as_deref(), limit),
    )
}

async fn trigger(
    State(state): State<AppState>,
    Query(params): Query<TriggerParams>,
) -> Result<Json<RunResult>, ApiError> {
    let mode = if params.test { RunMode::Test } else { RunMode::Full };
    tracing::info!(mode = ?mode, "Manual trigger");
    Ok(Json(state.cycle.run(mode).await?))
}

async fn reset_region(State(state): State<AppState>) -> Result<Json<Message>, ApiError> {
    state.cycle.reset_region()?;
    Ok(Json(Message {
        message: "Region rotation reset",
    }))
}

async fn internal_warm(
    State(state): State<AppState>,
    Json(job): Json<WarmJob>,
) -> Result<Json<RunResult>, ApiError> {
    tracing::info!(region = %job.region.label, urls = job.urls.len(), "Executing job for remote dispatcher");
    Ok(Json(state.cycle.run_local(job).await?))
}
