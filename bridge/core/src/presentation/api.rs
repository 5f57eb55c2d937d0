// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Jobs HTTP API
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | GET | `/health` | liveness |
//! | GET | `/jobs?participant=X` or `/jobs?roles=a,b` | work list |
//! | GET | `/job/s/{id}` | work item detail |
//! | POST | `/job/p/{id}` | process (advance or cancel) |
//! | GET | `/job/v/{id}` | expression tree |
//!
//! `{id}` is the escaped work item id (`wfid%2F0_0_0`). An unreachable
//! engine answers 503 with `{"view": "ruote_missing"}`.

use crate::application::jobs::{Audience, JobUpdate, JobUpdateRequest, JobsError, JobsService};
use crate::domain::work_item::WorkItemError;
use crate::infrastructure::ruote_client::RuoteError;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::error;

pub const RUOTE_MISSING_VIEW: &str = "ruote_missing";

pub struct AppState {
    pub jobs: Arc<JobsService>,
    pub start_time: Instant,
}

pub fn app(jobs: Arc<JobsService>) -> Router {
    let state = Arc::new(AppState { jobs, start_time: Instant::now() });

    Router::new()
        .route("/health", get(health_handler))
        .route("/jobs", get(list_jobs_handler))
        .route("/job/s/{id}", get(show_job_handler))
        .route("/job/p/{id}", post(process_job_handler))
        .route("/job/v/{id}", get(visualize_job_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error response for the jobs endpoints
pub struct ApiError(JobsError);

impl From<JobsError> for ApiError {
    fn from(err: JobsError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            JobsError::NotFound(_) => StatusCode::NOT_FOUND,
            JobsError::Engine(RuoteError::EngineUnavailable(_)) => {
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "view": RUOTE_MISSING_VIEW, "error": self.0.to_string() })),
                )
                    .into_response();
            }
            JobsError::Engine(RuoteError::MalformedId(_)) => StatusCode::BAD_REQUEST,
            JobsError::Engine(RuoteError::WorkItem(WorkItemError::InvalidTransition { .. })) => StatusCode::CONFLICT,
            JobsError::Engine(_) => StatusCode::BAD_GATEWAY,
            JobsError::Models(_) | JobsError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Jobs request failed: {}", self.0);
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct JobsQuery {
    pub participant: Option<String>,
    /// Comma separated role names
    pub roles: Option<String>,
}

impl JobsQuery {
    fn audience(self) -> Option<Audience> {
        if let Some(participant) = self.participant.filter(|p| !p.trim().is_empty()) {
            return Some(Audience::Participant(participant));
        }

        self.roles.map(|roles| {
            Audience::Roles(
                roles
                    .split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(String::from)
                    .collect(),
            )
        })
    }
}

async fn list_jobs_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<JobsQuery>,
) -> Result<Response, ApiError> {
    let Some(audience) = query.audience() else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "either 'participant' or 'roles' is required" })),
        )
            .into_response());
    };

    let workitems = state.jobs.list(&audience).await?;
    Ok(Json(json!({ "workitems": workitems })).into_response())
}

async fn show_job_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let view = state.jobs.show(&id).await?;
    Ok(Json(view).into_response())
}

async fn process_job_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<JobUpdateRequest>,
) -> Result<Response, ApiError> {
    let update = state.jobs.update(&id, request).await?;

    let response = match &update {
        JobUpdate::Invalid { view, errors } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "view": view, "errors": errors, "flash": update.flash() })),
        )
            .into_response(),
        _ => Json(json!({ "result": update.label(), "flash": update.flash() })).into_response(),
    };

    Ok(response)
}

async fn visualize_job_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let visualization = state.jobs.visualize(&id).await?;
    Ok(Json(visualization).into_response())
}
