//! HTTP API for Readcheck
//!
//! Endpoints:
//! - GET /health - Health check
//! - POST /score/summary - Score a summary
//! - POST /score/summary/stream - Score a summary, stream remediation
//! - POST /score/answer - Score a constructed response
//! - GET /volume/{id}/threshold - Current prior and content threshold
//! - POST /volume/{id}/scores - Fold a batch of observed scores into the prior
//! - POST /volume/{id}/reset - Reset the prior to the global default
//! - DELETE /volume/{id} - Forget the volume's prior

use std::sync::Arc;
use std::time::{Duration, Instant};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use futures_util::StreamExt;
use serde::Serialize;
use tracing::{error, info};

use crate::core::estimator::{self, ThresholdEstimator};
use crate::core::framer::{log_completion, StreamFramer};
use crate::core::orchestrator::AssessmentOrchestrator;
use crate::types::{AnalyticResult, AnswerRequest, AssessmentResult, ScoreObservations, SummaryRequest, VolumePrior};
use crate::{Error, Result};

/// App state
pub struct AppState {
    pub orchestrator: AssessmentOrchestrator,
    pub estimator: Arc<ThresholdEstimator>,
    pub stream_log_timeout: Duration,
}

impl AppState {
    pub fn new(orchestrator: AssessmentOrchestrator, stream_log_timeout: Duration) -> Self {
        Self {
            estimator: orchestrator.estimator(),
            orchestrator,
            stream_log_timeout,
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Volume prior with its derived threshold
#[derive(Debug, Serialize)]
pub struct VolumeResponse {
    pub volume_id: String,
    pub prior: VolumePrior,
    pub sigma: f64,
    pub threshold: f64,
    pub target_percentile: f64,
}

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Error::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::Precondition(_) | Error::Config(_) | Error::Io(_) | Error::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/score/summary", post(score_summary))
        .route("/score/summary/stream", post(stream_summary))
        .route("/score/answer", post(score_answer))
        .route("/volume/:id/threshold", get(get_threshold))
        .route("/volume/:id/scores", post(observe_scores))
        .route("/volume/:id/reset", post(reset_volume))
        .route("/volume/:id", delete(delete_volume))
        .with_state(state)
}

/// Health check endpoint
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
    })
}

/// Score a summary without remediation
async fn score_summary(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SummaryRequest>,
) -> Result<Json<AssessmentResult>> {
    Ok(Json(state.orchestrator.score_summary(&req).await?))
}

/// Score a summary and stream the assessment followed by remediation frames
async fn stream_summary(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SummaryRequest>,
) -> Result<Response> {
    let started = Instant::now();
    let prepared = state.orchestrator.stream_summary(&req).await?;

    let framer = StreamFramer::starting_at(started);
    let body = framer.wrap(prepared.frames.map(|frame| frame.to_wire()));
    tokio::spawn(log_completion(framer, prepared.request_id.clone(), state.stream_log_timeout));

    info!(
        request_id = %prepared.request_id,
        page = %req.page_slug,
        remediation = prepared.remediation.is_some(),
        "streaming assessment"
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

/// Score a constructed response
async fn score_answer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<AnalyticResult>> {
    Ok(Json(state.orchestrator.score_answer(&req).await?))
}

/// Current prior and threshold for a volume
async fn get_threshold(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<VolumeResponse>> {
    let prior = state.estimator.prior_for(&id).await?;
    volume_response(&state.estimator, id, prior).map(Json)
}

/// Fold observed content scores into the volume's prior
async fn observe_scores(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ScoreObservations>,
) -> Result<Json<VolumeResponse>> {
    req.validate()?;
    let prior = state.estimator.observe(&id, &req.scores).await?;
    volume_response(&state.estimator, id, prior).map(Json)
}

/// Reset the volume's prior to the global default
async fn reset_volume(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<VolumeResponse>> {
    let prior = state.estimator.reset(&id).await?;
    volume_response(&state.estimator, id, prior).map(Json)
}

/// Forget the volume's prior
async fn delete_volume(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.estimator.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn volume_response(estimator: &ThresholdEstimator, volume_id: String, prior: VolumePrior) -> Result<VolumeResponse> {
    let target_percentile = estimator.target_percentile();
    Ok(VolumeResponse {
        volume_id,
        sigma: estimator::sigma(&prior)?,
        threshold: estimator::threshold(&prior, target_percentile)?,
        target_percentile,
        prior,
    })
}

/// Run the API server
pub async fn run_server(addr: &str, state: Arc<AppState>) -> Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr, "readcheck API listening");
    axum::serve(listener, router).await?;
    Ok(())
}
