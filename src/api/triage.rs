//! Triage trigger endpoints
//!
//! Called by the external workflow orchestrator, not by the webhook path.
//! Each call runs one full triage pass over the supplied transcript text and
//! records the insight against the session when one exists.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::triage::Concern;

/// Triage request: a call identifier and the transcript text to score
#[derive(Debug, Deserialize)]
pub struct TranscriptRequest {
    pub call_id: String,
    pub transcript: String,
}

/// Urgency score reply
#[derive(Debug, Serialize)]
pub struct UrgencyResponse {
    pub call_id: String,
    pub score: u8,
    /// False when the score is the fail-open default, not a model output
    pub scored: bool,
}

/// Key concerns reply
#[derive(Debug, Serialize)]
pub struct ConcernsResponse {
    pub call_id: String,
    pub concerns: Vec<Concern>,
}

/// Internal-error body for persistence failures
#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    error: &'static str,
}

/// Score a call transcript's urgency from 1 (not urgent) to 10
/// (life-threatening)
async fn urgency_score(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<TranscriptRequest>,
) -> Response {
    match state
        .triage
        .annotate(&request.call_id, &request.transcript)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(UrgencyResponse {
                call_id: request.call_id,
                score: outcome.score,
                scored: outcome.scored,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, call_id = %request.call_id, "urgency scoring failed");
            internal_error()
        }
    }
}

/// Extract safety concerns from a call transcript
async fn key_concerns(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<TranscriptRequest>,
) -> Response {
    match state
        .triage
        .annotate(&request.call_id, &request.transcript)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(ConcernsResponse {
                call_id: request.call_id,
                concerns: outcome.concerns,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, call_id = %request.call_id, "concern extraction failed");
            internal_error()
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            status: "error",
            error: "triage persistence failed",
        }),
    )
        .into_response()
}

/// Build triage router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/urgency-score", post(urgency_score))
        .route("/key-concerns", post(key_concerns))
        .with_state(state)
}
