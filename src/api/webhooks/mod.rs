//! Webhook endpoints for the voice-call platform

use std::sync::Arc;

use axum::{Router, routing::post};

use super::ApiState;

pub mod vapi;

/// Build webhooks router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/vapi", post(vapi::handle_event))
        .with_state(state)
}
