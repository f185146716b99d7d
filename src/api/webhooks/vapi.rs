//! Voice-call platform webhook handler
//!
//! The handler works on the raw body: signature verification must see the
//! exact bytes the platform signed, and classification errors must map to a
//! well-formed JSON reply rather than an extractor rejection.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::api::ApiState;
use crate::events;
use crate::security::{self, SignatureCheck};

/// Header carrying the platform's HMAC signature
pub const SIGNATURE_HEADER: &str = "x-vapi-signature";

/// Generic JSON error body; never leaks internals to the caller
#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    error: &'static str,
}

impl ErrorBody {
    const fn new(error: &'static str) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// Handle an inbound platform event
pub async fn handle_event(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    match security::verify(state.webhook_secret.as_deref(), signature, &body) {
        SignatureCheck::Verified => {}
        SignatureCheck::SkippedNoSecret => {
            tracing::debug!("signature verification disabled, accepting delivery");
        }
        SignatureCheck::UnsignedAccepted => {
            tracing::warn!("secret configured but delivery was unsigned, accepting unverified");
        }
        SignatureCheck::Rejected => {
            tracing::warn!("webhook delivery rejected: invalid signature");
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorBody::new("invalid signature")),
            )
                .into_response();
        }
    }

    let event = match events::classify(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "malformed webhook delivery");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::new("malformed event")),
            )
                .into_response();
        }
    };

    match state.lifecycle.handle(event) {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(e) => {
            // Transient for the platform: it redelivers or proceeds without us
            tracing::error!(error = %e, "webhook transition failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new("transient failure")),
            )
                .into_response()
        }
    }
}
