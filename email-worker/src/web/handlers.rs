//! Endpoint handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dispatch::{Dispatcher, Outcome};
use crate::event::CloudEvent;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// CloudEvent receiver
// =============================================================================

/// Event response.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EventResponse {
    fn failed(status: &str, error: String) -> Self {
        Self {
            status: status.to_string(),
            message_id: None,
            error: Some(error),
        }
    }
}

/// CloudEvent endpoint, binary or structured content mode.
///
/// 200 for sent and dropped events, 500 for events that should be
/// redelivered, 400 when the request is not a CloudEvent at all.
pub async fn receive_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let event = match CloudEvent::from_http(&headers, &body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, body_length = body.len(), "cloudevent_rejected");
            return (
                StatusCode::BAD_REQUEST,
                Json(EventResponse::failed("bad_request", e.to_string())),
            );
        }
    };

    info!(
        event_id = %event.id,
        event_type = %event.event_type,
        source = %event.source,
        data_length = event.data.as_ref().map(Vec::len).unwrap_or(0),
        "cloudevent_received"
    );

    match state.dispatcher.dispatch(&event).await {
        Outcome::Sent { message_id } => (
            StatusCode::OK,
            Json(EventResponse {
                status: "sent".to_string(),
                message_id: Some(message_id),
                error: None,
            }),
        ),
        Outcome::Dropped(err) => (
            StatusCode::OK,
            Json(EventResponse::failed("dropped", err.to_string())),
        ),
        Outcome::Retry(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(EventResponse::failed("retry", err.to_string())),
        ),
    }
}
