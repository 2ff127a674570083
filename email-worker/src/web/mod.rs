//! HTTP receiver for CloudEvents.
//!
//! Push deliveries (Eventarc, Pub/Sub push, Knative) arrive as a POST to `/`.
//! The response status is the only thing the bus looks at:
//! - 2xx acknowledges the event (sent, or dropped as permanently invalid)
//! - 5xx asks for redelivery

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{health, receive_event, AppState, EventResponse, HealthResponse};

/// Build the receiver's router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(receive_event))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
