//! Per-event pipeline: extract, validate, render, route, send.
//!
//! The dispatcher holds only immutable, shared state and may serve any
//! number of overlapping invocations. It never retries on its own; a failure
//! either drops the event or hands it back to the bus for redelivery.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};
use tracing::{error, info};

use crate::config::DEFAULT_SEND_TIMEOUT_MS;
use crate::error::{Disposition, SendError, TransportError};
use crate::event::Event;
use crate::request::{extract, validate, RenderedMessage};
use crate::template::{TemplateResolver, TemplateStore};
use crate::transport::TransportRegistry;

/// Final state of one dispatch.
#[derive(Debug)]
pub enum Outcome {
    /// Handed to the transport, which assigned `message_id`.
    Sent { message_id: String },
    /// Permanently failed. The event is acknowledged.
    Dropped(SendError),
    /// Possibly transient failure. The event should be redelivered.
    Retry(SendError),
}

impl Outcome {
    fn from_error(err: SendError) -> Self {
        match err.disposition() {
            Disposition::Drop => Outcome::Dropped(err),
            Disposition::Retry => Outcome::Retry(err),
        }
    }

    pub fn should_redeliver(&self) -> bool {
        matches!(self, Outcome::Retry(_))
    }

    pub fn error(&self) -> Option<&SendError> {
        match self {
            Outcome::Sent { .. } => None,
            Outcome::Dropped(err) | Outcome::Retry(err) => Some(err),
        }
    }
}

/// Runs the send pipeline for inbound events.
#[derive(Clone)]
pub struct Dispatcher {
    resolver: TemplateResolver,
    registry: Arc<TransportRegistry>,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn TemplateStore>, registry: Arc<TransportRegistry>) -> Self {
        Self {
            resolver: TemplateResolver::new(store),
            registry,
            send_timeout: Duration::from_millis(DEFAULT_SEND_TIMEOUT_MS),
        }
    }

    /// Deadline for the whole dispatch, counted from when it starts.
    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Process `event` and report how it ended. Every failure is logged here.
    pub async fn dispatch<E: Event + Sync>(&self, event: &E) -> Outcome {
        let deadline = Instant::now() + self.send_timeout;

        match self.run(event, deadline).await {
            Ok(message_id) => Outcome::Sent { message_id },
            Err(err) => {
                let outcome = Outcome::from_error(err);
                if let Some(err) = outcome.error() {
                    log_failure(err, outcome.should_redeliver());
                }
                outcome
            }
        }
    }

    /// Invoker contract: `Ok` acknowledges the event, `Err` asks for redelivery.
    pub async fn handle<E: Event + Sync>(&self, event: &E) -> Result<(), SendError> {
        match self.dispatch(event).await {
            Outcome::Sent { .. } | Outcome::Dropped(_) => Ok(()),
            Outcome::Retry(err) => Err(err),
        }
    }

    async fn run<E: Event + Sync>(&self, event: &E, deadline: Instant) -> Result<String, SendError> {
        let request = extract(event)?;
        validate(&request)?;

        let body = self.resolver.resolve(&request).await?;
        let transport = self.registry.route(&request.sender)?;
        let message = RenderedMessage::new(request, body);

        let message_id = timeout_at(deadline, transport.send(&message))
            .await
            .map_err(|_| TransportError::Timeout(self.send_timeout))??;

        info!(
            sender = %message.sender,
            subject = %message.subject,
            to = ?message.to,
            cc = ?message.cc,
            bcc_count = message.bcc.len(),
            message_id = %message_id,
            "email_sent"
        );

        Ok(message_id)
    }
}

fn log_failure(err: &SendError, redeliver: bool) {
    let kind = err.kind();
    match err {
        SendError::Decode(e) => error!(kind, error = %e, redeliver, "event_dropped"),
        SendError::Validation(e) => {
            error!(kind, field = e.field(), error = %e, redeliver, "event_dropped")
        }
        SendError::Render(e) => error!(kind, error = %e, redeliver, "event_dropped"),
        SendError::ReadTemplate { name, source } => {
            error!(kind, template = %name, error = %source, redeliver, "event_failed")
        }
        SendError::NoRoute { domain, sender } => {
            error!(kind, domain = %domain, sender = %sender, redeliver, "event_failed")
        }
        SendError::Transport(e) => error!(kind, error = %e, redeliver, "event_failed"),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::event::CloudEvent;
    use crate::template::MemoryTemplateStore;
    use crate::transport::Sender;

    struct FixedSender;

    #[async_trait]
    impl Sender for FixedSender {
        async fn send(&self, _message: &RenderedMessage) -> Result<String, TransportError> {
            Ok("id-1".to_string())
        }
    }

    fn dispatcher() -> Dispatcher {
        let registry = TransportRegistry::builder()
            .register("x.com", Arc::new(FixedSender))
            .build();
        Dispatcher::new(Arc::new(MemoryTemplateStore::new()), Arc::new(registry))
    }

    fn event(data: serde_json::Value) -> CloudEvent {
        CloudEvent::new("evt", "//tests", "example.send")
            .with_json_data(&data)
            .unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_sent() {
        let outcome = dispatcher()
            .dispatch(&event(json!({
                "sender": "a@x.com", "subject": "Hi", "body": "Hello", "to": "b@y.com"
            })))
            .await;

        assert!(matches!(outcome, Outcome::Sent { ref message_id } if message_id == "id-1"));
        assert!(!outcome.should_redeliver());
    }

    #[tokio::test]
    async fn test_dispatch_invalid_json_dropped() {
        let event = CloudEvent {
            data: Some(b"not json".to_vec()),
            ..CloudEvent::new("evt", "//tests", "example.send")
        };

        let outcome = dispatcher().dispatch(&event).await;
        assert!(matches!(outcome, Outcome::Dropped(SendError::Decode(_))));
    }

    #[tokio::test]
    async fn test_dispatch_render_failure_dropped() {
        let outcome = dispatcher()
            .dispatch(&event(json!({
                "sender": "a@x.com", "subject": "Hi", "body": "{{ .Nope }}", "to": "b@y.com"
            })))
            .await;

        assert!(matches!(outcome, Outcome::Dropped(SendError::Render(_))));
    }

    #[tokio::test]
    async fn test_handle_acknowledges_dropped() {
        let result = dispatcher().handle(&event(json!({"sender": "a@x.com"}))).await;
        assert!(result.is_ok());
    }
}
