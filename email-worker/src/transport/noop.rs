use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::info;

use super::Sender;
use crate::error::TransportError;
use crate::request::RenderedMessage;

/// Logs the message and discards it. For local runs and staging domains.
#[derive(Debug, Default)]
pub struct NoopSender {
    sent: AtomicU64,
}

impl NoopSender {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Sender for NoopSender {
    async fn send(&self, message: &RenderedMessage) -> Result<String, TransportError> {
        let id = format!("noop-{}", self.sent.fetch_add(1, Ordering::Relaxed) + 1);

        info!(
            message_id = %id,
            sender = %message.sender,
            subject = %message.subject,
            to = ?message.to,
            cc = ?message.cc,
            bcc_count = message.bcc.len(),
            body_length = message.body.len(),
            "noop_send_discarded"
        );

        Ok(id)
    }
}
