//! SMTP relay transport.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use super::Sender;
use crate::error::TransportError;
use crate::request::RenderedMessage;

/// Wraps `lettre::AsyncSmtpTransport<Tokio1Executor>`.
///
/// Connects without TLS, for relays on a trusted network (sidecar, Mailpit).
pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl SmtpSender {
    pub fn new(host: &str, port: u16, credentials: Option<(String, String)>) -> Self {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(port);

        if let Some((username, password)) = credentials {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Self {
            transport: builder.build(),
            host: host.to_string(),
        }
    }
}

fn mailbox(address: &str) -> Result<Mailbox, TransportError> {
    address
        .parse()
        .map_err(|e| TransportError::Message(format!("invalid address {address:?}: {e}")))
}

/// Build the MIME message for `message` with a freshly generated Message-ID.
fn build_message(message: &RenderedMessage) -> Result<Message, TransportError> {
    let mut builder = Message::builder()
        .from(mailbox(&message.sender)?)
        .subject(message.subject.as_str())
        .message_id(None);

    for to in &message.to {
        builder = builder.to(mailbox(to)?);
    }
    for cc in &message.cc {
        builder = builder.cc(mailbox(cc)?);
    }
    for bcc in &message.bcc {
        builder = builder.bcc(mailbox(bcc)?);
    }

    builder
        .header(ContentType::TEXT_HTML)
        .body(message.body.clone())
        .map_err(|e| TransportError::Message(e.to_string()))
}

fn message_id(email: &Message) -> Result<String, TransportError> {
    email
        .headers()
        .get_raw("Message-ID")
        .map(str::to_string)
        .ok_or_else(|| TransportError::Message("message has no Message-ID".to_string()))
}

#[async_trait]
impl Sender for SmtpSender {
    async fn send(&self, message: &RenderedMessage) -> Result<String, TransportError> {
        let email = build_message(message)?;
        let id = message_id(&email)?;

        let response = self
            .transport
            .send(email)
            .await
            .map_err(|e| TransportError::Smtp(e.to_string()))?;

        info!(
            host = %self.host,
            message_id = %id,
            smtp_code = %response.code(),
            "smtp_send_accepted"
        );

        Ok(id)
    }
}
