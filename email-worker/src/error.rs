//! Error taxonomy for the send pipeline.
//!
//! Every failure the pipeline can produce is one variant of [`SendError`].
//! The orchestrator decides between dropping and redelivering an event by
//! matching on that closed set, see [`SendError::disposition`].

use std::time::Duration;

use thiserror::Error;

/// Failure to turn an event body into a structured value.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("event carries no data")]
    MissingData,

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid base64 data: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// A structurally or syntactically invalid send request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing \"{field}\"")]
    Missing { field: &'static str },

    #[error("either \"body\" or \"template\" should be defined")]
    MissingContent,

    #[error("invalid \"{field}\" address {address:?}: {reason}")]
    InvalidAddress {
        field: &'static str,
        address: String,
        reason: String,
    },
}

impl ValidationError {
    /// Name of the request field the error is about.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Missing { field } => field,
            ValidationError::MissingContent => "body",
            ValidationError::InvalidAddress { field, .. } => field,
        }
    }
}

/// Failure to read a template from a [`TemplateStore`](crate::template::TemplateStore).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("key {0:?} not found")]
    NotFound(String),

    #[error("access to key {0:?} denied")]
    PermissionDenied(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} reading key {key:?}")]
    Status { key: String, status: u16 },
}

/// Failure reported by a [`Sender`](crate::transport::Sender).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("send timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("failed to build message: {0}")]
    Message(String),

    #[error("{0}")]
    Other(String),
}

/// Every way processing a single event can fail.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("failed to extract event data: {0}")]
    Decode(#[from] DecodeError),

    #[error("invalid event data: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to read template {name}: {source}")]
    ReadTemplate {
        name: String,
        #[source]
        source: StorageError,
    },

    #[error("failed to render email body: {0}")]
    Render(String),

    #[error("domain {domain:?} from sender {sender:?} does not match any registered domain to send emails from")]
    NoRoute { domain: String, sender: String },

    #[error("failed to send email: {0}")]
    Transport(#[from] TransportError),
}

/// What the event bus should do with an event whose processing failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge the event; redelivery can never change the outcome.
    Drop,
    /// Ask for redelivery; the cause may be transient.
    Retry,
}

impl SendError {
    pub fn disposition(&self) -> Disposition {
        match self {
            SendError::Decode(_) => Disposition::Drop,
            SendError::Validation(_) => Disposition::Drop,
            SendError::ReadTemplate { .. } => Disposition::Retry,
            SendError::Render(_) => Disposition::Drop,
            // An unregistered domain may be a deploy-ordering race.
            SendError::NoRoute { .. } => Disposition::Retry,
            SendError::Transport(_) => Disposition::Retry,
        }
    }

    /// Short machine-readable label used in logs and HTTP responses.
    pub fn kind(&self) -> &'static str {
        match self {
            SendError::Decode(_) => "decode",
            SendError::Validation(_) => "validation",
            SendError::ReadTemplate { .. } => "read_template",
            SendError::Render(_) => "render",
            SendError::NoRoute { .. } => "no_route",
            SendError::Transport(_) => "transport",
        }
    }
}
